//! Wire format of the control plane API.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::core::client::control_plane::ControlPlaneError;
use crate::types::deployment::{
    DeploymentLifecycleState, DeploymentStatus, HostedService, InstanceState, InstanceStatus, NodeSettings,
    OperationStatus,
};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub struct CreateDeploymentBody {
    pub name: String,
    pub package_url: String,
    pub label: String,
    pub instance_count: u32,
    pub start_deployment: bool,
    pub configuration: NodeSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub struct UpdateDeploymentStatusBody {
    pub status: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub struct OperationError {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub struct OperationResponse {
    pub id: Option<String>,
    pub status: String,
    #[serde(default)]
    pub error: Option<OperationError>,
}

impl OperationResponse {
    pub fn into_status(self) -> Result<OperationStatus, ControlPlaneError> {
        match self.status.as_str() {
            "InProgress" => Ok(OperationStatus::InProgress),
            "Succeeded" => Ok(OperationStatus::Succeeded),
            "Failed" => {
                let message = self
                    .error
                    .and_then(|error| match (error.code, error.message) {
                        (Some(code), Some(message)) => Some(format!("{code}: {message}")),
                        (code, message) => message.or(code),
                    })
                    .unwrap_or_else(|| "no error details reported".to_string());
                Ok(OperationStatus::Failed { message })
            }
            other => Err(ControlPlaneError::unrecognized("operation status", other)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub struct RoleInstanceBody {
    pub role_name: String,
    pub instance_name: String,
    pub instance_status: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub struct DeploymentBody {
    pub name: Option<String>,
    pub status: String,
    #[serde(default)]
    pub role_instance_list: Vec<RoleInstanceBody>,
}

impl TryFrom<DeploymentBody> for DeploymentLifecycleState {
    type Error = ControlPlaneError;

    fn try_from(body: DeploymentBody) -> Result<Self, Self::Error> {
        let main_status = DeploymentStatus::from_str(&body.status)
            .map_err(|_| ControlPlaneError::unrecognized("deployment status", &body.status))?;
        let instances = body
            .role_instance_list
            .into_iter()
            .map(|instance| {
                let status = InstanceStatus::from_str(&instance.instance_status)
                    .map_err(|_| ControlPlaneError::unrecognized("instance status", &instance.instance_status))?;
                Ok(InstanceState { role_name: instance.role_name, instance_name: instance.instance_name, status })
            })
            .collect::<Result<Vec<_>, ControlPlaneError>>()?;
        Ok(Self { main_status, instances })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub struct HostedServiceBody {
    pub service_name: String,
    pub url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub struct HostedServicesResponse {
    #[serde(default)]
    pub hosted_services: Vec<HostedServiceBody>,
}

impl From<HostedServiceBody> for HostedService {
    fn from(body: HostedServiceBody) -> Self {
        Self { service_name: body.service_name, url: body.url }
    }
}
