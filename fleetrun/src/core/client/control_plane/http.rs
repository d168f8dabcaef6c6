use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use tracing::debug;
use url::Url;

use crate::core::client::control_plane::types::{
    CreateDeploymentBody, DeploymentBody, HostedServicesResponse, OperationResponse, UpdateDeploymentStatusBody,
};
use crate::core::client::control_plane::{ControlPlaneClient, ControlPlaneError};
use crate::types::constant::REQUEST_ID_HEADER;
use crate::types::deployment::{
    AsyncOperationHandle, CreateDeploymentRequest, DeploymentLifecycleState, DeploymentStatus, DeploymentTarget,
    HostedService, OperationStatus,
};

/// JSON over HTTP control plane client.
///
/// Every resource lives below `{base_url}/{subscription_id}/`. Mutating calls are
/// accepted asynchronously and answer with the operation id in the
/// `x-request-id` header.
#[derive(Debug, Clone)]
pub struct HttpControlPlane {
    client: Client,
    base_url: Url,
    subscription_id: String,
    api_token: Option<String>,
}

impl HttpControlPlane {
    pub fn new(base_url: Url, subscription_id: impl Into<String>, api_token: Option<String>) -> Self {
        Self { client: Client::new(), base_url, subscription_id: subscription_id.into(), api_token }
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, ControlPlaneError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| ControlPlaneError::UrlError(format!("{} cannot be a base url", self.base_url)))?
            .pop_if_empty()
            .push(&self.subscription_id)
            .extend(segments);
        Ok(url)
    }

    fn slot_endpoint(&self, target: &DeploymentTarget) -> Result<Url, ControlPlaneError> {
        self.endpoint(&["services", "hostedservices", &target.service_name, "deploymentslots", target.slot.as_ref()])
    }

    fn deployment_endpoint(&self, target: &DeploymentTarget) -> Result<Url, ControlPlaneError> {
        self.endpoint(&["services", "hostedservices", &target.service_name, "deployments", &target.deployment_name])
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.api_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn send(&self, operation: &'static str, request: RequestBuilder) -> Result<Response, ControlPlaneError> {
        let response =
            self.authorize(request).send().await.map_err(|e| ControlPlaneError::network(operation, e))?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let message = response.text().await.unwrap_or_default();
        Err(ControlPlaneError::ApiError { operation, status, message })
    }

    /// Sends a mutating request and returns the handle of the operation it started.
    async fn submit(
        &self,
        operation: &'static str,
        request: RequestBuilder,
    ) -> Result<AsyncOperationHandle, ControlPlaneError> {
        let response = self.send(operation, request).await?;
        let request_id = response
            .headers()
            .get(REQUEST_ID_HEADER)
            .and_then(|value| value.to_str().ok())
            .filter(|value| !value.is_empty())
            .ok_or(ControlPlaneError::MissingRequestId { operation, header: REQUEST_ID_HEADER })?;
        debug!(operation, request_id, "Control plane accepted operation");
        Ok(AsyncOperationHandle::new(request_id))
    }

    async fn fetch<T: DeserializeOwned>(&self, operation: &'static str, url: Url) -> Result<T, ControlPlaneError> {
        let response = self.send(operation, self.client.get(url)).await?;
        let body = response.text().await.map_err(|e| ControlPlaneError::network(operation, e))?;
        serde_json::from_str(&body).map_err(|e| ControlPlaneError::parse_error(operation, e.to_string()))
    }
}

#[async_trait]
impl ControlPlaneClient for HttpControlPlane {
    async fn submit_create_deployment(
        &self,
        request: &CreateDeploymentRequest,
    ) -> Result<AsyncOperationHandle, ControlPlaneError> {
        let body = CreateDeploymentBody {
            name: request.target.deployment_name.clone(),
            package_url: request.package_url.clone(),
            label: request.label.clone(),
            instance_count: request.instance_count,
            start_deployment: request.start_deployment,
            configuration: request.node_settings.clone(),
        };
        let url = self.slot_endpoint(&request.target)?;
        self.submit("create deployment", self.client.post(url).json(&body)).await
    }

    async fn submit_update_deployment_status(
        &self,
        target: &DeploymentTarget,
        status: DeploymentStatus,
    ) -> Result<AsyncOperationHandle, ControlPlaneError> {
        let mut url = self.deployment_endpoint(target)?;
        url.query_pairs_mut().append_pair("comp", "status");
        let body = UpdateDeploymentStatusBody { status: status.to_string() };
        self.submit("update deployment status", self.client.post(url).json(&body)).await
    }

    async fn submit_delete_deployment(
        &self,
        target: &DeploymentTarget,
    ) -> Result<AsyncOperationHandle, ControlPlaneError> {
        let url = self.deployment_endpoint(target)?;
        self.submit("delete deployment", self.client.delete(url)).await
    }

    async fn poll_operation(&self, handle: &AsyncOperationHandle) -> Result<OperationStatus, ControlPlaneError> {
        let url = self.endpoint(&["operations", &handle.request_id])?;
        let response: OperationResponse = self.fetch("poll operation", url).await?;
        response.into_status()
    }

    async fn get_deployment_status(
        &self,
        target: &DeploymentTarget,
    ) -> Result<DeploymentLifecycleState, ControlPlaneError> {
        let url = self.slot_endpoint(target)?;
        let body: DeploymentBody = self.fetch("get deployment", url).await?;
        body.try_into()
    }

    async fn list_services(&self) -> Result<Vec<HostedService>, ControlPlaneError> {
        let url = self.endpoint(&["services", "hostedservices"])?;
        let response: HostedServicesResponse = self.fetch("list services", url).await?;
        Ok(response.hosted_services.into_iter().map(HostedService::from).collect())
    }
}
