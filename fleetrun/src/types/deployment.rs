use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

use crate::error::deployment::DeploymentError;
use crate::types::constant::DEFAULT_QUORUM_FRACTION;

/// Fleet-level status as reported by the control plane.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, AsRefStr, Serialize, Deserialize)]
#[strum(ascii_case_insensitive)]
pub enum DeploymentStatus {
    Running,
    Suspended,
    RunningTransitioning,
    SuspendedTransitioning,
    Starting,
    Suspending,
    Deploying,
    Deleting,
    Unknown,
}

/// Per-node status as reported by the control plane.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, AsRefStr, Serialize, Deserialize)]
#[strum(ascii_case_insensitive)]
pub enum InstanceStatus {
    Ready,
    Busy,
    Initializing,
    Stopping,
    Stopped,
    StoppedDeallocated,
    Unresponsive,
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display, EnumString, AsRefStr, Serialize, Deserialize)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
#[serde(rename_all = "lowercase")]
pub enum DeploymentSlot {
    #[default]
    Production,
    Staging,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceState {
    pub role_name: String,
    pub instance_name: String,
    pub status: InstanceStatus,
}

/// One snapshot of the fleet; every poll fetches a fresh one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeploymentLifecycleState {
    pub main_status: DeploymentStatus,
    pub instances: Vec<InstanceState>,
}

impl DeploymentLifecycleState {
    pub fn matching_instances(&self, target: InstanceStatus) -> usize {
        self.instances.iter().filter(|instance| instance.status == target).count()
    }

    /// Fraction of instances in `target`; `None` without instances.
    pub fn matching_fraction(&self, target: InstanceStatus) -> Option<f64> {
        if self.instances.is_empty() {
            return None;
        }
        Some(self.matching_instances(target) as f64 / self.instances.len() as f64)
    }

    /// True once the main status matches and either every instance matches, or
    /// a quorum is given and at least that fraction of instances matches.
    ///
    /// A fleet reporting no instances converges on the main status alone.
    pub fn converged(
        &self,
        target_main: DeploymentStatus,
        target_instance: InstanceStatus,
        quorum: Option<QuorumPolicy>,
    ) -> bool {
        if self.main_status != target_main {
            return false;
        }
        let Some(fraction) = self.matching_fraction(target_instance) else {
            return true;
        };
        match quorum {
            Some(policy) => fraction >= policy.fraction(),
            None => self.matching_instances(target_instance) == self.instances.len(),
        }
    }
}

/// Fraction of nodes that must reach the target state for a quorum wait to succeed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QuorumPolicy(f64);

impl QuorumPolicy {
    pub fn new(fraction: f64) -> Result<Self, DeploymentError> {
        if !(fraction > 0.0 && fraction <= 1.0) {
            return Err(DeploymentError::InvalidQuorum(fraction));
        }
        Ok(Self(fraction))
    }

    pub fn fraction(&self) -> f64 {
        self.0
    }
}

impl Default for QuorumPolicy {
    fn default() -> Self {
        Self(DEFAULT_QUORUM_FRACTION)
    }
}

/// Result of polling one asynchronous control-plane operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationStatus {
    InProgress,
    Succeeded,
    Failed { message: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AsyncOperationHandle {
    pub request_id: String,
}

impl AsyncOperationHandle {
    pub fn new(request_id: impl Into<String>) -> Self {
        Self { request_id: request_id.into() }
    }
}

/// Addresses one deployment of a hosted service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeploymentTarget {
    pub service_name: String,
    pub slot: DeploymentSlot,
    pub deployment_name: String,
}

/// Settings every node of the fleet starts its worker with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct NodeSettings {
    pub bucket: String,
    pub queue_name: String,
    pub queue_sleep_secs: u64,
    pub max_job_length_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateDeploymentRequest {
    pub target: DeploymentTarget,
    pub package_url: String,
    pub label: String,
    pub instance_count: u32,
    pub node_settings: NodeSettings,
    /// Start the fleet as soon as it is created.
    pub start_deployment: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostedService {
    pub service_name: String,
    pub url: String,
}
