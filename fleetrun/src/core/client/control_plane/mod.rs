pub mod error;
pub mod http;
pub mod types;

use async_trait::async_trait;
pub use error::ControlPlaneError;

use crate::types::deployment::{
    AsyncOperationHandle, CreateDeploymentRequest, DeploymentLifecycleState, DeploymentStatus, DeploymentTarget,
    HostedService, OperationStatus,
};

/// Trait defining the fleet management operations.
///
/// Mutating calls only submit the operation and return its handle; completion is
/// observed through [`ControlPlaneClient::poll_operation`].
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ControlPlaneClient: Send + Sync {
    async fn submit_create_deployment(
        &self,
        request: &CreateDeploymentRequest,
    ) -> Result<AsyncOperationHandle, ControlPlaneError>;

    async fn submit_update_deployment_status(
        &self,
        target: &DeploymentTarget,
        status: DeploymentStatus,
    ) -> Result<AsyncOperationHandle, ControlPlaneError>;

    async fn submit_delete_deployment(&self, target: &DeploymentTarget)
        -> Result<AsyncOperationHandle, ControlPlaneError>;

    async fn poll_operation(&self, handle: &AsyncOperationHandle) -> Result<OperationStatus, ControlPlaneError>;

    async fn get_deployment_status(&self, target: &DeploymentTarget)
        -> Result<DeploymentLifecycleState, ControlPlaneError>;

    async fn list_services(&self) -> Result<Vec<HostedService>, ControlPlaneError>;
}
