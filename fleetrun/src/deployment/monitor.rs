use std::sync::Arc;
use std::time::Duration;

use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};

use crate::core::client::control_plane::ControlPlaneClient;
use crate::error::deployment::DeploymentError;
use crate::types::deployment::{
    AsyncOperationHandle, CreateDeploymentRequest, DeploymentLifecycleState, DeploymentStatus, DeploymentTarget,
    HostedService, InstanceStatus, OperationStatus, QuorumPolicy,
};

/// Drives fleet lifecycle operations and waits for them to take effect.
///
/// Both waits poll at a fixed interval with no attempt limit; the caller bounds
/// them by cancelling the token.
#[derive(Clone)]
pub struct DeploymentMonitor {
    client: Arc<dyn ControlPlaneClient>,
    poll_interval: Duration,
    quorum: QuorumPolicy,
    cancellation_token: CancellationToken,
}

impl DeploymentMonitor {
    pub fn new(
        client: Arc<dyn ControlPlaneClient>,
        poll_interval: Duration,
        quorum: QuorumPolicy,
        cancellation_token: CancellationToken,
    ) -> Self {
        Self { client, poll_interval, quorum, cancellation_token }
    }

    /// Same client and policy, cancelled by `cancellation_token` instead.
    pub fn with_cancellation_token(&self, cancellation_token: CancellationToken) -> Self {
        Self { cancellation_token, ..self.clone() }
    }

    pub fn quorum(&self) -> QuorumPolicy {
        self.quorum
    }

    /// Polls the operation until it leaves `InProgress`.
    #[instrument(skip(self, handle), fields(request_id = %handle.request_id))]
    pub async fn wait_for_operation(&self, handle: &AsyncOperationHandle) -> Result<(), DeploymentError> {
        loop {
            match self.client.poll_operation(handle).await? {
                OperationStatus::Succeeded => {
                    debug!("Operation succeeded");
                    return Ok(());
                }
                OperationStatus::Failed { message } => {
                    return Err(DeploymentError::OperationFailed { request_id: handle.request_id.clone(), message });
                }
                OperationStatus::InProgress => self.pause().await?,
            }
        }
    }

    /// Polls fleet snapshots until the main status is `target_main` and every
    /// instance, or with `quorum_mode` the quorum fraction of instances, is in
    /// `target_instance`. Returns the converged snapshot.
    #[instrument(skip(self, target), fields(service = %target.service_name, slot = %target.slot))]
    pub async fn wait_for_deployment_status(
        &self,
        target: &DeploymentTarget,
        target_main: DeploymentStatus,
        target_instance: InstanceStatus,
        quorum_mode: bool,
    ) -> Result<DeploymentLifecycleState, DeploymentError> {
        let quorum = quorum_mode.then_some(self.quorum);
        loop {
            let state = self.client.get_deployment_status(target).await?;
            if state.converged(target_main, target_instance, quorum) {
                info!(
                    main_status = %state.main_status,
                    matching = state.matching_instances(target_instance),
                    instances = state.instances.len(),
                    "Deployment reached target state"
                );
                return Ok(state);
            }
            debug!(
                main_status = %state.main_status,
                matching = state.matching_instances(target_instance),
                instances = state.instances.len(),
                "Waiting for deployment"
            );
            self.pause().await?;
        }
    }

    pub async fn create_deployment(&self, request: &CreateDeploymentRequest) -> Result<(), DeploymentError> {
        info!(
            service = %request.target.service_name,
            deployment = %request.target.deployment_name,
            instances = request.instance_count,
            "Creating deployment"
        );
        let handle = self.client.submit_create_deployment(request).await?;
        self.wait_for_operation(&handle).await
    }

    pub async fn start_deployment(&self, target: &DeploymentTarget) -> Result<(), DeploymentError> {
        self.update_status(target, DeploymentStatus::Running).await
    }

    pub async fn stop_deployment(&self, target: &DeploymentTarget) -> Result<(), DeploymentError> {
        self.update_status(target, DeploymentStatus::Suspended).await
    }

    pub async fn delete_deployment(&self, target: &DeploymentTarget) -> Result<(), DeploymentError> {
        info!(service = %target.service_name, deployment = %target.deployment_name, "Deleting deployment");
        let handle = self.client.submit_delete_deployment(target).await?;
        self.wait_for_operation(&handle).await
    }

    /// Running with a quorum of ready nodes.
    pub async fn wait_for_started(
        &self,
        target: &DeploymentTarget,
    ) -> Result<DeploymentLifecycleState, DeploymentError> {
        self.wait_for_deployment_status(target, DeploymentStatus::Running, InstanceStatus::Ready, true).await
    }

    /// Suspended with every node stopped.
    pub async fn wait_for_stopped(
        &self,
        target: &DeploymentTarget,
    ) -> Result<DeploymentLifecycleState, DeploymentError> {
        self.wait_for_deployment_status(target, DeploymentStatus::Suspended, InstanceStatus::Stopped, false).await
    }

    pub async fn deployment_status(
        &self,
        target: &DeploymentTarget,
    ) -> Result<DeploymentLifecycleState, DeploymentError> {
        Ok(self.client.get_deployment_status(target).await?)
    }

    pub async fn list_services(&self) -> Result<Vec<HostedService>, DeploymentError> {
        Ok(self.client.list_services().await?)
    }

    async fn update_status(&self, target: &DeploymentTarget, status: DeploymentStatus) -> Result<(), DeploymentError> {
        info!(service = %target.service_name, deployment = %target.deployment_name, %status, "Updating deployment status");
        let handle = self.client.submit_update_deployment_status(target, status).await?;
        self.wait_for_operation(&handle).await
    }

    async fn pause(&self) -> Result<(), DeploymentError> {
        tokio::select! {
            _ = self.cancellation_token.cancelled() => Err(DeploymentError::Cancelled),
            _ = sleep(self.poll_interval) => Ok(()),
        }
    }
}
