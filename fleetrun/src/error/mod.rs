pub mod deployment;
pub mod job;
pub mod transfer;

use thiserror::Error;

use crate::core::client::control_plane::ControlPlaneError;
use crate::core::client::queue::QueueError;
use crate::core::client::storage::StorageError;
use crate::error::deployment::DeploymentError;
use crate::error::job::JobError;
use crate::error::transfer::TransferError;
use crate::types::manifest::ManifestError;

/// Result type for fleetrun operations
pub type FleetResult<T> = Result<T, FleetError>;

/// Top level error of the operator and worker entry points
#[derive(Error, Debug)]
pub enum FleetError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Queue error: {0}")]
    Queue(#[from] QueueError),

    #[error("Control plane error: {0}")]
    ControlPlane(#[from] ControlPlaneError),

    #[error("Transfer error: {0}")]
    Transfer(#[from] TransferError),

    #[error("Job error: {0}")]
    Job(#[from] JobError),

    #[error("Deployment error: {0}")]
    Deployment(#[from] DeploymentError),

    #[error("Manifest error: {0}")]
    Manifest(#[from] ManifestError),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Interrupted before {0} completed")]
    Cancelled(&'static str),
}
