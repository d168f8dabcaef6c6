use thiserror::Error;

use crate::core::client::control_plane::ControlPlaneError;

#[derive(Error, Debug)]
pub enum DeploymentError {
    #[error(transparent)]
    ControlPlane(#[from] ControlPlaneError),

    #[error("Operation {request_id} failed: {message}")]
    OperationFailed { request_id: String, message: String },

    #[error("Quorum fraction must be within (0, 1], got {0}")]
    InvalidQuorum(f64),

    #[error("Wait was cancelled")]
    Cancelled,
}
