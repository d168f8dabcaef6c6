use std::path::PathBuf;

use thiserror::Error;

use crate::core::client::queue::QueueError;
use crate::error::transfer::TransferError;

/// Failure of a single job. The job's queue message is left un-acked and
/// becomes visible again once its lease expires.
#[derive(Error, Debug)]
pub enum JobError {
    #[error("Malformed job message: {0}")]
    MalformedMessage(#[source] serde_json::Error),

    #[error("Failed to encode job descriptor: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("Job file path {0} must be relative and stay inside the scratch directory")]
    UnsafePath(String),

    #[error("Failed to fetch input {file}: {source}")]
    FetchInput {
        file: String,
        #[source]
        source: TransferError,
    },

    #[error("Failed to launch {executable}: {source}")]
    Launch {
        executable: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Step {executable} exited unsuccessfully (exit code: {code:?})")]
    StepFailed { executable: PathBuf, code: Option<i32> },

    #[error("Failed to publish output {file}: {source}")]
    PublishOutput {
        file: String,
        #[source]
        source: TransferError,
    },

    #[error("Failed to acknowledge job: {0}")]
    Ack(#[source] QueueError),

    #[error("Node preparation failed: {0}")]
    Preparation(String),
}
