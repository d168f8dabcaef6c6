use std::path::PathBuf;
use std::time::Duration;

use crate::transfer::TransferSettings;

/// Configuration of a worker node, fixed for the lifetime of the worker
#[derive(Debug, Clone)]
pub struct WorkerSettings {
    /// Working directory of every step; job file paths are relative to it
    pub scratch_dir: PathBuf,
    pub queue_name: String,
    /// Sleep between two queue drains
    pub poll_interval: Duration,
    /// Lease length of a job; an unfinished job is redelivered after it
    pub max_job_duration: Duration,
    pub transfer: TransferSettings,
}

impl WorkerSettings {
    pub fn new(scratch_dir: impl Into<PathBuf>, queue_name: impl Into<String>) -> Self {
        Self {
            scratch_dir: scratch_dir.into(),
            queue_name: queue_name.into(),
            poll_interval: Duration::from_secs(60),
            max_job_duration: Duration::from_secs(3600),
            transfer: TransferSettings::default(),
        }
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn with_max_job_duration(mut self, max_job_duration: Duration) -> Self {
        self.max_job_duration = max_job_duration;
        self
    }

    pub fn with_transfer(mut self, transfer: TransferSettings) -> Self {
        self.transfer = transfer;
        self
    }
}
