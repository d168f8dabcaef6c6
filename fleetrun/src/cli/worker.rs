use std::path::PathBuf;
use std::time::Duration;

use clap::Args;

use crate::error::{FleetError, FleetResult};
use crate::transfer::TransferSettings;
use crate::types::constant::MAX_JOB_LENGTH_SECS;
use crate::worker::WorkerSettings;

/// Parameters of a worker node.
#[derive(Debug, Clone, Args)]
pub struct WorkerCliArgs {
    /// Working directory of the jobs.
    #[arg(env = "FLEETRUN_SCRATCH_DIR", long)]
    pub scratch_dir: PathBuf,

    /// Queue the jobs are leased from.
    #[arg(env = "FLEETRUN_QUEUE_NAME", long)]
    pub queue_name: String,

    /// Seconds to sleep once the queue is drained.
    #[arg(env = "FLEETRUN_QUEUE_SLEEP_SECS", long, default_value_t = 60)]
    pub queue_sleep_secs: u64,

    /// Lease length of a job in seconds; unfinished jobs are redelivered after it.
    #[arg(env = "FLEETRUN_MAX_JOB_LENGTH_SECS", long, default_value_t = 3600)]
    pub max_job_length_secs: u64,

    /// Name of this node in the logs.
    #[arg(env = "FLEETRUN_NODE_NAME", long, default_value = "worker")]
    pub node_name: String,

    /// Skip downloading staging files and running staging actions.
    #[arg(env = "FLEETRUN_SKIP_PREPARATION", long, default_value_t = false)]
    pub skip_preparation: bool,
}

impl WorkerCliArgs {
    /// The job length becomes the lease visibility timeout, so it is bounded by what SQS accepts.
    pub fn to_settings(&self, transfer: TransferSettings) -> FleetResult<WorkerSettings> {
        if self.max_job_length_secs > MAX_JOB_LENGTH_SECS {
            return Err(FleetError::Config(format!(
                "max job length of {}s exceeds the queue limit of {MAX_JOB_LENGTH_SECS}s",
                self.max_job_length_secs
            )));
        }
        Ok(WorkerSettings::new(&self.scratch_dir, &self.queue_name)
            .with_poll_interval(Duration::from_secs(self.queue_sleep_secs))
            .with_max_job_duration(Duration::from_secs(self.max_job_length_secs))
            .with_transfer(transfer))
    }
}
