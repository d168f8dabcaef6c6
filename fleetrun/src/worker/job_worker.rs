use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::fs;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, warn, Instrument};

use crate::core::client::process::ProcessRunner;
use crate::core::client::queue::{JobQueue, LeasedMessage, QueueError};
use crate::core::client::storage::ObjectStore;
use crate::error::job::JobError;
use crate::transfer::ChunkedTransferEngine;
use crate::types::constant::{DATA_PREFIX, OUTPUT_PREFIX};
use crate::types::job::{ExecutableStep, JobDescriptor};
use crate::worker::config::WorkerSettings;

/// Pulls job descriptors off the queue and executes them one at a time.
///
/// A job is lease, fetch inputs, run steps, publish outputs, remove transient
/// files and finally delete the message. Any failure leaves the message on the
/// queue; it is delivered again once the lease runs out, so every stage must be
/// safe to repeat.
pub struct JobExecutionWorker {
    settings: WorkerSettings,
    queue: Arc<dyn JobQueue>,
    engine: ChunkedTransferEngine,
    runner: Arc<dyn ProcessRunner>,
    shutdown_token: CancellationToken,
}

impl JobExecutionWorker {
    pub fn new(
        settings: WorkerSettings,
        store: Arc<dyn ObjectStore>,
        queue: Arc<dyn JobQueue>,
        runner: Arc<dyn ProcessRunner>,
        shutdown_token: CancellationToken,
    ) -> Self {
        let engine = ChunkedTransferEngine::new(store, settings.transfer);
        Self { settings, queue, engine, runner, shutdown_token }
    }

    pub fn settings(&self) -> &WorkerSettings {
        &self.settings
    }

    pub(crate) fn engine(&self) -> &ChunkedTransferEngine {
        &self.engine
    }

    /// Run the worker loop until the shutdown token is cancelled.
    /// A job in progress is finished before the loop exits.
    pub async fn run(&self) {
        info!(
            queue = %self.settings.queue_name,
            scratch_dir = %self.settings.scratch_dir.display(),
            poll_interval_secs = self.settings.poll_interval.as_secs(),
            max_job_duration_secs = self.settings.max_job_duration.as_secs(),
            "Starting job worker"
        );

        loop {
            if self.shutdown_token.is_cancelled() {
                break;
            }

            match self.drain_queue().await {
                Ok(0) => debug!("Queue is empty"),
                Ok(handled) => info!(handled, "Drained queue"),
                Err(e) => error!(error = %e, "Failed to lease from queue"),
            }

            tokio::select! {
                _ = self.shutdown_token.cancelled() => break,
                _ = sleep(self.settings.poll_interval) => {}
            }
        }

        info!(queue = %self.settings.queue_name, "Job worker stopped");
    }

    /// Leases and handles messages until none is visible. Returns how many were
    /// handled, successful or not.
    pub async fn drain_queue(&self) -> Result<usize, QueueError> {
        let mut handled = 0;
        while !self.shutdown_token.is_cancelled() {
            let Some(message) = self.queue.lease(&self.settings.queue_name, self.settings.max_job_duration).await?
            else {
                break;
            };
            handled += 1;

            let span = info_span!("job", job = message.message_id.as_deref().unwrap_or("-"));
            if let Err(e) = self.process_message(&message).instrument(span.clone()).await {
                span.in_scope(|| error!(error = %e, "Job failed, message left for redelivery"));
            }
        }
        Ok(handled)
    }

    /// Executes one leased message and deletes it on success.
    pub async fn process_message(&self, message: &LeasedMessage) -> Result<(), JobError> {
        let job = JobDescriptor::from_message(&message.body)?;
        self.execute_job(&job).await?;
        self.queue.delete(&self.settings.queue_name, &message.receipt).await.map_err(JobError::Ack)?;
        info!("Job completed");
        Ok(())
    }

    /// Every stage of a job short of acknowledging it.
    pub async fn execute_job(&self, job: &JobDescriptor) -> Result<(), JobError> {
        job.validate()?;
        let fetched = self.fetch_inputs(&job.input_files).await?;
        debug!(fetched, total = job.input_files.len(), "Inputs ready");
        self.run_steps(&job.steps).await?;
        self.publish_outputs(&job.output_files).await?;
        self.remove_transient_files(&job.files_to_remove).await;
        Ok(())
    }

    /// Downloads the inputs missing from scratch. Returns how many were downloaded.
    pub async fn fetch_inputs(&self, files: &[String]) -> Result<usize, JobError> {
        let mut fetched = 0;
        for file in files {
            let local = self.settings.scratch_dir.join(file);
            if fs::try_exists(&local).await.unwrap_or(false) {
                debug!(file = %file, "Input already present");
                continue;
            }
            let key = format!("{DATA_PREFIX}{file}");
            self.engine
                .download_file(&key, &local)
                .await
                .map_err(|source| JobError::FetchInput { file: file.clone(), source })?;
            fetched += 1;
        }
        Ok(fetched)
    }

    /// Runs the steps in order inside scratch, stopping at the first one that
    /// fails to launch or exits unsuccessfully.
    pub async fn run_steps(&self, steps: &[ExecutableStep]) -> Result<(), JobError> {
        for step in steps {
            let executable = self.resolve_executable(&step.path).await;
            info!(executable = %executable.display(), arguments = ?step.arguments, "Running step");

            let exit = self
                .runner
                .run(&executable, &step.arguments, &self.settings.scratch_dir)
                .await
                .map_err(|source| JobError::Launch { executable: executable.clone(), source })?;
            if !exit.success() {
                return Err(JobError::StepFailed { executable, code: exit.code });
            }
        }
        Ok(())
    }

    /// Relative paths resolve against scratch when the file is there, bare
    /// command names are otherwise left to the `PATH` lookup.
    async fn resolve_executable(&self, path: &str) -> PathBuf {
        let candidate = Path::new(path);
        if candidate.is_absolute() {
            return candidate.to_path_buf();
        }
        let in_scratch = self.settings.scratch_dir.join(candidate);
        if fs::try_exists(&in_scratch).await.unwrap_or(false) {
            in_scratch
        } else {
            candidate.to_path_buf()
        }
    }

    /// Uploads every output. Outputs uploaded before a failure stay in the store.
    pub async fn publish_outputs(&self, files: &[String]) -> Result<(), JobError> {
        for file in files {
            let local = self.settings.scratch_dir.join(file);
            let key = format!("{OUTPUT_PREFIX}{file}");
            self.engine
                .upload_file(&local, &key)
                .await
                .map_err(|source| JobError::PublishOutput { file: file.clone(), source })?;
        }
        Ok(())
    }

    /// Best effort: a missing file is fine, other errors are only logged.
    pub async fn remove_transient_files(&self, files: &[String]) {
        for file in files {
            let local = self.settings.scratch_dir.join(file);
            match fs::remove_file(&local).await {
                Ok(()) => debug!(file = %file, "Removed transient file"),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => warn!(file = %file, error = %e, "Failed to remove transient file"),
            }
        }
    }
}
