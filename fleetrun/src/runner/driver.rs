use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::Bytes;
use chrono::Utc;
use tokio::sync::mpsc;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::core::client::queue::JobQueue;
use crate::deployment::DeploymentMonitor;
use crate::error::job::JobError;
use crate::error::{FleetError, FleetResult};
use crate::transfer::ChunkedTransferEngine;
use crate::types::constant::{DATA_PREFIX, OUTPUT_PREFIX, PACKAGES_PREFIX, STAGING_ACTIONS_FILE_NAME, STAGING_PREFIX};
use crate::types::deployment::{CreateDeploymentRequest, DeploymentLifecycleState, HostedService, NodeSettings};
use crate::types::manifest::{ManifestError, RunManifest, RunnerOperation};

/// Operator side of a run: stages files, manages the fleet, feeds the queue and
/// collects the results, as described by a [`RunManifest`].
pub struct OperatorDriver {
    manifest: RunManifest,
    bucket: String,
    engine: ChunkedTransferEngine,
    queue: Arc<dyn JobQueue>,
    monitor: DeploymentMonitor,
    queue_poll_interval: Duration,
    cancellation_token: CancellationToken,
}

impl OperatorDriver {
    pub fn new(
        manifest: RunManifest,
        bucket: impl Into<String>,
        engine: ChunkedTransferEngine,
        queue: Arc<dyn JobQueue>,
        monitor: DeploymentMonitor,
        queue_poll_interval: Duration,
        cancellation_token: CancellationToken,
    ) -> Self {
        Self { manifest, bucket: bucket.into(), engine, queue, monitor, queue_poll_interval, cancellation_token }
    }

    pub fn manifest(&self) -> &RunManifest {
        &self.manifest
    }

    /// Validates the manifest for `operation` and runs it.
    pub async fn execute(&self, operation: RunnerOperation) -> FleetResult<()> {
        self.manifest.validate_for(operation)?;
        info!(%operation, service = %self.manifest.service_name, "Running operation");

        match operation {
            RunnerOperation::Stage => {
                let package_url = self.stage_files().await?;
                info!(package_url = %package_url, "Files staged");
            }
            RunnerOperation::Deploy => self.deploy().await?,
            RunnerOperation::Enqueue => {
                let published = self.publish_jobs().await?;
                info!(published, "Jobs published");
            }
            RunnerOperation::RetrieveOutput => {
                self.retrieve_output().await?;
            }
            RunnerOperation::Cleanup => self.cleanup().await?,
            RunnerOperation::FullRun => self.full_run().await?,
            RunnerOperation::Status => {
                let state = self.status().await?;
                info!(
                    main_status = %state.main_status,
                    instances = state.instances.len(),
                    "Deployment status"
                );
                for instance in &state.instances {
                    info!(role = %instance.role_name, instance = %instance.instance_name, status = %instance.status, "Instance");
                }
            }
            RunnerOperation::Services => {
                for service in self.list_services().await? {
                    info!(service = %service.service_name, url = %service.url, "Hosted service");
                }
            }
        }
        Ok(())
    }

    /// Uploads the package, staging files, staging actions and data files.
    /// Returns the package URL.
    pub async fn stage_files(&self) -> FleetResult<String> {
        let package = self.manifest.package_file.as_deref().ok_or(ManifestError::MissingField("package_file"))?;
        let package_url = self.engine.upload_if_changed(package, &object_key(PACKAGES_PREFIX, package)?).await?.url;

        for file in &self.manifest.staging_files {
            let outcome = self.engine.upload_if_changed(file, &object_key(STAGING_PREFIX, file)?).await?;
            info!(file = %file.display(), skipped = outcome.skipped, "Staging file uploaded");
        }

        // Always written so actions of an earlier run never linger.
        let actions = serde_json::to_vec_pretty(&self.manifest.staging_actions).map_err(JobError::Encode)?;
        self.engine.upload_bytes(&format!("{STAGING_PREFIX}{STAGING_ACTIONS_FILE_NAME}"), Bytes::from(actions)).await?;

        for file in &self.manifest.data_files {
            let outcome = self.engine.upload_if_changed(file, &object_key(DATA_PREFIX, file)?).await?;
            info!(file = %file.display(), skipped = outcome.skipped, "Data file uploaded");
        }

        Ok(package_url)
    }

    /// Enqueues every job of the manifest, creating the queue if needed.
    pub async fn publish_jobs(&self) -> FleetResult<usize> {
        let queue_name = &self.manifest.queue_name;
        self.queue.ensure_queue(queue_name, self.max_job_duration()).await?;
        for job in &self.manifest.jobs {
            self.queue.enqueue(queue_name, job.to_message()?).await?;
        }
        Ok(self.manifest.jobs.len())
    }

    /// Polls the approximate queue length until it reaches zero.
    pub async fn wait_for_queue_empty(&self) -> FleetResult<()> {
        loop {
            let remaining = self.queue.approximate_length(&self.manifest.queue_name).await?;
            if remaining == 0 {
                info!(queue = %self.manifest.queue_name, "Queue drained");
                return Ok(());
            }
            info!(queue = %self.manifest.queue_name, remaining, "Waiting for jobs to finish");
            tokio::select! {
                _ = self.cancellation_token.cancelled() => return Err(FleetError::Cancelled("queue drain")),
                _ = sleep(self.queue_poll_interval) => {}
            }
        }
    }

    /// Stages files, brings the fleet up, publishes the jobs and waits until the
    /// queue is drained.
    pub async fn deploy(&self) -> FleetResult<()> {
        let package_url = self.stage_files().await?;
        let target = self.manifest.target();

        let request = CreateDeploymentRequest {
            target: target.clone(),
            package_url,
            label: self.manifest.label.clone().unwrap_or_else(|| format!("fleetrun {}", Utc::now().to_rfc3339())),
            instance_count: self.manifest.instance_count,
            node_settings: NodeSettings {
                bucket: self.bucket.clone(),
                queue_name: self.manifest.queue_name.clone(),
                queue_sleep_secs: self.manifest.queue_sleep_secs,
                max_job_length_secs: self.manifest.max_job_length_secs,
            },
            start_deployment: false,
        };
        self.monitor.create_deployment(&request).await?;
        self.monitor.start_deployment(&target).await?;

        let published = self.publish_jobs().await?;
        info!(published, "Jobs published");

        let state = self.monitor.wait_for_started(&target).await?;
        info!(instances = state.instances.len(), "Fleet started");

        self.wait_for_queue_empty().await
    }

    /// Downloads everything under the output prefix into the output location.
    pub async fn retrieve_output(&self) -> FleetResult<Vec<PathBuf>> {
        let (tx, mut rx) = mpsc::unbounded_channel::<PathBuf>();
        let reporter = tokio::spawn(async move {
            while let Some(path) = rx.recv().await {
                info!(path = %path.display(), "Retrieved output");
            }
        });

        let result = self.engine.download_prefix(OUTPUT_PREFIX, &self.manifest.output_location, Some(tx)).await;
        // the sender is gone once download_prefix returns, so the reporter ends
        if let Err(e) = reporter.await {
            warn!(error = %e, "Output reporter stopped unexpectedly");
        }

        let files = result?;
        info!(files = files.len(), location = %self.manifest.output_location.display(), "Output retrieved");
        Ok(files)
    }

    /// Stops the fleet, waits for every node to stop and deletes the deployment.
    pub async fn cleanup(&self) -> FleetResult<()> {
        self.teardown(&self.monitor).await
    }

    async fn teardown(&self, monitor: &DeploymentMonitor) -> FleetResult<()> {
        let target = self.manifest.target();
        monitor.stop_deployment(&target).await?;
        monitor.wait_for_stopped(&target).await?;
        monitor.delete_deployment(&target).await?;
        info!(deployment = %target.deployment_name, "Deployment removed");
        Ok(())
    }

    /// Deploy, retrieve output and clean up. The fleet is torn down even when
    /// an earlier stage fails or the run is cancelled.
    pub async fn full_run(&self) -> FleetResult<()> {
        let started = Instant::now();
        let result = async {
            self.deploy().await?;
            info!(compute_secs = started.elapsed().as_secs(), "Compute finished");
            self.retrieve_output().await.map(|_| ())
        }
        .await;

        if let Err(e) = &result {
            warn!(error = %e, "Run failed, tearing the fleet down");
        }
        let cleanup = if self.cancellation_token.is_cancelled() {
            warn!("Run cancelled, tearing the fleet down before exiting");
            self.teardown(&self.monitor.with_cancellation_token(CancellationToken::new())).await
        } else {
            self.cleanup().await
        };

        result?;
        cleanup?;
        info!(total_secs = started.elapsed().as_secs(), "Full run finished");
        Ok(())
    }

    pub async fn status(&self) -> FleetResult<DeploymentLifecycleState> {
        Ok(self.monitor.deployment_status(&self.manifest.target()).await?)
    }

    pub async fn list_services(&self) -> FleetResult<Vec<HostedService>> {
        Ok(self.monitor.list_services().await?)
    }

    fn max_job_duration(&self) -> Duration {
        Duration::from_secs(self.manifest.max_job_length_secs)
    }
}

fn object_key(prefix: &str, path: &Path) -> FleetResult<String> {
    let name = path
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| FleetError::Config(format!("{} has no usable file name", path.display())))?;
    Ok(format!("{prefix}{name}"))
}
