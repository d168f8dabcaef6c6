use std::path::{Path, PathBuf};

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use strum_macros::Display;
use thiserror::Error;

use crate::types::constant::MAX_JOB_LENGTH_SECS;
use crate::types::deployment::{DeploymentSlot, DeploymentTarget};
use crate::types::job::{ExecutableStep, JobDescriptor};

#[derive(Error, Debug)]
pub enum ManifestError {
    #[error("Failed to read manifest {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse manifest {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("Manifest field `{0}` is required for this command")]
    MissingField(&'static str),
    #[error("Manifest references files that do not exist: {}", .0.iter().map(|p| p.display().to_string()).collect::<Vec<_>>().join(", "))]
    MissingFiles(Vec<PathBuf>),
    #[error("max_job_length_secs of {0}s exceeds the queue limit of {MAX_JOB_LENGTH_SECS}s")]
    JobLengthTooLong(u64),
    #[error("Invalid job descriptor at position {index}: {message}")]
    InvalidJob { index: usize, message: String },
}

/// Operator commands a manifest can be validated for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Display)]
#[strum(serialize_all = "kebab-case")]
pub enum RunnerOperation {
    /// Upload package, staging files and data files
    Stage,
    /// Stage, create and start the fleet, publish jobs and wait for the queue to drain
    Deploy,
    /// Publish the manifest's jobs onto the queue
    Enqueue,
    /// Download everything under the output prefix
    RetrieveOutput,
    /// Stop and delete the fleet
    Cleanup,
    /// Deploy, retrieve output and clean up
    FullRun,
    /// Print the fleet status
    Status,
    /// List the hosted services of the subscription
    Services,
}

fn default_deployment_name() -> String {
    "fleetrun-deployment".to_string()
}

fn default_instance_count() -> u32 {
    1
}

fn default_max_job_length_secs() -> u64 {
    3600
}

fn default_queue_sleep_secs() -> u64 {
    60
}

fn default_output_location() -> PathBuf {
    PathBuf::from("output")
}

/// Operator-side description of one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunManifest {
    pub package_file: Option<PathBuf>,
    #[serde(default)]
    pub staging_files: Vec<PathBuf>,
    #[serde(default)]
    pub staging_actions: Vec<ExecutableStep>,
    #[serde(default)]
    pub data_files: Vec<PathBuf>,
    pub service_name: String,
    #[serde(default = "default_deployment_name")]
    pub deployment_name: String,
    #[serde(default)]
    pub deployment_slot: DeploymentSlot,
    pub label: Option<String>,
    #[serde(default = "default_instance_count")]
    pub instance_count: u32,
    #[serde(default = "default_max_job_length_secs")]
    pub max_job_length_secs: u64,
    pub queue_name: String,
    #[serde(default = "default_queue_sleep_secs")]
    pub queue_sleep_secs: u64,
    #[serde(default = "default_output_location")]
    pub output_location: PathBuf,
    #[serde(default)]
    pub jobs: Vec<JobDescriptor>,
}

impl RunManifest {
    pub fn from_file(path: &Path) -> Result<Self, ManifestError> {
        let contents =
            std::fs::read_to_string(path).map_err(|source| ManifestError::Read { path: path.to_path_buf(), source })?;
        Self::from_yaml(&contents).map_err(|source| ManifestError::Parse { path: path.to_path_buf(), source })
    }

    pub fn from_yaml(contents: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(contents)
    }

    pub fn target(&self) -> DeploymentTarget {
        DeploymentTarget {
            service_name: self.service_name.clone(),
            slot: self.deployment_slot,
            deployment_name: self.deployment_name.clone(),
        }
    }

    /// Checks the job settings and that everything `operation` reads from the
    /// local disk is present.
    pub fn validate_for(&self, operation: RunnerOperation) -> Result<(), ManifestError> {
        if self.max_job_length_secs > MAX_JOB_LENGTH_SECS {
            return Err(ManifestError::JobLengthTooLong(self.max_job_length_secs));
        }
        for (index, job) in self.jobs.iter().enumerate() {
            job.validate().map_err(|e| ManifestError::InvalidJob { index, message: e.to_string() })?;
        }

        // full-run stages as part of its deploy step
        if !matches!(operation, RunnerOperation::Stage | RunnerOperation::Deploy | RunnerOperation::FullRun) {
            return Ok(());
        }

        let package = self.package_file.as_deref().ok_or(ManifestError::MissingField("package_file"))?;
        let required = std::iter::once(package)
            .chain(self.staging_files.iter().map(PathBuf::as_path))
            .chain(self.data_files.iter().map(PathBuf::as_path));

        let missing: Vec<PathBuf> = required.filter(|path| !path.is_file()).map(Path::to_path_buf).collect();
        if !missing.is_empty() {
            return Err(ManifestError::MissingFiles(missing));
        }
        Ok(())
    }
}
