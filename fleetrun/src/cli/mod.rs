use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::types::constant::DEFAULT_QUEUE_POLL_INTERVAL;
use crate::types::manifest::RunnerOperation;
use control_plane::ControlPlaneCliArgs;
use provider::aws::AWSConfigCliArgs;
use storage::aws_s3::AWSS3CliArgs;
use transfer::TransferCliArgs;
use worker::WorkerCliArgs;

pub mod control_plane;
pub mod provider;
pub mod storage;
pub mod transfer;
pub mod worker;

#[derive(Parser, Debug)]
#[command(
    name = "fleetrun",
    about = "Run queue-driven jobs across a fleet of worker nodes",
    after_help = "Examples:\n  \
    fleetrun run full-run --manifest run.yaml\n  \
    fleetrun worker --scratch-dir /mnt/scratch --queue-name jobs"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run an operator command against a run manifest
    Run {
        #[command(flatten)]
        run_command: Box<RunCmd>,
    },
    /// Prepare this node and process jobs from the queue until interrupted
    Worker {
        #[command(flatten)]
        worker_command: Box<WorkerCmd>,
    },
}

#[derive(Parser, Debug, Clone)]
pub struct RunCmd {
    /// Operation to perform.
    #[arg(value_enum)]
    pub operation: RunnerOperation,

    /// Path of the YAML run manifest.
    #[arg(env = "FLEETRUN_MANIFEST", long, short = 'm')]
    pub manifest: PathBuf,

    /// Seconds between two polls of the queue length.
    #[arg(env = "FLEETRUN_QUEUE_POLL_SECS", long, default_value_t = DEFAULT_QUEUE_POLL_INTERVAL.as_secs())]
    pub queue_poll_secs: u64,

    #[clap(flatten)]
    pub aws_config_args: AWSConfigCliArgs,

    #[clap(flatten)]
    pub aws_s3_args: AWSS3CliArgs,

    #[clap(flatten)]
    pub control_plane_args: ControlPlaneCliArgs,

    #[clap(flatten)]
    pub transfer_args: TransferCliArgs,
}

#[derive(Parser, Debug, Clone)]
pub struct WorkerCmd {
    #[clap(flatten)]
    pub aws_config_args: AWSConfigCliArgs,

    #[clap(flatten)]
    pub aws_s3_args: AWSS3CliArgs,

    #[clap(flatten)]
    pub worker_args: WorkerCliArgs,

    #[clap(flatten)]
    pub transfer_args: TransferCliArgs,
}
