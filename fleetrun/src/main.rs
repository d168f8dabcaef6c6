use std::sync::Arc;
use std::time::Duration;

use clap::Parser as _;
use dotenvy::dotenv;
use fleetrun::cli::{Cli, Commands, RunCmd, WorkerCmd};
use fleetrun::core::client::control_plane::http::HttpControlPlane;
use fleetrun::core::client::process::LocalProcessRunner;
use fleetrun::core::config::Config;
use fleetrun::deployment::DeploymentMonitor;
use fleetrun::runner::OperatorDriver;
use fleetrun::transfer::{ChunkedTransferEngine, TransferSettings};
use fleetrun::types::deployment::QuorumPolicy;
use fleetrun::types::manifest::RunManifest;
use fleetrun::utils::logging::init_logging;
use fleetrun::worker::JobExecutionWorker;
use fleetrun::{FleetError, FleetResult};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, info_span, Instrument};

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    dotenv().ok();
    init_logging()?;
    let cli = Cli::parse();

    let shutdown_token = CancellationToken::new();
    listen_for_shutdown(shutdown_token.clone());

    let result = match &cli.command {
        Commands::Run { run_command } => run_operator(run_command, shutdown_token).await,
        Commands::Worker { worker_command } => run_worker(worker_command, shutdown_token).await,
    };

    if let Err(e) = &result {
        error!(error = %e, error_chain = ?e, "Command failed");
    }
    Ok(result?)
}

/// Cancels `token` on ctrl+c. Running jobs finish, pending waits return early.
fn listen_for_shutdown(token: CancellationToken) {
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Shutdown requested");
                token.cancel();
            }
            Err(e) => error!(error = %e, "Failed to listen for ctrl+c"),
        }
    });
}

async fn run_operator(run_cmd: &RunCmd, shutdown_token: CancellationToken) -> FleetResult<()> {
    let manifest = RunManifest::from_file(&run_cmd.manifest)?;
    let config = Config::from_cli(&run_cmd.aws_config_args, &run_cmd.aws_s3_args).await?;
    let transfer = TransferSettings::try_from(&run_cmd.transfer_args)?;

    let control_plane_args = &run_cmd.control_plane_args;
    let control_plane = HttpControlPlane::new(
        control_plane_args.control_plane_url.clone(),
        control_plane_args.subscription_id.clone(),
        control_plane_args.control_plane_token.clone(),
    );
    let monitor = DeploymentMonitor::new(
        Arc::new(control_plane),
        Duration::from_secs(control_plane_args.operation_poll_secs),
        QuorumPolicy::new(control_plane_args.quorum)?,
        shutdown_token.clone(),
    );

    let driver = OperatorDriver::new(
        manifest,
        config.bucket(),
        ChunkedTransferEngine::new(config.store(), transfer),
        config.queue(),
        monitor,
        Duration::from_secs(run_cmd.queue_poll_secs),
        shutdown_token,
    );
    driver.execute(run_cmd.operation).await
}

async fn run_worker(worker_cmd: &WorkerCmd, shutdown_token: CancellationToken) -> FleetResult<()> {
    let config = Config::from_cli(&worker_cmd.aws_config_args, &worker_cmd.aws_s3_args).await?;
    let transfer = TransferSettings::try_from(&worker_cmd.transfer_args)?;
    let worker_args = &worker_cmd.worker_args;

    let worker = JobExecutionWorker::new(
        worker_args.to_settings(transfer)?,
        config.store(),
        config.queue(),
        Arc::new(LocalProcessRunner),
        shutdown_token,
    );

    async {
        if !worker_args.skip_preparation {
            let staged = worker.prepare_node().await?;
            info!(staged, "Node prepared");
        }
        worker.run().await;
        Ok::<(), FleetError>(())
    }
    .instrument(info_span!("node", node = %worker_args.node_name))
    .await
}
