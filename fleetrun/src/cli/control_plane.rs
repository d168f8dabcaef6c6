use clap::Args;
use url::Url;

use crate::types::constant::{DEFAULT_OPERATION_POLL_INTERVAL, DEFAULT_QUORUM_FRACTION};

/// Parameters used to reach the fleet control plane.
#[derive(Debug, Clone, Args)]
pub struct ControlPlaneCliArgs {
    /// Base URL of the control plane API.
    #[arg(env = "FLEETRUN_CONTROL_PLANE_URL", long)]
    pub control_plane_url: Url,

    /// Subscription owning the hosted services.
    #[arg(env = "FLEETRUN_SUBSCRIPTION_ID", long)]
    pub subscription_id: String,

    /// Bearer token sent with every request.
    #[arg(env = "FLEETRUN_CONTROL_PLANE_TOKEN", long, hide_env_values = true)]
    pub control_plane_token: Option<String>,

    /// Seconds between two polls of an operation or of the fleet status.
    #[arg(env = "FLEETRUN_OPERATION_POLL_SECS", long, default_value_t = DEFAULT_OPERATION_POLL_INTERVAL.as_secs())]
    pub operation_poll_secs: u64,

    /// Fraction of nodes that must be ready for the fleet to count as started.
    #[arg(env = "FLEETRUN_QUORUM", long, default_value_t = DEFAULT_QUORUM_FRACTION)]
    pub quorum: f64,
}
