use clap::Args;

/// Parameters used to config AWS.
/// Credentials are resolved by the default AWS provider chain.
#[derive(Debug, Clone, Args)]
pub struct AWSConfigCliArgs {
    /// Region overriding the one of the AWS environment.
    #[arg(env = "FLEETRUN_AWS_REGION", long)]
    pub aws_region: Option<String>,
}
