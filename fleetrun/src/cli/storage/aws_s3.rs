use clap::Args;

/// Parameters used to config AWS S3.
#[derive(Debug, Clone, Args)]
pub struct AWSS3CliArgs {
    /// The ARN / Name of the S3 bucket holding packages, job data and outputs.
    /// ARN: arn:aws:s3:::name
    #[arg(env = "FLEETRUN_AWS_S3_BUCKET_IDENTIFIER", long)]
    pub bucket_identifier: String,
}
