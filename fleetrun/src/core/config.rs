use std::sync::Arc;

use aws_config::{Region, SdkConfig};
use tracing::info;

use crate::cli::provider::aws::AWSConfigCliArgs;
use crate::cli::storage::aws_s3::AWSS3CliArgs;
use crate::core::client::queue::sqs::SQS;
use crate::core::client::queue::JobQueue;
use crate::core::client::storage::s3::AWSS3;
use crate::core::client::storage::ObjectStore;
use crate::error::FleetResult;

/// Loads the AWS environment, applying the region override if one is given.
pub async fn load_aws_config(args: &AWSConfigCliArgs) -> SdkConfig {
    let mut loader = aws_config::from_env();
    if let Some(region) = &args.aws_region {
        loader = loader.region(Region::new(region.clone()));
    }
    loader.load().await
}

/// Provider clients shared by the operator and the workers
#[derive(Clone)]
pub struct Config {
    bucket: String,
    store: Arc<dyn ObjectStore>,
    queue: Arc<dyn JobQueue>,
}

impl Config {
    pub fn new(bucket: impl Into<String>, store: Arc<dyn ObjectStore>, queue: Arc<dyn JobQueue>) -> Self {
        Self { bucket: bucket.into(), store, queue }
    }

    /// Builds the S3 object store and SQS queue clients from the CLI parameters.
    pub async fn from_cli(aws_args: &AWSConfigCliArgs, s3_args: &AWSS3CliArgs) -> FleetResult<Self> {
        let aws_config = load_aws_config(aws_args).await;
        let s3 = AWSS3::new(&aws_config, &s3_args.bucket_identifier)?;
        info!(bucket = %s3.bucket_name(), arn_region = ?s3.region(), region = ?aws_config.region(), "Using S3 bucket");

        let bucket = s3.bucket_name().to_string();
        Ok(Self::new(bucket, Arc::new(s3), Arc::new(SQS::new(&aws_config))))
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    pub fn store(&self) -> Arc<dyn ObjectStore> {
        Arc::clone(&self.store)
    }

    pub fn queue(&self) -> Arc<dyn JobQueue> {
        Arc::clone(&self.queue)
    }
}
