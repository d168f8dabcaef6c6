use std::time::Duration;

/// Object store prefix holding deployment packages.
pub const PACKAGES_PREFIX: &str = "packages/";
/// Object store prefix holding files every node downloads on start.
pub const STAGING_PREFIX: &str = "stagingfiles/";
/// Object store prefix holding job inputs.
pub const DATA_PREFIX: &str = "datafiles/";
/// Object store prefix receiving job outputs.
pub const OUTPUT_PREFIX: &str = "output/";

/// Name of the staging actions document under [`STAGING_PREFIX`].
pub const STAGING_ACTIONS_FILE_NAME: &str = "staging_actions.json";

/// S3 rejects multipart parts below 5 MiB (except the last one).
pub const DEFAULT_MAX_BLOCK_SIZE: u64 = 8 * 1024 * 1024;
pub const MIN_S3_BLOCK_SIZE: u64 = 5 * 1024 * 1024;
pub const DEFAULT_MAX_PARALLEL_BLOCKS: usize = 16;
pub const DEFAULT_MAX_PARALLEL_OBJECTS: usize = 2;

pub const DEFAULT_QUORUM_FRACTION: f64 = 0.8;

/// Longest visibility timeout SQS accepts, which bounds the job length.
pub const MAX_JOB_LENGTH_SECS: u64 = 12 * 60 * 60;
/// Long poll window of a lease. SQS allows 1 to 20 seconds.
pub const QUEUE_RECEIVE_WAIT: Duration = Duration::from_secs(10);

pub const DEFAULT_OPERATION_POLL_INTERVAL: Duration = Duration::from_secs(10);
pub const DEFAULT_QUEUE_POLL_INTERVAL: Duration = Duration::from_secs(30);

/// Header carrying the asynchronous operation id on control plane responses.
pub const REQUEST_ID_HEADER: &str = "x-request-id";
