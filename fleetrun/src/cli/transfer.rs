use clap::Args;

use crate::error::transfer::TransferError;
use crate::transfer::TransferSettings;
use crate::types::constant::{
    DEFAULT_MAX_BLOCK_SIZE, DEFAULT_MAX_PARALLEL_BLOCKS, DEFAULT_MAX_PARALLEL_OBJECTS, MIN_S3_BLOCK_SIZE,
};

/// Parameters of the chunked transfer engine.
#[derive(Debug, Clone, Args)]
pub struct TransferCliArgs {
    /// Size of one transfer block in bytes. At least 5 MiB, the smallest S3 multipart part.
    #[arg(env = "FLEETRUN_BLOCK_SIZE_BYTES", long, default_value_t = DEFAULT_MAX_BLOCK_SIZE)]
    pub block_size_bytes: u64,

    /// Blocks of one object transferred at the same time.
    #[arg(env = "FLEETRUN_MAX_PARALLEL_BLOCKS", long, default_value_t = DEFAULT_MAX_PARALLEL_BLOCKS)]
    pub max_parallel_blocks: usize,

    /// Objects downloaded at the same time when fetching a whole prefix.
    #[arg(env = "FLEETRUN_MAX_PARALLEL_OBJECTS", long, default_value_t = DEFAULT_MAX_PARALLEL_OBJECTS)]
    pub max_parallel_objects: usize,
}

impl TryFrom<&TransferCliArgs> for TransferSettings {
    type Error = TransferError;

    /// The command line always builds an S3-backed engine, whose multipart
    /// uploads reject parts below the S3 minimum.
    fn try_from(args: &TransferCliArgs) -> Result<Self, Self::Error> {
        if args.block_size_bytes < MIN_S3_BLOCK_SIZE {
            return Err(TransferError::InvalidSettings(format!(
                "block_size_bytes must be at least {MIN_S3_BLOCK_SIZE}, got {}",
                args.block_size_bytes
            )));
        }
        TransferSettings::new(args.block_size_bytes, args.max_parallel_blocks, args.max_parallel_objects)
    }
}
