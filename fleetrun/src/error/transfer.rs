use std::path::PathBuf;

use thiserror::Error;

use crate::core::client::storage::StorageError;
use crate::types::transfer::BlockId;

/// Any of these fails the whole transfer; nothing is retried and no partial result is kept.
#[derive(Error, Debug)]
pub enum TransferError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to stage block {block_id} of {key}: {source}")]
    StageBlock {
        key: String,
        block_id: BlockId,
        #[source]
        source: StorageError,
    },

    #[error("Failed to fetch block {block_id} of {key}: {source}")]
    FetchBlock {
        key: String,
        block_id: BlockId,
        #[source]
        source: StorageError,
    },

    #[error("Failed to commit blocks of {key}: {source}")]
    Commit {
        key: String,
        #[source]
        source: StorageError,
    },

    #[error("Block {block_id} of {key} returned {actual} bytes, expected {expected}")]
    LengthMismatch { key: String, block_id: BlockId, expected: u64, actual: u64 },

    #[error("Block size {0} does not fit in memory on this platform")]
    BlockTooLarge(u64),

    #[error("Object key {0} does not map to a path inside the target directory")]
    UnsafeKey(String),

    #[error("Invalid transfer settings: {0}")]
    InvalidSettings(String),

    #[error("Transfer task failed: {0}")]
    TaskFailed(String),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl TransferError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io { path: path.into(), source }
    }
}
