pub mod error;
pub mod s3;

use async_trait::async_trait;
use bytes::Bytes;
pub use error::StorageError;

use crate::types::transfer::BlockId;

/// An upload whose blocks are staged independently and become visible only on commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedUpload {
    pub key: String,
    pub upload_id: String,
}

/// Object listing entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectSummary {
    /// Full object key, including the listed prefix
    pub key: String,
    /// Object size in bytes
    pub size: u64,
}

/// Trait defining the object store operations the transfer engine is built on
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Start a staged upload for `key`
    async fn begin_staged_upload(&self, key: &str) -> Result<StagedUpload, StorageError>;

    /// Stage one block of the upload. Blocks may be staged in any order and concurrently.
    async fn put_staged_block(&self, upload: &StagedUpload, block_id: &BlockId, data: Bytes)
        -> Result<(), StorageError>;

    /// Make the object consist of exactly `block_ids`, in that order.
    /// An empty list commits an empty object.
    async fn commit_blocks(&self, upload: &StagedUpload, block_ids: &[BlockId]) -> Result<(), StorageError>;

    /// Discard every staged block of the upload
    async fn abort_staged_upload(&self, upload: &StagedUpload) -> Result<(), StorageError>;

    /// Size of the object, [`StorageError::ObjectNotFound`] when it does not exist
    async fn object_length(&self, key: &str) -> Result<u64, StorageError>;

    /// Read `length` bytes starting at `offset`
    async fn get_range(&self, key: &str, offset: u64, length: u64) -> Result<Bytes, StorageError>;

    /// All objects whose key starts with `prefix`
    async fn list(&self, prefix: &str) -> Result<Vec<ObjectSummary>, StorageError>;

    /// Single-shot upload of a small object
    async fn put_object(&self, key: &str, data: Bytes) -> Result<(), StorageError>;

    /// Location of the object as handed to other services
    fn object_url(&self, key: &str) -> String;
}
