pub mod error;
pub mod sqs;

use async_trait::async_trait;
pub use error::QueueError;
use std::time::Duration;

/// A message taken off the queue under a lease.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeasedMessage {
    pub message_id: Option<String>,
    pub body: String,
    /// Opaque handle proving the lease, needed to delete the message
    pub receipt: String,
}

/// Trait defining queue operations
///
/// Leased messages are invisible to other consumers until `visibility_timeout`
/// elapses; a message that is not deleted within that window is delivered again.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait JobQueue: Send + Sync {
    /// Create the queue if it does not exist yet
    async fn ensure_queue(&self, queue: &str, visibility_timeout: Duration) -> Result<(), QueueError>;
    async fn enqueue(&self, queue: &str, payload: String) -> Result<(), QueueError>;
    /// Lease at most one visible message, `None` when nothing is visible
    async fn lease(&self, queue: &str, visibility_timeout: Duration) -> Result<Option<LeasedMessage>, QueueError>;
    async fn delete(&self, queue: &str, receipt: &str) -> Result<(), QueueError>;
    /// Messages still on the queue, including leased ones. Eventually consistent.
    async fn approximate_length(&self, queue: &str) -> Result<u64, QueueError>;
}
