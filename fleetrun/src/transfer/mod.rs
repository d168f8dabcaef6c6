pub mod engine;
pub mod planner;

pub use engine::{ChunkedTransferEngine, TransferSettings, UploadOutcome};
pub use planner::plan_transfer;
