pub mod cli;
pub mod core;
pub mod deployment;
pub mod error;
pub mod runner;
pub mod transfer;
pub mod types;
pub mod utils;
pub mod worker;


// Re-export commonly used item
pub use error::{FleetError, FleetResult};
