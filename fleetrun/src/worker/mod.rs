pub mod config;
pub mod job_worker;
pub mod preparation;

pub use config::WorkerSettings;
pub use job_worker::JobExecutionWorker;
