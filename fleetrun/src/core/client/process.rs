use std::path::Path;

use async_trait::async_trait;
use tokio::process::Command;

/// How a step process ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessExit {
    /// `None` when the process was terminated by a signal
    pub code: Option<i32>,
}

impl ProcessExit {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

/// Trait defining how job steps are launched.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ProcessRunner: Send + Sync {
    /// Run `executable` to completion inside `working_dir`.
    /// An error means the process could not be launched at all.
    async fn run(&self, executable: &Path, arguments: &[String], working_dir: &Path) -> std::io::Result<ProcessExit>;
}

/// Runs steps as child processes of the worker.
#[derive(Debug, Clone, Default)]
pub struct LocalProcessRunner;

#[async_trait]
impl ProcessRunner for LocalProcessRunner {
    async fn run(&self, executable: &Path, arguments: &[String], working_dir: &Path) -> std::io::Result<ProcessExit> {
        let status =
            Command::new(executable).args(arguments).current_dir(working_dir).kill_on_drop(true).status().await?;
        Ok(ProcessExit { code: status.code() })
    }
}
