use tokio::fs;
use tracing::info;

use crate::error::job::JobError;
use crate::types::constant::{STAGING_ACTIONS_FILE_NAME, STAGING_PREFIX};
use crate::types::job::ExecutableStep;
use crate::worker::job_worker::JobExecutionWorker;

impl JobExecutionWorker {
    /// Brings a fresh node up to date before it takes jobs: everything under the
    /// staging prefix is downloaded into scratch, then the staging actions, if
    /// any were published, run in order. Returns the number of staged files.
    pub async fn prepare_node(&self) -> Result<usize, JobError> {
        let scratch_dir = &self.settings().scratch_dir;
        fs::create_dir_all(scratch_dir)
            .await
            .map_err(|e| JobError::Preparation(format!("cannot create {}: {e}", scratch_dir.display())))?;

        let staged = self
            .engine()
            .download_prefix(STAGING_PREFIX, scratch_dir, None)
            .await
            .map_err(|e| JobError::Preparation(format!("failed to download staging files: {e}")))?;
        info!(files = staged.len(), "Staging files downloaded");

        let actions_path = scratch_dir.join(STAGING_ACTIONS_FILE_NAME);
        if !fs::try_exists(&actions_path).await.unwrap_or(false) {
            return Ok(staged.len());
        }

        let document = fs::read_to_string(&actions_path)
            .await
            .map_err(|e| JobError::Preparation(format!("cannot read {}: {e}", actions_path.display())))?;
        let actions: Vec<ExecutableStep> = serde_json::from_str(&document)
            .map_err(|e| JobError::Preparation(format!("invalid {STAGING_ACTIONS_FILE_NAME}: {e}")))?;

        info!(actions = actions.len(), "Running staging actions");
        self.run_steps(&actions).await?;
        Ok(staged.len())
    }
}
