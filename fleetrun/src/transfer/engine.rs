use std::io::SeekFrom;
use std::num::{NonZeroU64, NonZeroUsize};
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use bytes::Bytes;
use futures::{stream, StreamExt};
use tokio::fs::{self, File};
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinSet;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::core::client::storage::{ObjectStore, StagedUpload, StorageError};
use crate::error::transfer::TransferError;
use crate::transfer::planner::plan_transfer;
use crate::types::constant::{DEFAULT_MAX_BLOCK_SIZE, DEFAULT_MAX_PARALLEL_BLOCKS, DEFAULT_MAX_PARALLEL_OBJECTS};
use crate::types::transfer::{BlockSpec, TransferPlan};

/// Limits of the transfer engine. The block parallelism bound applies to uploads
/// and downloads alike.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferSettings {
    pub max_block_size: NonZeroU64,
    pub max_parallel_blocks: NonZeroUsize,
    pub max_parallel_objects: NonZeroUsize,
}

impl TransferSettings {
    pub fn new(
        max_block_size: u64,
        max_parallel_blocks: usize,
        max_parallel_objects: usize,
    ) -> Result<Self, TransferError> {
        let invalid = |name: &str| TransferError::InvalidSettings(format!("{name} must be greater than zero"));
        Ok(Self {
            max_block_size: NonZeroU64::new(max_block_size).ok_or_else(|| invalid("max_block_size"))?,
            max_parallel_blocks: NonZeroUsize::new(max_parallel_blocks).ok_or_else(|| invalid("max_parallel_blocks"))?,
            max_parallel_objects: NonZeroUsize::new(max_parallel_objects)
                .ok_or_else(|| invalid("max_parallel_objects"))?,
        })
    }
}

impl Default for TransferSettings {
    fn default() -> Self {
        Self {
            max_block_size: NonZeroU64::new(DEFAULT_MAX_BLOCK_SIZE).unwrap_or(NonZeroU64::MIN),
            max_parallel_blocks: NonZeroUsize::new(DEFAULT_MAX_PARALLEL_BLOCKS).unwrap_or(NonZeroUsize::MIN),
            max_parallel_objects: NonZeroUsize::new(DEFAULT_MAX_PARALLEL_OBJECTS).unwrap_or(NonZeroUsize::MIN),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadOutcome {
    pub url: String,
    /// The remote object already had the local size and was left untouched
    pub skipped: bool,
}

/// Moves whole files to and from the object store block by block.
///
/// Blocks of one object are transferred concurrently and only meet again at a
/// barrier: uploads commit the ordered block list once every block is staged,
/// downloads append the block files in order once every block is on disk.
/// A failed transfer leaves neither a committed object nor a destination file.
#[derive(Clone)]
pub struct ChunkedTransferEngine {
    store: Arc<dyn ObjectStore>,
    settings: TransferSettings,
}

impl ChunkedTransferEngine {
    pub fn new(store: Arc<dyn ObjectStore>, settings: TransferSettings) -> Self {
        Self { store, settings }
    }

    pub fn store(&self) -> &Arc<dyn ObjectStore> {
        &self.store
    }

    pub fn settings(&self) -> &TransferSettings {
        &self.settings
    }

    /// Uploads `path` as `key` and returns the object URL.
    #[instrument(skip(self, path), fields(path = %path.display()))]
    pub async fn upload_file(&self, path: &Path, key: &str) -> Result<String, TransferError> {
        let object_size = fs::metadata(path).await.map_err(|e| TransferError::io(path, e))?.len();
        let plan = plan_transfer(object_size, self.settings.max_block_size);
        let upload = self.store.begin_staged_upload(key).await?;

        let result = match self.stage_blocks(path, &upload, &plan).await {
            Ok(()) => self
                .store
                .commit_blocks(&upload, &plan.committed_block_ids())
                .await
                .map_err(|source| TransferError::Commit { key: key.to_string(), source }),
            Err(e) => Err(e),
        };

        if let Err(e) = result {
            if let Err(abort_error) = self.store.abort_staged_upload(&upload).await {
                warn!(key, error = %abort_error, "Failed to abort staged upload");
            }
            return Err(e);
        }

        info!(key, bytes = object_size, blocks = plan.non_empty_blocks().count(), "Uploaded object");
        Ok(self.store.object_url(key))
    }

    /// Uploads `path` unless the remote object already exists with the same size.
    pub async fn upload_if_changed(&self, path: &Path, key: &str) -> Result<UploadOutcome, TransferError> {
        let local_size = fs::metadata(path).await.map_err(|e| TransferError::io(path, e))?.len();
        match self.store.object_length(key).await {
            Ok(remote_size) if remote_size > 0 && remote_size == local_size => {
                debug!(key, size = local_size, "Remote object has the same size, skipping upload");
                return Ok(UploadOutcome { url: self.store.object_url(key), skipped: true });
            }
            Ok(_) | Err(StorageError::ObjectNotFound(_)) => {}
            Err(e) => return Err(e.into()),
        }
        let url = self.upload_file(path, key).await?;
        Ok(UploadOutcome { url, skipped: false })
    }

    /// Single-shot upload for small generated payloads.
    pub async fn upload_bytes(&self, key: &str, data: Bytes) -> Result<String, TransferError> {
        let size = data.len();
        self.store.put_object(key, data).await?;
        debug!(key, bytes = size, "Uploaded payload");
        Ok(self.store.object_url(key))
    }

    async fn stage_blocks(&self, path: &Path, upload: &StagedUpload, plan: &TransferPlan) -> Result<(), TransferError> {
        let semaphore = Arc::new(Semaphore::new(self.settings.max_parallel_blocks.get()));
        let mut tasks = JoinSet::new();

        for block in plan.non_empty_blocks().cloned() {
            let store = Arc::clone(&self.store);
            let semaphore = Arc::clone(&semaphore);
            let upload = upload.clone();
            let path = path.to_path_buf();

            tasks.spawn(async move {
                let _permit = semaphore.acquire_owned().await.map_err(|e| TransferError::TaskFailed(e.to_string()))?;
                let data = read_block(&path, &block).await?;
                store.put_staged_block(&upload, &block.block_id, data).await.map_err(|source| {
                    TransferError::StageBlock { key: upload.key.clone(), block_id: block.block_id.clone(), source }
                })
            });
        }

        join_block_tasks(tasks).await
    }

    /// Downloads `key` into `destination` and returns the number of bytes written.
    #[instrument(skip(self, destination), fields(destination = %destination.display()))]
    pub async fn download_file(&self, key: &str, destination: &Path) -> Result<u64, TransferError> {
        let object_size = self.store.object_length(key).await?;
        let plan = plan_transfer(object_size, self.settings.max_block_size);

        let parent = match destination.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let file_name = destination
            .file_name()
            .ok_or_else(|| TransferError::UnsafeKey(destination.display().to_string()))?
            .to_string_lossy()
            .into_owned();
        fs::create_dir_all(&parent).await.map_err(|e| TransferError::io(&parent, e))?;

        // Private to this download, next to the destination so the final rename stays on one filesystem.
        let nonce = Uuid::new_v4().simple();
        let staging_dir = parent.join(format!(".{file_name}.{nonce}.blocks"));
        let partial = parent.join(format!(".{file_name}.{nonce}.partial"));

        let result = self.fetch_and_assemble(key, &plan, &staging_dir, &partial, destination).await;

        remove_dir_if_present(&staging_dir).await;
        if result.is_err() {
            remove_file_if_present(&partial).await;
        }
        result?;

        info!(key, bytes = object_size, blocks = plan.non_empty_blocks().count(), "Downloaded object");
        Ok(object_size)
    }

    async fn fetch_and_assemble(
        &self,
        key: &str,
        plan: &TransferPlan,
        staging_dir: &Path,
        partial: &Path,
        destination: &Path,
    ) -> Result<(), TransferError> {
        fs::create_dir_all(staging_dir).await.map_err(|e| TransferError::io(staging_dir, e))?;
        self.fetch_blocks(key, plan, staging_dir).await?;

        let mut output = File::create(partial).await.map_err(|e| TransferError::io(partial, e))?;
        for block in plan.non_empty_blocks() {
            let block_path = block_file(staging_dir, block);
            let mut part = File::open(&block_path).await.map_err(|e| TransferError::io(&block_path, e))?;
            tokio::io::copy(&mut part, &mut output).await.map_err(|e| TransferError::io(partial, e))?;
            drop(part);
            fs::remove_file(&block_path).await.map_err(|e| TransferError::io(&block_path, e))?;
        }
        output.flush().await.map_err(|e| TransferError::io(partial, e))?;
        output.sync_all().await.map_err(|e| TransferError::io(partial, e))?;
        drop(output);

        fs::rename(partial, destination).await.map_err(|e| TransferError::io(destination, e))
    }

    async fn fetch_blocks(&self, key: &str, plan: &TransferPlan, staging_dir: &Path) -> Result<(), TransferError> {
        let semaphore = Arc::new(Semaphore::new(self.settings.max_parallel_blocks.get()));
        let mut tasks = JoinSet::new();

        for block in plan.non_empty_blocks().cloned() {
            let store = Arc::clone(&self.store);
            let semaphore = Arc::clone(&semaphore);
            let key = key.to_string();
            let block_path = block_file(staging_dir, &block);

            tasks.spawn(async move {
                let _permit = semaphore.acquire_owned().await.map_err(|e| TransferError::TaskFailed(e.to_string()))?;
                let data = store.get_range(&key, block.offset, block.length).await.map_err(|source| {
                    TransferError::FetchBlock { key: key.clone(), block_id: block.block_id.clone(), source }
                })?;
                if data.len() as u64 != block.length {
                    return Err(TransferError::LengthMismatch {
                        key,
                        block_id: block.block_id,
                        expected: block.length,
                        actual: data.len() as u64,
                    });
                }
                fs::write(&block_path, &data).await.map_err(|e| TransferError::io(&block_path, e))
            });
        }

        join_block_tasks(tasks).await
    }

    /// Downloads every object under `prefix` into `target_dir`, keeping the key
    /// layout below the prefix. Each finished file is also sent on `notify`.
    pub async fn download_prefix(
        &self,
        prefix: &str,
        target_dir: &Path,
        notify: Option<mpsc::UnboundedSender<PathBuf>>,
    ) -> Result<Vec<PathBuf>, TransferError> {
        let objects = self.store.list(prefix).await?;
        info!(prefix, objects = objects.len(), target = %target_dir.display(), "Downloading objects under prefix");

        let downloads = objects.into_iter().map(|object| {
            let notify = notify.clone();
            async move {
                let destination = target_dir.join(relative_object_path(prefix, &object.key)?);
                self.download_file(&object.key, &destination).await?;
                if let Some(notify) = notify {
                    // nobody listening is fine, the path is also returned
                    let _ = notify.send(destination.clone());
                }
                Ok::<_, TransferError>(destination)
            }
        });

        // Let every started download finish so none is cut off halfway.
        let results: Vec<_> =
            stream::iter(downloads).buffer_unordered(self.settings.max_parallel_objects.get()).collect().await;

        let mut downloaded = Vec::with_capacity(results.len());
        for result in results {
            downloaded.push(result?);
        }
        downloaded.sort();
        Ok(downloaded)
    }
}

/// Waits for every block task. On the first failure the remaining tasks are
/// aborted and awaited, so nothing touches the transfer after this returns.
async fn join_block_tasks(mut tasks: JoinSet<Result<(), TransferError>>) -> Result<(), TransferError> {
    while let Some(joined) = tasks.join_next().await {
        let outcome = joined.map_err(|e| TransferError::TaskFailed(e.to_string())).and_then(|result| result);
        if let Err(e) = outcome {
            tasks.abort_all();
            while tasks.join_next().await.is_some() {}
            return Err(e);
        }
    }
    Ok(())
}

async fn read_block(path: &Path, block: &BlockSpec) -> Result<Bytes, TransferError> {
    let length = usize::try_from(block.length).map_err(|_| TransferError::BlockTooLarge(block.length))?;
    let mut file = File::open(path).await.map_err(|e| TransferError::io(path, e))?;
    file.seek(SeekFrom::Start(block.offset)).await.map_err(|e| TransferError::io(path, e))?;
    let mut buffer = vec![0u8; length];
    file.read_exact(&mut buffer).await.map_err(|e| TransferError::io(path, e))?;
    Ok(Bytes::from(buffer))
}

fn block_file(staging_dir: &Path, block: &BlockSpec) -> PathBuf {
    staging_dir.join(format!("{}.part", block.block_id))
}

/// Maps an object key below `prefix` to a relative path that cannot leave the target directory.
pub(crate) fn relative_object_path(prefix: &str, key: &str) -> Result<PathBuf, TransferError> {
    let relative = key.strip_prefix(prefix).unwrap_or(key).trim_start_matches('/');
    let path = Path::new(relative);
    if relative.is_empty() || !path.components().all(|component| matches!(component, Component::Normal(_))) {
        return Err(TransferError::UnsafeKey(key.to_string()));
    }
    Ok(path.to_path_buf())
}

async fn remove_dir_if_present(path: &Path) {
    match fs::remove_dir_all(path).await {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!(path = %path.display(), error = %e, "Failed to remove block staging directory"),
    }
}

async fn remove_file_if_present(path: &Path) {
    match fs::remove_file(path).await {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!(path = %path.display(), error = %e, "Failed to remove partial download"),
    }
}
