//! Local to remote tier migration
//!
//! [`TieredStorageMover::move_to_remote`] opens the local file on the caller's
//! task, so a missing or unreadable file fails immediately. The upload itself
//! runs on a spawned task and reports through the returned [`UploadTicket`];
//! the local handle stays open until that task finishes, which keeps the file
//! busy for any concurrent delete.

use cadence_core::WorkerConfig;
use cadence_storage::keys::remote_key;
use cadence_storage::{LocalStorage, RemoteStorage, StorageError, StorageResult};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use uuid::Uuid;

/// Backoff for deletes blocked by an open local handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeleteRetryPolicy {
    pub interval: Duration,
    /// `None` retries until the handle is released.
    pub max_wait: Option<Duration>,
}

impl From<&WorkerConfig> for DeleteRetryPolicy {
    fn from(config: &WorkerConfig) -> Self {
        Self {
            interval: config.delete_retry_interval,
            max_wait: config.delete_max_wait,
        }
    }
}

/// Delete a local key, sleeping `policy.interval` between attempts while the
/// file is busy. Any other error is returned as-is.
pub async fn delete_with_retry(
    local: &LocalStorage,
    key: &str,
    policy: DeleteRetryPolicy,
) -> StorageResult<()> {
    let start = Instant::now();
    let mut attempts: u32 = 0;

    loop {
        match local.delete(key).await {
            Ok(()) => {
                if attempts > 0 {
                    tracing::debug!(key = %key, attempts = attempts, "Local delete succeeded after retry");
                }
                return Ok(());
            }
            Err(StorageError::FileBusy(_)) => {
                attempts += 1;
                if let Some(max_wait) = policy.max_wait {
                    if start.elapsed() >= max_wait {
                        tracing::error!(
                            key = %key,
                            attempts = attempts,
                            waited_ms = start.elapsed().as_millis() as u64,
                            "Local file still busy, giving up on delete"
                        );
                        return Err(StorageError::Timeout(format!(
                            "local delete of {} still busy after {:?}",
                            key, max_wait
                        )));
                    }
                }
                tracing::warn!(
                    key = %key,
                    attempts = attempts,
                    retry_in_ms = policy.interval.as_millis() as u64,
                    "Local file busy, retrying delete"
                );
                tokio::time::sleep(policy.interval).await;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Completion handle for one upload started by [`TieredStorageMover::move_to_remote`].
#[must_use = "an upload's outcome is only observed by waiting on its ticket"]
pub struct UploadTicket {
    remote_key: String,
    handle: JoinHandle<StorageResult<()>>,
}

impl UploadTicket {
    pub fn remote_key(&self) -> &str {
        &self.remote_key
    }

    /// Wait for the upload and its local cleanup to finish.
    pub async fn wait(self) -> StorageResult<()> {
        match self.handle.await {
            Ok(result) => result,
            Err(e) => Err(StorageError::BackendError(format!(
                "upload task for {} did not complete: {}",
                self.remote_key, e
            ))),
        }
    }
}

#[derive(Clone)]
pub struct TieredStorageMover {
    local: LocalStorage,
    remote: Arc<dyn RemoteStorage>,
    delete_policy: DeleteRetryPolicy,
    upload_timeout: Duration,
}

impl TieredStorageMover {
    pub fn new(
        local: LocalStorage,
        remote: Arc<dyn RemoteStorage>,
        delete_policy: DeleteRetryPolicy,
        upload_timeout: Duration,
    ) -> Self {
        Self {
            local,
            remote,
            delete_policy,
            upload_timeout,
        }
    }

    pub fn delete_policy(&self) -> DeleteRetryPolicy {
        self.delete_policy
    }

    /// Start uploading `local_key` to `{remote_directory}/{track_id}`.
    ///
    /// Errors opening the local file are returned directly. Everything after
    /// that, including the optional local delete, is reported by the ticket.
    #[tracing::instrument(skip(self), fields(track_id = %track_id))]
    pub async fn move_to_remote(
        &self,
        local_key: &str,
        remote_directory: &str,
        track_id: Uuid,
        delete_on_complete: bool,
    ) -> StorageResult<UploadTicket> {
        let destination = remote_key(remote_directory, track_id);
        let mut handle = self.local.open(local_key).await?;

        let local = self.local.clone();
        let remote = Arc::clone(&self.remote);
        let policy = self.delete_policy;
        let upload_timeout = self.upload_timeout;
        let source_key = local_key.to_string();
        let task_key = destination.clone();

        let task = tokio::spawn(async move {
            let start = Instant::now();
            let upload = async {
                let data = handle.read_all().await?;
                remote.put(&task_key, data).await
            };

            let result = match tokio::time::timeout(upload_timeout, upload).await {
                Ok(result) => result,
                Err(_) => Err(StorageError::Timeout(format!(
                    "upload of {} timed out after {:?}",
                    task_key, upload_timeout
                ))),
            };

            // Release the local file before any delete attempt.
            drop(handle);

            if let Err(e) = &result {
                tracing::error!(
                    error = %e,
                    local_key = %source_key,
                    remote_key = %task_key,
                    "Upload to remote tier failed"
                );
                return result;
            }

            tracing::debug!(
                local_key = %source_key,
                remote_key = %task_key,
                duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                "Upload to remote tier complete"
            );

            // The upload landed; a busy-file give-up here is a delete failure,
            // not an upload timeout.
            if delete_on_complete {
                delete_with_retry(&local, &source_key, policy)
                    .await
                    .map_err(|e| StorageError::DeleteFailed(e.to_string()))?;
            }
            Ok(())
        });

        Ok(UploadTicket {
            remote_key: destination,
            handle: task,
        })
    }
}
