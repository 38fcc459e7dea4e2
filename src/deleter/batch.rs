//! Batch deletion using the S3 DeleteObjects API, with retry of the
//! transient `InternalError` code.

use std::sync::Arc;

use anyhow::{Result, anyhow};
use aws_sdk_s3::operation::delete_objects::DeleteObjectsOutput;
use tracing::{debug, warn};

use crate::storage::Storage;
use crate::types::error::{ItemDeleteError, S3purgeError, storage_error_code};
use crate::types::token::PipelineCancellationToken;
use crate::types::{DeleteBatch, ObjectVersionId, PurgeMetrics};

/// Maximum objects per batch DeleteObjects API call (S3 limit).
pub const MAX_BATCH_SIZE: usize = 1000;

/// The only error code treated as retry-safe.
pub const TRANSIENT_ERROR_CODE: &str = "InternalError";

/// Exact match against [`TRANSIENT_ERROR_CODE`].
pub fn is_transient_error_code(code: &str) -> bool {
    code == TRANSIENT_ERROR_CODE
}

/// Deletes one [`DeleteBatch`] to completion.
///
/// A transient failure of the whole call resubmits the batch as-is. When the
/// call succeeds but some items fail, the items that failed with the
/// transient code form a retry cohort and are resubmitted by the same
/// worker; any other item error fails the batch. Retries have no cap and no
/// backoff, and stop when the run is cancelled.
pub struct BatchDeleter {
    target: Storage,
    metrics: Arc<dyn PurgeMetrics>,
    cancellation_token: PipelineCancellationToken,
}

impl BatchDeleter {
    pub fn new(
        target: Storage,
        metrics: Arc<dyn PurgeMetrics>,
        cancellation_token: PipelineCancellationToken,
    ) -> Self {
        Self {
            target,
            metrics,
            cancellation_token,
        }
    }

    pub async fn delete(&self, batch: &DeleteBatch) -> Result<()> {
        let mut pending: Vec<ObjectVersionId> = batch.objects.clone();
        let mut attempt: u64 = 0;

        while !pending.is_empty() {
            if self.cancellation_token.is_cancelled() {
                debug!(
                    bucket = batch.bucket,
                    remaining = pending.len(),
                    "batch deletion cancelled."
                );
                return Ok(());
            }
            attempt += 1;

            let output = match self.send_delete(&batch.bucket, &pending).await {
                Ok(output) => output,
                Err(e) if storage_error_code(&e).is_some_and(is_transient_error_code) => {
                    warn!(
                        bucket = batch.bucket,
                        object_count = pending.len(),
                        attempt = attempt,
                        "DeleteObjects failed with {}, resubmitting the whole batch.",
                        TRANSIENT_ERROR_CODE,
                    );
                    continue;
                }
                Err(e) => {
                    return Err(e.context(format!(
                        "error while deleting {} objects from bucket {}",
                        pending.len(),
                        batch.bucket
                    )));
                }
            };

            self.metrics.add_deleted(output.deleted().len() as u64);

            let errors = item_errors(&output);
            if errors.is_empty() {
                break;
            }

            if !errors.iter().all(|e| is_transient_error_code(&e.code)) {
                return Err(anyhow!(S3purgeError::NonRetryableDelete {
                    bucket: batch.bucket.clone(),
                    errors,
                }));
            }

            debug!(
                bucket = batch.bucket,
                deleted = output.deleted().len(),
                retry_count = errors.len(),
                attempt = attempt,
                "resubmitting items that failed with {}.",
                TRANSIENT_ERROR_CODE,
            );
            pending = errors
                .into_iter()
                .map(|e| ObjectVersionId::new(e.key, e.version_id))
                .collect();
        }

        Ok(())
    }

    async fn send_delete(
        &self,
        bucket: &str,
        objects: &[ObjectVersionId],
    ) -> Result<DeleteObjectsOutput> {
        self.metrics.inc_deletes_pending();
        let result = self.target.delete_objects(bucket, objects).await;
        self.metrics.inc_requests();
        self.metrics.dec_deletes_pending();
        result
    }
}

fn item_errors(output: &DeleteObjectsOutput) -> Vec<ItemDeleteError> {
    output
        .errors()
        .iter()
        .map(|e| ItemDeleteError {
            key: e.key().unwrap_or_default().to_string(),
            version_id: e.version_id().map(String::from),
            code: e.code().unwrap_or("unknown").to_string(),
            message: e.message().unwrap_or("no message").to_string(),
        })
        .collect()
}
