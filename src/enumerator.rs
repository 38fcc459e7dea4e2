use anyhow::{Context, Result, anyhow};
use aws_sdk_s3::operation::list_object_versions::ListObjectVersionsOutput;
use tracing::debug;

use crate::deleter::batch::MAX_BATCH_SIZE;
use crate::stage::{SendResult, Stage};
use crate::types::error::S3purgeError;
use crate::types::{DeleteBatch, ObjectVersionId, Scope};

/// Producer side of the purge pipeline: walks every page of object versions
/// and delete markers under one [`Scope`] and pushes them onto the deletion
/// queue in batches.
///
/// The enumerator has only a `sender`. It never closes the queue; the
/// coordinator does that once every enumerator has returned.
pub struct ObjectVersionEnumerator {
    stage: Stage,
    scope: Scope,
}

impl ObjectVersionEnumerator {
    pub fn new(stage: Stage, scope: Scope) -> Self {
        Self { stage, scope }
    }

    /// List the scope to the end.
    ///
    /// Returns early without error when the run is cancelled or the queue
    /// has been closed. Any listing failure is returned with the scope
    /// attached.
    pub async fn enumerate(&self) -> Result<()> {
        debug!(scope = %self.scope, "enumeration has started.");

        let mut key_marker: Option<String> = None;
        let mut version_id_marker: Option<String> = None;

        loop {
            if self.stage.is_cancelled() {
                debug!(scope = %self.scope, "enumeration cancelled.");
                return Ok(());
            }

            let result = tokio::select! {
                result = self.stage.target.list_object_versions(
                    &self.scope,
                    key_marker.take(),
                    version_id_marker.take(),
                    self.stage.config.max_keys,
                ) => result,
                _ = self.stage.cancellation_token.cancelled() => {
                    debug!(scope = %self.scope, "enumeration cancelled.");
                    return Ok(());
                }
            };
            self.stage.metrics.inc_requests();
            let output = result.with_context(|| format!("error while listing {}", self.scope))?;

            let identifiers = page_identifiers(&output);
            self.stage.metrics.add_listed(identifiers.len() as u64);

            for batch in split_into_batches(&self.scope.bucket, identifiers) {
                let count = batch.len() as u64;
                self.stage.metrics.add_queued(count);
                if self.stage.send(batch).await? == SendResult::Closed {
                    self.stage.metrics.sub_queued(count);
                    debug!(scope = %self.scope, "deletion queue closed, enumeration stopped.");
                    return Ok(());
                }
            }

            if output.is_truncated() != Some(true) {
                break;
            }

            key_marker = output.next_key_marker().map(String::from);
            version_id_marker = output.next_version_id_marker().map(String::from);
            if key_marker.is_none() {
                return Err(anyhow!(S3purgeError::Pipeline(format!(
                    "listing of {} is truncated but has no continuation marker",
                    self.scope
                ))));
            }
        }

        debug!(scope = %self.scope, "enumeration has been completed.");
        Ok(())
    }
}

/// Object versions first, then delete markers, in page order.
fn page_identifiers(output: &ListObjectVersionsOutput) -> Vec<ObjectVersionId> {
    output
        .versions()
        .iter()
        .map(ObjectVersionId::from)
        .chain(output.delete_markers().iter().map(ObjectVersionId::from))
        .collect()
}

/// Chunk identifiers into batches of at most [`MAX_BATCH_SIZE`].
///
/// No batch is produced for an empty input.
pub fn split_into_batches(bucket: &str, identifiers: Vec<ObjectVersionId>) -> Vec<DeleteBatch> {
    identifiers
        .chunks(MAX_BATCH_SIZE)
        .map(|chunk| DeleteBatch::new(bucket, chunk.to_vec()))
        .collect()
}
