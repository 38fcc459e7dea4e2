//! Consumer side of the purge pipeline.

use anyhow::{Result, anyhow};
use tracing::{debug, error, info};

use crate::stage::Stage;
use crate::types::DeleteBatch;

pub mod batch;

pub use batch::BatchDeleter;


/// One member of the deletion worker pool.
///
/// Pops batches until the queue is closed and drained, resolving each batch
/// (including its retry cohorts) before taking the next one.
pub struct DeletionWorker {
    worker_index: u16,
    base: Stage,
    deleter: BatchDeleter,
}

impl DeletionWorker {
    pub fn new(base: Stage, worker_index: u16) -> Self {
        let deleter = BatchDeleter::new(
            base.target.clone(),
            base.metrics.clone(),
            base.cancellation_token.clone(),
        );

        Self {
            worker_index,
            base,
            deleter,
        }
    }

    pub async fn run(&self) -> Result<()> {
        debug!(worker_index = self.worker_index, "delete worker started.");
        self.receive_and_delete().await
    }

    async fn receive_and_delete(&self) -> Result<()> {
        let receiver = self
            .base
            .receiver
            .as_ref()
            .ok_or_else(|| anyhow!("delete worker has no receiver."))?;

        loop {
            tokio::select! {
                recv_result = receiver.recv() => {
                    match recv_result {
                        Ok(batch) => self.process_batch(batch).await?,
                        Err(_) => {
                            debug!(worker_index = self.worker_index, "delete worker has been completed.");
                            break;
                        }
                    }
                },
                _ = self.base.cancellation_token.cancelled() => {
                    info!(worker_index = self.worker_index, "delete worker has been cancelled.");
                    return Ok(());
                }
            }
        }

        Ok(())
    }

    async fn process_batch(&self, batch: DeleteBatch) -> Result<()> {
        self.base.metrics.sub_queued(batch.len() as u64);

        if self.base.config.dry_run {
            debug!(
                worker_index = self.worker_index,
                bucket = batch.bucket,
                object_count = batch.len(),
                "[dry-run] DeleteObjects skipped."
            );
            return Ok(());
        }

        self.deleter.delete(&batch).await.inspect_err(|e| {
            error!(
                worker_index = self.worker_index,
                bucket = batch.bucket,
                error = format!("{e:#}"),
                "delete worker failed."
            );
        })
    }
}
