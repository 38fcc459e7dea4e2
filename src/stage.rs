use std::sync::Arc;

use anyhow::{Result, anyhow};
use async_channel::{Receiver, Sender};

use crate::config::Config;
use crate::storage::Storage;
use crate::types::token::PipelineCancellationToken;
use crate::types::{DeleteBatch, PurgeMetrics};

/// Result of pushing a batch onto the deletion queue.
#[derive(Debug, Clone, PartialEq)]
pub enum SendResult {
    Success,
    Closed,
}

/// Shared context handed to every pipeline task.
///
/// Enumerators hold only a `sender`, deletion workers only a `receiver`.
pub struct Stage {
    pub config: Config,
    pub target: Storage,
    pub receiver: Option<Receiver<DeleteBatch>>,
    pub sender: Option<Sender<DeleteBatch>>,
    pub cancellation_token: PipelineCancellationToken,
    pub metrics: Arc<dyn PurgeMetrics>,
}

impl Stage {
    pub fn new(
        config: Config,
        target: Storage,
        receiver: Option<Receiver<DeleteBatch>>,
        sender: Option<Sender<DeleteBatch>>,
        cancellation_token: PipelineCancellationToken,
        metrics: Arc<dyn PurgeMetrics>,
    ) -> Self {
        Self {
            config,
            target,
            receiver,
            sender,
            cancellation_token,
            metrics,
        }
    }

    /// Push a batch onto the queue, blocking while it is full.
    ///
    /// Returns `SendResult::Closed` if the run was cancelled while waiting or
    /// the queue has been closed, so the caller can stop producing.
    pub async fn send(&self, batch: DeleteBatch) -> Result<SendResult> {
        let sender = self
            .sender
            .as_ref()
            .ok_or_else(|| anyhow!("stage has no sender."))?;

        tokio::select! {
            result = sender.send(batch) => {
                match result {
                    Ok(()) => Ok(SendResult::Success),
                    Err(_) => Ok(SendResult::Closed),
                }
            }
            _ = self.cancellation_token.cancelled() => Ok(SendResult::Closed),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation_token.is_cancelled()
    }
}
