//! The purge coordinator.
//!
//! ```text
//!  Scope 1 ─ enumerator ─┐                       ┌─ worker 1 ─┐
//!  Scope 2 ─ enumerator ─┼─ bounded MPMC queue ──┼─ worker 2 ─┼─ DeleteObjects
//!  Scope N ─ enumerator ─┘   (DeleteBatch)       └─ worker M ─┘
//!
//!  all enumerators done → close queue → all workers done → DeleteBucket × buckets
//! ```
//!
//! The first fatal error cancels the shared token; every task stops at its
//! next await point and the error is kept for the caller.

use std::collections::VecDeque;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::{Result, anyhow};
use async_channel::{Receiver, Sender};
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::config::Config;
use crate::deleter::DeletionWorker;
use crate::enumerator::ObjectVersionEnumerator;
use crate::scope::{expand_scopes, touched_buckets};
use crate::stage::Stage;
use crate::storage::{self, Storage};
use crate::types::error::S3purgeError;
use crate::types::token::PipelineCancellationToken;
use crate::types::{DeleteBatch, PurgeMetrics, Scope};

/// Runs one purge: enumerate, delete, then remove the touched buckets.
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use s3purge_rs::config::args::parse_from_args;
/// use s3purge_rs::{Config, PurgeCounters, PurgePipeline, create_pipeline_cancellation_token};
///
/// # async fn example() {
/// let args = vec!["s3purge", "my-bucket", "--keep-buckets"];
/// let config = Config::try_from(parse_from_args(args).unwrap()).unwrap();
/// let counters = Arc::new(PurgeCounters::new());
/// let mut pipeline =
///     PurgePipeline::new(config, create_pipeline_cancellation_token(), counters.clone()).await;
///
/// pipeline.run().await;
///
/// if pipeline.has_error() {
///     eprintln!("{:?}", pipeline.get_errors_and_consume().unwrap()[0]);
/// }
/// println!("{}", counters.snapshot());
/// # }
/// ```
pub struct PurgePipeline {
    config: Config,
    target: Storage,
    cancellation_token: PipelineCancellationToken,
    metrics: Arc<dyn PurgeMetrics>,
    has_error: Arc<AtomicBool>,
    has_panic: Arc<AtomicBool>,
    errors: Arc<Mutex<VecDeque<anyhow::Error>>>,
    ready: bool,
}

impl PurgePipeline {
    /// Create a pipeline backed by S3, built from `config.target_client_config`.
    pub async fn new(
        config: Config,
        cancellation_token: PipelineCancellationToken,
        metrics: Arc<dyn PurgeMetrics>,
    ) -> Self {
        let target = storage::create_storage(&config).await;
        Self::with_storage(config, target, cancellation_token, metrics)
    }

    /// Create a pipeline over an arbitrary storage implementation.
    pub fn with_storage(
        config: Config,
        target: Storage,
        cancellation_token: PipelineCancellationToken,
        metrics: Arc<dyn PurgeMetrics>,
    ) -> Self {
        Self {
            config,
            target,
            cancellation_token,
            metrics,
            has_error: Arc::new(AtomicBool::new(false)),
            has_panic: Arc::new(AtomicBool::new(false)),
            errors: Arc::new(Mutex::new(VecDeque::new())),
            ready: true,
        }
    }

    /// Run the purge to completion.
    ///
    /// Errors are not returned; check [`has_error`](Self::has_error) and
    /// [`get_errors_and_consume`](Self::get_errors_and_consume) afterwards.
    ///
    /// # Panics
    ///
    /// Panics if called more than once.
    pub async fn run(&mut self) {
        assert!(self.ready, "PurgePipeline::run() called more than once");
        self.ready = false;

        let scopes = match expand_scopes(
            &self.config.targets,
            self.config.prefix_pattern.as_deref(),
        ) {
            Ok(scopes) => scopes,
            Err(e) => {
                error!("{}", e);
                self.record_error(anyhow!(e));
                return;
            }
        };

        info!(
            scope_count = scopes.len(),
            worker_size = self.config.worker_size,
            dry_run = self.config.dry_run,
            "purge started."
        );

        self.execute_pipeline(scopes).await;
    }

    pub fn has_error(&self) -> bool {
        self.has_error.load(Ordering::SeqCst)
    }

    pub fn has_panic(&self) -> bool {
        self.has_panic.load(Ordering::SeqCst)
    }

    /// Take every recorded error, oldest first. `None` if the run succeeded.
    pub fn get_errors_and_consume(&self) -> Option<Vec<anyhow::Error>> {
        if !self.has_error() {
            return None;
        }
        let mut error_list = self.errors.lock().unwrap();
        Some(error_list.drain(..).collect())
    }

    pub fn get_error_messages(&self) -> Option<Vec<String>> {
        if !self.has_error() {
            return None;
        }
        let error_list = self.errors.lock().unwrap();
        Some(error_list.iter().map(|e| format!("{e:#}")).collect())
    }

    async fn execute_pipeline(&self, scopes: Vec<Scope>) {
        let buckets = touched_buckets(&scopes);

        let queue_capacity = (self.config.worker_size as usize).max(1);
        let (sender, receiver) = async_channel::bounded::<DeleteBatch>(queue_capacity);

        let workers = self.spawn_workers(receiver);
        let enumerators = self.spawn_enumerators(scopes, &sender);

        self.join_all(enumerators).await;
        sender.close();
        debug!("all enumerators finished, deletion queue closed.");

        self.join_all(workers).await;
        debug!("all delete workers finished.");

        if self.has_error() {
            return;
        }
        if self.cancellation_token.is_cancelled() {
            self.record_error(anyhow!(S3purgeError::Cancelled));
            return;
        }

        if self.config.dry_run {
            info!(buckets = ?buckets, "[dry-run] bucket deletion skipped.");
            return;
        }
        if self.config.keep_buckets {
            info!(buckets = ?buckets, "bucket deletion skipped (--keep-buckets).");
            return;
        }

        self.delete_buckets(&buckets).await;
    }

    fn spawn_workers(&self, receiver: Receiver<DeleteBatch>) -> Vec<JoinHandle<()>> {
        (0..self.config.worker_size)
            .map(|worker_index| {
                let stage = self.create_stage(Some(receiver.clone()), None);
                let worker = DeletionWorker::new(stage, worker_index);
                self.spawn_supervised(format!("delete worker {worker_index}"), async move {
                    worker.run().await
                })
            })
            .collect()
    }

    fn spawn_enumerators(
        &self,
        scopes: Vec<Scope>,
        sender: &Sender<DeleteBatch>,
    ) -> Vec<JoinHandle<()>> {
        scopes
            .into_iter()
            .map(|scope| {
                let stage = self.create_stage(None, Some(sender.clone()));
                let task_name = format!("enumerator for {scope}");
                let enumerator = ObjectVersionEnumerator::new(stage, scope);
                self.spawn_supervised(task_name, async move { enumerator.enumerate().await })
            })
            .collect()
    }

    fn create_stage(
        &self,
        receiver: Option<Receiver<DeleteBatch>>,
        sender: Option<Sender<DeleteBatch>>,
    ) -> Stage {
        Stage::new(
            self.config.clone(),
            dyn_clone::clone_box(&*self.target),
            receiver,
            sender,
            self.cancellation_token.clone(),
            self.metrics.clone(),
        )
    }

    /// Spawn `task` and record its failure or panic, cancelling the run.
    fn spawn_supervised<F>(&self, task_name: String, task: F) -> JoinHandle<()>
    where
        F: Future<Output = Result<()>> + Send + 'static,
    {
        let has_error = self.has_error.clone();
        let has_panic = self.has_panic.clone();
        let error_list = self.errors.clone();
        let cancellation_token = self.cancellation_token.clone();

        tokio::spawn(async move {
            let join_result = tokio::spawn(task).await;

            match join_result {
                Ok(Ok(())) => {
                    debug!(task = task_name, "task completed.");
                }
                Ok(Err(e)) => {
                    cancellation_token.cancel();
                    has_error.store(true, Ordering::SeqCst);
                    error!(task = task_name, "{} failed: {:#}", task_name, e);
                    error_list.lock().unwrap().push_back(e);
                }
                Err(e) => {
                    cancellation_token.cancel();
                    has_error.store(true, Ordering::SeqCst);
                    has_panic.store(true, Ordering::SeqCst);
                    error!(task = task_name, "{} panicked: {}", task_name, e);
                    error_list
                        .lock()
                        .unwrap()
                        .push_back(anyhow!("{} panicked: {}", task_name, e));
                }
            }
        })
    }

    async fn join_all(&self, handles: Vec<JoinHandle<()>>) {
        for handle in handles {
            // The supervisor itself never panics; the inner task's panic is
            // already recorded.
            if let Err(e) = handle.await {
                self.has_panic.store(true, Ordering::SeqCst);
                self.record_error(anyhow!("supervisor task failed: {}", e));
            }
        }
    }

    async fn delete_buckets(&self, buckets: &[String]) {
        for bucket in buckets {
            if self.cancellation_token.is_cancelled() {
                self.record_error(anyhow!(S3purgeError::Cancelled));
                return;
            }

            let result = self.target.delete_bucket(bucket).await;
            self.metrics.inc_requests();

            match result {
                Ok(()) => info!(bucket = bucket, "bucket deleted."),
                Err(e) => {
                    let e = e.context(format!("error while deleting bucket {bucket}"));
                    error!(bucket = bucket, "{:#}", e);
                    self.record_error(e);
                    return;
                }
            }
        }
    }

    fn record_error(&self, error: anyhow::Error) {
        self.has_error.store(true, Ordering::SeqCst);
        self.errors.lock().unwrap().push_back(error);
    }
}
