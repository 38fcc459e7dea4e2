//! Shared test utilities for the s3purge library crate.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use aws_sdk_s3::operation::delete_objects::DeleteObjectsOutput;
use aws_sdk_s3::operation::list_object_versions::ListObjectVersionsOutput;
use aws_sdk_s3::types::{DeleteMarkerEntry, DeletedObject, ObjectVersion};

use crate::config::Config;
use crate::storage::{Storage, StorageTrait};
use crate::types::error::StorageError;
use crate::types::{ObjectVersionId, PurgeCounters, PurgeMetrics, Scope};

/// Initialise a dummy tracing subscriber for tests.
///
/// Uses `try_init` so that only the first call in a process actually
/// installs the subscriber; subsequent calls are silently ignored.
pub(crate) fn init_dummy_tracing_subscriber() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("dummy=trace")
        .try_init();
}

/// Default [`Config`] for unit tests: 4 workers, one whole-bucket target
/// on `test-bucket`.
pub(crate) fn make_test_config() -> Config {
    let mut config = Config::for_bucket("test-bucket");
    config.worker_size = 4;
    config
}

/// One scripted listing page.
#[derive(Debug, Clone, Default)]
pub(crate) struct MockPage {
    pub versions: Vec<ObjectVersionId>,
    pub delete_markers: Vec<ObjectVersionId>,
}

impl MockPage {
    pub(crate) fn versions(keys: &[(&str, &str)]) -> Self {
        Self {
            versions: ids(keys),
            delete_markers: vec![],
        }
    }

    pub(crate) fn with_delete_markers(mut self, keys: &[(&str, &str)]) -> Self {
        self.delete_markers = ids(keys);
        self
    }

    /// A page of `count` versions named `{prefix}{n}`.
    pub(crate) fn numbered(prefix: &str, count: usize) -> Self {
        Self {
            versions: (0..count)
                .map(|n| ObjectVersionId::new(format!("{prefix}{n}"), Some(format!("v{n}"))))
                .collect(),
            delete_markers: vec![],
        }
    }
}

fn ids(keys: &[(&str, &str)]) -> Vec<ObjectVersionId> {
    keys.iter()
        .map(|(key, version_id)| ObjectVersionId::new(*key, Some(version_id.to_string())))
        .collect()
}

/// Scripted outcome of one DeleteObjects call.
#[derive(Debug, Clone)]
pub(crate) enum DeleteResponse {
    /// The whole call fails with the given S3 error code (`None` for a
    /// network-level failure).
    TransportError(Option<String>),
    /// The listed keys fail with the paired error code; every other
    /// identifier in the call is reported deleted.
    ItemErrors(Vec<(String, String)>),
}

/// In-memory [`StorageTrait`] that serves scripted pages and records calls.
///
/// Unknown scopes list as a single empty page. When the delete script is
/// exhausted, every DeleteObjects call succeeds for all identifiers.
#[derive(Clone, Default)]
pub(crate) struct MockStorage {
    pages: Arc<HashMap<Scope, Vec<MockPage>>>,
    list_errors: Arc<HashSet<Scope>>,
    hanging_lists: Arc<HashSet<Scope>>,
    delete_responses: Arc<Mutex<VecDeque<DeleteResponse>>>,
    delete_bucket_error: Option<String>,
    pub list_calls: Arc<Mutex<Vec<Scope>>>,
    pub delete_calls: Arc<Mutex<Vec<(String, Vec<ObjectVersionId>)>>>,
    pub delete_bucket_calls: Arc<Mutex<Vec<String>>>,
}

impl MockStorage {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_pages(mut self, scope: Scope, pages: Vec<MockPage>) -> Self {
        Arc::make_mut(&mut self.pages).insert(scope, pages);
        self
    }

    pub(crate) fn with_list_error(mut self, scope: Scope) -> Self {
        Arc::make_mut(&mut self.list_errors).insert(scope);
        self
    }

    /// Listing `scope` never returns; only cancellation ends it.
    pub(crate) fn with_hanging_list(mut self, scope: Scope) -> Self {
        Arc::make_mut(&mut self.hanging_lists).insert(scope);
        self
    }

    pub(crate) fn with_delete_responses(self, responses: Vec<DeleteResponse>) -> Self {
        self.delete_responses.lock().unwrap().extend(responses);
        self
    }

    pub(crate) fn with_delete_bucket_error(mut self, code: &str) -> Self {
        self.delete_bucket_error = Some(code.to_string());
        self
    }

    pub(crate) fn boxed(&self) -> Storage {
        Box::new(self.clone())
    }

    pub(crate) fn list_call_count(&self) -> usize {
        self.list_calls.lock().unwrap().len()
    }

    pub(crate) fn delete_call_count(&self) -> usize {
        self.delete_calls.lock().unwrap().len()
    }

    pub(crate) fn deleted_buckets(&self) -> Vec<String> {
        self.delete_bucket_calls.lock().unwrap().clone()
    }
}

fn page_index(key_marker: Option<&str>) -> usize {
    key_marker
        .and_then(|marker| marker.strip_prefix("page-"))
        .and_then(|index| index.parse().ok())
        .unwrap_or(0)
}

fn storage_error(operation: &'static str, code: Option<&str>) -> anyhow::Error {
    anyhow!(StorageError {
        operation,
        code: code.map(String::from),
        message: "mock failure".to_string(),
    })
}

#[async_trait]
impl StorageTrait for MockStorage {
    async fn list_object_versions(
        &self,
        scope: &Scope,
        key_marker: Option<String>,
        _version_id_marker: Option<String>,
        _max_keys: i32,
    ) -> Result<ListObjectVersionsOutput> {
        self.list_calls.lock().unwrap().push(scope.clone());

        if self.hanging_lists.contains(scope) {
            std::future::pending::<()>().await;
        }
        if self.list_errors.contains(scope) {
            return Err(storage_error("ListObjectVersions", Some("AccessDenied")));
        }

        let pages = self.pages.get(scope).cloned().unwrap_or_default();
        let index = page_index(key_marker.as_deref());
        let page = pages.get(index).cloned().unwrap_or_default();
        let is_truncated = index + 1 < pages.len();

        let mut builder = ListObjectVersionsOutput::builder()
            .is_truncated(is_truncated)
            .set_versions(Some(
                page.versions
                    .iter()
                    .map(|id| {
                        ObjectVersion::builder()
                            .key(&id.key)
                            .set_version_id(id.version_id.clone())
                            .build()
                    })
                    .collect(),
            ))
            .set_delete_markers(Some(
                page.delete_markers
                    .iter()
                    .map(|id| {
                        DeleteMarkerEntry::builder()
                            .key(&id.key)
                            .set_version_id(id.version_id.clone())
                            .build()
                    })
                    .collect(),
            ));
        if is_truncated {
            builder = builder
                .next_key_marker(format!("page-{}", index + 1))
                .next_version_id_marker("marker");
        }

        Ok(builder.build())
    }

    async fn delete_objects(
        &self,
        bucket: &str,
        objects: &[ObjectVersionId],
    ) -> Result<DeleteObjectsOutput> {
        self.delete_calls
            .lock()
            .unwrap()
            .push((bucket.to_string(), objects.to_vec()));

        let response = self.delete_responses.lock().unwrap().pop_front();
        let failed = match response {
            Some(DeleteResponse::TransportError(code)) => {
                return Err(storage_error("DeleteObjects", code.as_deref()));
            }
            Some(DeleteResponse::ItemErrors(failed)) => failed,
            None => vec![],
        };

        let mut deleted = Vec::new();
        let mut errors = Vec::new();
        for object in objects {
            match failed.iter().find(|(key, _)| *key == object.key) {
                Some((_, code)) => errors.push(
                    aws_sdk_s3::types::Error::builder()
                        .key(&object.key)
                        .set_version_id(object.version_id.clone())
                        .code(code)
                        .message(format!("{code} for {}", object.key))
                        .build(),
                ),
                None => deleted.push(
                    DeletedObject::builder()
                        .key(&object.key)
                        .set_version_id(object.version_id.clone())
                        .build(),
                ),
            }
        }

        Ok(DeleteObjectsOutput::builder()
            .set_deleted(Some(deleted))
            .set_errors(Some(errors))
            .build())
    }

    async fn delete_bucket(&self, bucket: &str) -> Result<()> {
        self.delete_bucket_calls
            .lock()
            .unwrap()
            .push(bucket.to_string());

        match &self.delete_bucket_error {
            Some(code) => Err(storage_error("DeleteBucket", Some(code))),
            None => Ok(()),
        }
    }
}

/// Counters that also remember the lowest `queued` value ever observed.
#[derive(Default)]
pub(crate) struct QueuedWatermark {
    pub counters: PurgeCounters,
    queued: AtomicI64,
    min_queued: AtomicI64,
}

impl QueuedWatermark {
    pub(crate) fn min_queued(&self) -> i64 {
        self.min_queued.load(Ordering::SeqCst)
    }
}

impl PurgeMetrics for QueuedWatermark {
    fn add_listed(&self, count: u64) {
        self.counters.add_listed(count);
    }

    fn add_queued(&self, count: u64) {
        self.queued.fetch_add(count as i64, Ordering::SeqCst);
        self.counters.add_queued(count);
    }

    fn sub_queued(&self, count: u64) {
        let now = self.queued.fetch_sub(count as i64, Ordering::SeqCst) - count as i64;
        self.min_queued.fetch_min(now, Ordering::SeqCst);
        self.counters.sub_queued(count);
    }

    fn inc_requests(&self) {
        self.counters.inc_requests();
    }

    fn inc_deletes_pending(&self) {
        self.counters.inc_deletes_pending();
    }

    fn dec_deletes_pending(&self) {
        self.counters.dec_deletes_pending();
    }

    fn add_deleted(&self, count: u64) {
        self.counters.add_deleted(count);
    }
}
