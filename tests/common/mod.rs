//! Shared E2E test infrastructure for s3purge-rs.
//!
//! Provides `TestHelper` for bucket setup and pipeline execution against real
//! AWS S3. All helpers use the `s3purge-e2e-test` AWS profile.

#![allow(dead_code)]

use std::sync::Arc;

use aws_config::BehaviorVersion;
use aws_sdk_s3::Client;
use aws_sdk_s3::types::{
    BucketLocationConstraint, BucketVersioningStatus, CreateBucketConfiguration, Delete,
    ObjectIdentifier, VersioningConfiguration,
};
use s3purge_rs::config::args::build_config_from_args;
use s3purge_rs::{
    Config, PurgeCounters, PurgePipeline, PurgeStats, create_pipeline_cancellation_token,
};
use uuid::Uuid;

/// AWS profile used for all E2E tests.
const AWS_PROFILE: &str = "s3purge-e2e-test";

const DEFAULT_REGION: &str = "us-east-1";

/// Result of running a purge pipeline.
#[derive(Debug)]
pub struct PipelineResult {
    pub stats: PurgeStats,
    pub has_error: bool,
    pub has_panic: bool,
    /// Error messages with their full context chain.
    pub errors: Vec<String>,
}

/// Deletes whatever the test left behind, even if the test panics.
pub struct BucketGuard {
    helper: Arc<TestHelper>,
    bucket: String,
    cleaned: bool,
}

impl BucketGuard {
    pub async fn cleanup(mut self) {
        self.helper.delete_bucket_cascade(&self.bucket).await;
        self.cleaned = true;
    }
}

impl Drop for BucketGuard {
    fn drop(&mut self) {
        if self.cleaned {
            return;
        }
        let helper = self.helper.clone();
        let bucket = self.bucket.clone();
        // block_on panics inside a runtime that is already shutting down.
        let _ = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            tokio::task::block_in_place(|| {
                tokio::runtime::Handle::current().block_on(async move {
                    helper.delete_bucket_cascade(&bucket).await;
                });
            });
        }));
    }
}

pub struct TestHelper {
    client: Client,
    region: String,
}

impl TestHelper {
    pub async fn new() -> Arc<Self> {
        let sdk_config = aws_config::defaults(BehaviorVersion::latest())
            .profile_name(AWS_PROFILE)
            .load()
            .await;

        let region = sdk_config
            .region()
            .map(|r| r.to_string())
            .unwrap_or_else(|| DEFAULT_REGION.to_string());

        let client = Client::new(&sdk_config);

        Arc::new(Self { client, region })
    }

    pub fn bucket_guard(self: &Arc<Self>, bucket: &str) -> BucketGuard {
        BucketGuard {
            helper: Arc::clone(self),
            bucket: bucket.to_string(),
            cleaned: false,
        }
    }

    /// A name like `s3purge-e2e-<uuid>`, unique across parallel runs.
    pub fn generate_bucket_name(&self) -> String {
        format!("s3purge-e2e-{}", Uuid::new_v4())
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    // -----------------------------------------------------------------------
    // Bucket management
    // -----------------------------------------------------------------------

    pub async fn create_bucket(&self, bucket: &str) {
        let mut builder = self.client.create_bucket().bucket(bucket);

        // us-east-1 must NOT specify a location constraint
        if self.region != "us-east-1" {
            let constraint = BucketLocationConstraint::from(self.region.as_str());
            let config = CreateBucketConfiguration::builder()
                .location_constraint(constraint)
                .build();
            builder = builder.create_bucket_configuration(config);
        }

        builder
            .send()
            .await
            .unwrap_or_else(|e| panic!("Failed to create bucket {bucket}: {e}"));
    }

    pub async fn create_versioned_bucket(&self, bucket: &str) {
        self.create_bucket(bucket).await;

        let versioning_config = VersioningConfiguration::builder()
            .status(BucketVersioningStatus::Enabled)
            .build();

        self.client
            .put_bucket_versioning()
            .bucket(bucket)
            .versioning_configuration(versioning_config)
            .send()
            .await
            .unwrap_or_else(|e| panic!("Failed to enable versioning on {bucket}: {e}"));
    }

    pub async fn bucket_exists(&self, bucket: &str) -> bool {
        self.client.head_bucket().bucket(bucket).send().await.is_ok()
    }

    /// Remove every version and the bucket. Missing buckets are ignored.
    pub async fn delete_bucket_cascade(&self, bucket: &str) {
        loop {
            let versions = self.list_object_versions(bucket).await;
            if versions.is_empty() {
                break;
            }
            for chunk in versions.chunks(1000) {
                let objects = chunk
                    .iter()
                    .filter_map(|(key, version_id)| {
                        ObjectIdentifier::builder()
                            .key(key)
                            .version_id(version_id)
                            .build()
                            .ok()
                    })
                    .collect::<Vec<_>>();
                let Ok(delete) = Delete::builder().set_objects(Some(objects)).build() else {
                    return;
                };
                if self
                    .client
                    .delete_objects()
                    .bucket(bucket)
                    .delete(delete)
                    .send()
                    .await
                    .is_err()
                {
                    return;
                }
            }
        }

        let _ = self.client.delete_bucket().bucket(bucket).send().await;
    }

    // -----------------------------------------------------------------------
    // Object operations
    // -----------------------------------------------------------------------

    pub async fn put_object(&self, bucket: &str, key: &str, body: Vec<u8>) {
        self.client
            .put_object()
            .bucket(bucket)
            .key(key)
            .body(body.into())
            .send()
            .await
            .unwrap_or_else(|e| panic!("Failed to put object {key} in {bucket}: {e}"));
    }

    pub async fn delete_object(&self, bucket: &str, key: &str) {
        self.client
            .delete_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .unwrap_or_else(|e| panic!("Failed to delete object {key} in {bucket}: {e}"));
    }

    /// Upload `keys` concurrently, 64 requests at a time.
    pub async fn put_objects_parallel(self: &Arc<Self>, bucket: &str, keys: Vec<String>) {
        for chunk in keys.chunks(64) {
            let mut handles = Vec::new();
            for key in chunk {
                let helper = Arc::clone(self);
                let bucket = bucket.to_string();
                let key = key.clone();
                handles.push(tokio::spawn(async move {
                    helper.put_object(&bucket, &key, b"x".to_vec()).await;
                }));
            }
            for handle in handles {
                handle.await.unwrap();
            }
        }
    }

    /// Every (key, version id) pair in the bucket, delete markers included.
    /// Empty if the bucket no longer exists.
    pub async fn list_object_versions(&self, bucket: &str) -> Vec<(String, String)> {
        let mut result = Vec::new();
        let mut key_marker: Option<String> = None;
        let mut version_id_marker: Option<String> = None;

        loop {
            let resp = match self
                .client
                .list_object_versions()
                .bucket(bucket)
                .set_key_marker(key_marker.take())
                .set_version_id_marker(version_id_marker.take())
                .send()
                .await
            {
                Ok(resp) => resp,
                Err(_) => return result,
            };

            for v in resp.versions() {
                if let (Some(key), Some(vid)) = (v.key(), v.version_id()) {
                    result.push((key.to_string(), vid.to_string()));
                }
            }
            for m in resp.delete_markers() {
                if let (Some(key), Some(vid)) = (m.key(), m.version_id()) {
                    result.push((key.to_string(), vid.to_string()));
                }
            }

            if !resp.is_truncated().unwrap_or(false) {
                return result;
            }
            key_marker = resp.next_key_marker().map(String::from);
            version_id_marker = resp.next_version_id_marker().map(String::from);
        }
    }

    // -----------------------------------------------------------------------
    // Pipeline execution
    // -----------------------------------------------------------------------

    /// Build a `Config` from CLI-style args, adding the e2e profile and
    /// region unless credentials are already given.
    pub fn build_config(&self, args: Vec<&str>) -> Config {
        let mut full_args: Vec<String> = vec!["s3purge".to_string()];
        full_args.extend(args.iter().map(|s| s.to_string()));

        let has_credentials = full_args
            .iter()
            .any(|a| a.starts_with("--profile") || a.starts_with("--access-key"));
        if !has_credentials {
            full_args.push("--profile".to_string());
            full_args.push(AWS_PROFILE.to_string());
        }
        if !full_args.iter().any(|a| a.starts_with("--region")) {
            full_args.push("--region".to_string());
            full_args.push(self.region.clone());
        }

        build_config_from_args(full_args)
            .unwrap_or_else(|e| panic!("Failed to build config from args: {e}"))
    }

    pub async fn run_pipeline(config: Config) -> PipelineResult {
        let counters = Arc::new(PurgeCounters::new());
        let token = create_pipeline_cancellation_token();
        let mut pipeline = PurgePipeline::new(config, token, counters.clone()).await;

        pipeline.run().await;

        let has_error = pipeline.has_error();
        let has_panic = pipeline.has_panic();
        let errors = pipeline
            .get_errors_and_consume()
            .unwrap_or_default()
            .into_iter()
            .map(|e| format!("{e:#}"))
            .collect();

        PipelineResult {
            stats: counters.snapshot(),
            has_error,
            has_panic,
            errors,
        }
    }
}

/// Default timeout for E2E tests (5 minutes).
pub const E2E_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(300);

/// Wraps an async E2E test body with a timeout.
#[macro_export]
macro_rules! e2e_timeout {
    ($body:expr) => {
        tokio::time::timeout(common::E2E_TIMEOUT, $body)
            .await
            .expect("E2E test timed out")
    };
}
