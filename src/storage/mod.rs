use anyhow::Result;
use async_trait::async_trait;
use aws_sdk_s3::operation::delete_objects::DeleteObjectsOutput;
use aws_sdk_s3::operation::list_object_versions::ListObjectVersionsOutput;
use dyn_clone::DynClone;
use leaky_bucket::RateLimiter;
use std::sync::Arc;

use crate::config::Config;
use crate::types::{ObjectVersionId, Scope};

pub mod s3;

/// Type alias for a boxed Storage trait object.
pub type Storage = Box<dyn StorageTrait + Send + Sync>;

/// Remote store operations used by a purge run.
///
/// One instance is shared (cloned) across every enumerator and deletion
/// worker, so implementations are not bound to a single bucket.
///
/// Failures of the remote call itself are returned as `anyhow::Error`
/// wrapping a [`StorageError`](crate::types::error::StorageError) that
/// carries the S3 error code when one was returned.
#[async_trait]
pub trait StorageTrait: DynClone {
    /// Fetch one page of object versions and delete markers under `scope`.
    ///
    /// Pass the `next_key_marker` / `next_version_id_marker` of the previous
    /// page to continue; `None` for both starts at the beginning.
    async fn list_object_versions(
        &self,
        scope: &Scope,
        key_marker: Option<String>,
        version_id_marker: Option<String>,
        max_keys: i32,
    ) -> Result<ListObjectVersionsOutput>;

    /// Delete up to 1000 identifiers from `bucket` in one DeleteObjects call.
    ///
    /// A successful return may still carry per-item errors in `errors()`.
    /// The caller is responsible for batching.
    async fn delete_objects(
        &self,
        bucket: &str,
        objects: &[ObjectVersionId],
    ) -> Result<DeleteObjectsOutput>;

    /// Delete an (empty) bucket.
    async fn delete_bucket(&self, bucket: &str) -> Result<()>;
}

dyn_clone::clone_trait_object!(StorageTrait);

// Default refill interval 100ms
const REFILL_PER_INTERVAL_DIVIDER: usize = 10;

/// Create the storage shared by every task of a purge run.
pub async fn create_storage(config: &Config) -> Storage {
    let rate_limit_objects_per_sec = config.rate_limit_objects.map(build_rate_limiter);

    s3::S3StorageFactory::create(
        config.target_client_config.clone(),
        rate_limit_objects_per_sec,
    )
    .await
}

fn build_rate_limiter(rate_limit_value: u32) -> Arc<RateLimiter> {
    let refill = if (rate_limit_value as usize) <= REFILL_PER_INTERVAL_DIVIDER {
        1
    } else {
        rate_limit_value as usize / REFILL_PER_INTERVAL_DIVIDER
    };
    Arc::new(
        RateLimiter::builder()
            .max(rate_limit_value as usize)
            .initial(rate_limit_value as usize)
            .refill(refill)
            .fair(true)
            .build(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::init_dummy_tracing_subscriber;

    #[test]
    fn rate_limiter_refill_scales_with_limit() {
        init_dummy_tracing_subscriber();

        let limiter = build_rate_limiter(1000);
        assert_eq!(limiter.max(), 1000);
        assert_eq!(limiter.refill(), 100);
        assert_eq!(limiter.balance(), 1000);
    }

    #[test]
    fn rate_limiter_small_limit_refills_one() {
        init_dummy_tracing_subscriber();

        let limiter = build_rate_limiter(5);
        assert_eq!(limiter.max(), 5);
        assert_eq!(limiter.refill(), 1);
    }

    #[tokio::test]
    async fn storage_without_client_config_fails_calls() {
        init_dummy_tracing_subscriber();

        let config = Config::for_bucket("test-bucket");
        let storage = create_storage(&config).await;

        let result = storage.delete_bucket("test-bucket").await;
        assert!(result.is_err());
    }
}
