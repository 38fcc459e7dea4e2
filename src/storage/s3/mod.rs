pub mod client_builder;

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use aws_sdk_s3::Client;
use aws_sdk_s3::error::{DisplayErrorContext, SdkError};
use aws_sdk_s3::operation::delete_objects::DeleteObjectsOutput;
use aws_sdk_s3::operation::list_object_versions::ListObjectVersionsOutput;
use aws_sdk_s3::types::{Delete, ObjectIdentifier, RequestPayer};
use aws_smithy_types::error::metadata::ProvideErrorMetadata;
use leaky_bucket::RateLimiter;
use std::sync::Arc;

use crate::config::ClientConfig;
use crate::storage::{Storage, StorageTrait};
use crate::types::error::StorageError;
use crate::types::{ObjectVersionId, Scope};

/// Convert an AWS SDK error into a [`StorageError`].
///
/// Service errors keep their S3 error code (e.g. "InternalError",
/// "AccessDenied"). Transport failures (network, timeout, construction)
/// have no code.
fn to_storage_error<E>(operation: &'static str, e: &SdkError<E>) -> StorageError
where
    E: std::error::Error + ProvideErrorMetadata + 'static,
{
    if let Some(service_err) = e.as_service_error() {
        StorageError {
            operation,
            code: service_err.code().map(String::from),
            message: service_err.message().unwrap_or("no message").to_string(),
        }
    } else {
        StorageError {
            operation,
            code: None,
            message: DisplayErrorContext(e).to_string(),
        }
    }
}

pub struct S3StorageFactory;

impl S3StorageFactory {
    pub async fn create(
        client_config: Option<ClientConfig>,
        rate_limit_objects_per_sec: Option<Arc<RateLimiter>>,
    ) -> Storage {
        let (client, request_payer) = match client_config {
            Some(client_config) => (
                Some(Arc::new(client_config.create_client().await)),
                client_config.request_payer.clone(),
            ),
            None => (None, None),
        };

        Box::new(S3Storage {
            client,
            request_payer,
            rate_limit_objects_per_sec,
        })
    }
}

/// AWS SDK backed storage.
#[derive(Clone)]
struct S3Storage {
    client: Option<Arc<Client>>,
    request_payer: Option<RequestPayer>,
    rate_limit_objects_per_sec: Option<Arc<RateLimiter>>,
}

#[async_trait]
impl StorageTrait for S3Storage {
    async fn list_object_versions(
        &self,
        scope: &Scope,
        key_marker: Option<String>,
        version_id_marker: Option<String>,
        max_keys: i32,
    ) -> Result<ListObjectVersionsOutput> {
        self.exec_rate_limit_objects_per_sec().await;

        self.client()?
            .list_object_versions()
            .set_request_payer(self.request_payer.clone())
            .bucket(&scope.bucket)
            .prefix(&scope.prefix)
            .set_key_marker(key_marker)
            .set_version_id_marker(version_id_marker)
            .max_keys(max_keys)
            .send()
            .await
            .map_err(|e| {
                let storage_error = to_storage_error("ListObjectVersions", &e);
                let s3_error_code = storage_error.code.as_deref().unwrap_or("N/A");
                tracing::error!(
                    bucket = scope.bucket,
                    prefix = scope.prefix,
                    s3_error_code = s3_error_code,
                    s3_error_message = storage_error.message,
                    "S3 ListObjectVersions API call failed for {}: {} ({}).",
                    scope,
                    s3_error_code,
                    storage_error.message,
                );
                anyhow!(storage_error).context("aws_sdk_s3::client::list_object_versions() failed.")
            })
    }

    async fn delete_objects(
        &self,
        bucket: &str,
        objects: &[ObjectVersionId],
    ) -> Result<DeleteObjectsOutput> {
        self.exec_rate_limit_objects_per_sec_n(objects.len()).await;

        let object_count = objects.len();
        let identifiers = objects
            .iter()
            .map(|object| {
                ObjectIdentifier::builder()
                    .key(&object.key)
                    .set_version_id(object.version_id.clone())
                    .build()
                    .with_context(|| format!("Failed to build ObjectIdentifier for {object}"))
            })
            .collect::<Result<Vec<_>>>()?;

        let delete = Delete::builder()
            .set_objects(Some(identifiers))
            .build()
            .context("Failed to build Delete request")?;

        self.client()?
            .delete_objects()
            .set_request_payer(self.request_payer.clone())
            .bucket(bucket)
            .delete(delete)
            .send()
            .await
            .map_err(|e| {
                let storage_error = to_storage_error("DeleteObjects", &e);
                let s3_error_code = storage_error.code.as_deref().unwrap_or("N/A");
                tracing::warn!(
                    bucket = bucket,
                    object_count = object_count,
                    s3_error_code = s3_error_code,
                    s3_error_message = storage_error.message,
                    "S3 DeleteObjects API call failed for {} objects in bucket '{}': {} ({}).",
                    object_count,
                    bucket,
                    s3_error_code,
                    storage_error.message,
                );
                anyhow!(storage_error).context("aws_sdk_s3::client::delete_objects() failed.")
            })
    }

    async fn delete_bucket(&self, bucket: &str) -> Result<()> {
        self.exec_rate_limit_objects_per_sec().await;

        self.client()?
            .delete_bucket()
            .bucket(bucket)
            .send()
            .await
            .map_err(|e| {
                let storage_error = to_storage_error("DeleteBucket", &e);
                let s3_error_code = storage_error.code.as_deref().unwrap_or("N/A");
                tracing::error!(
                    bucket = bucket,
                    s3_error_code = s3_error_code,
                    s3_error_message = storage_error.message,
                    "S3 DeleteBucket API call failed for bucket '{}': {} ({}).",
                    bucket,
                    s3_error_code,
                    storage_error.message,
                );
                anyhow!(storage_error).context("aws_sdk_s3::client::delete_bucket() failed.")
            })?;

        Ok(())
    }
}

impl S3Storage {
    fn client(&self) -> Result<&Client> {
        self.client
            .as_deref()
            .ok_or_else(|| anyhow!("S3 client is not configured."))
    }

    /// Acquire a single token. Used for listing pages and bucket deletion.
    async fn exec_rate_limit_objects_per_sec(&self) {
        if let Some(ref rate_limiter) = self.rate_limit_objects_per_sec {
            rate_limiter.acquire_one().await;
        }
    }

    /// Acquire one token per object in a DeleteObjects call.
    async fn exec_rate_limit_objects_per_sec_n(&self, count: usize) {
        if count == 0 {
            return;
        }
        if let Some(ref rate_limiter) = self.rate_limit_objects_per_sec {
            rate_limiter.acquire(count).await;
        }
    }
}
