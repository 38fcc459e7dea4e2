use std::fmt;
use std::fmt::{Display, Formatter};

use anyhow::Error;
use thiserror::Error;

/// Application-level error types for s3purge.
///
/// ## Exit Codes
///
/// Each variant maps to an exit code (via `exit_code()`):
/// - 1: Runtime failures (NonRetryableDelete, Cancelled, Pipeline)
/// - 2: Configuration errors (InvalidConfig, InvalidTarget, InvalidPrefixPattern)
#[derive(Error, Debug, PartialEq)]
pub enum S3purgeError {
    /// Configuration error.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Unparseable target locator.
    #[error("Invalid target: {0}")]
    InvalidTarget(String),

    /// Malformed brace-expansion pattern.
    #[error("Invalid prefix pattern: {0}")]
    InvalidPrefixPattern(String),

    /// DeleteObjects reported at least one error that is not retryable.
    #[error(
        "non-retryable errors while deleting from bucket {bucket}: {}",
        format_item_errors(.errors)
    )]
    NonRetryableDelete {
        bucket: String,
        errors: Vec<ItemDeleteError>,
    },

    /// Run cancelled before completion.
    #[error("Operation cancelled by user")]
    Cancelled,

    /// General pipeline error.
    #[error("Pipeline error: {0}")]
    Pipeline(String),
}

impl S3purgeError {
    /// Get the process exit code for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            S3purgeError::InvalidConfig(_)
            | S3purgeError::InvalidTarget(_)
            | S3purgeError::InvalidPrefixPattern(_) => 2,
            _ => 1,
        }
    }
}

/// One per-item failure reported in a DeleteObjects response.
#[derive(Debug, Clone, PartialEq)]
pub struct ItemDeleteError {
    pub key: String,
    pub version_id: Option<String>,
    pub code: String,
    pub message: String,
}

impl Display for ItemDeleteError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (version {}): {} ({})",
            self.key,
            self.version_id.as_deref().unwrap_or("null"),
            self.code,
            self.message
        )
    }
}

fn format_item_errors(errors: &[ItemDeleteError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Failure of a remote store call.
///
/// `code` is the S3 error code for service errors (e.g. `InternalError`,
/// `AccessDenied`) and `None` for transport failures that never produced a
/// service response (timeouts, connection errors).
#[derive(Error, Debug, Clone, PartialEq)]
#[error("S3 {operation} failed: {} ({message})", .code.as_deref().unwrap_or("N/A"))]
pub struct StorageError {
    pub operation: &'static str,
    pub code: Option<String>,
    pub message: String,
}

/// Find the S3 error code carried by a [`StorageError`] anywhere in the chain.
pub fn storage_error_code(e: &Error) -> Option<&str> {
    e.chain()
        .find_map(|cause| cause.downcast_ref::<StorageError>())
        .and_then(|storage_error| storage_error.code.as_deref())
}

/// Check if an anyhow::Error wraps a cancellation error.
pub fn is_cancelled_error(e: &Error) -> bool {
    if let Some(err) = e.downcast_ref::<S3purgeError>() {
        return *err == S3purgeError::Cancelled;
    }
    false
}

/// Extract the exit code from an anyhow::Error, defaulting to 1.
pub fn exit_code_from_error(e: &Error) -> i32 {
    if let Some(err) = e.downcast_ref::<S3purgeError>() {
        return err.exit_code();
    }
    1
}
