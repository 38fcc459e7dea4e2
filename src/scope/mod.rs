//! Turning target locators and a prefix pattern into concrete [`Scope`]s.

use std::collections::HashSet;

use crate::types::Scope;
use crate::types::error::S3purgeError;

pub mod brace;

pub use brace::{MAX_EXPANDED_PREFIXES, expand_braces};

const S3_SCHEME: &str = "s3://";

/// Parse one target locator.
///
/// Accepted forms: `bucket`, `bucket/prefix`, `s3://bucket` and
/// `s3://bucket/prefix`. Everything after the first `/` following the
/// bucket name is the prefix, verbatim.
pub fn parse_locator(locator: &str) -> Result<Scope, S3purgeError> {
    let path = match locator.strip_prefix(S3_SCHEME) {
        Some(path) => path,
        None if locator.contains("://") => {
            return Err(S3purgeError::InvalidTarget(format!(
                "{locator}: only the s3:// scheme is supported"
            )));
        }
        None => locator,
    };

    let (bucket, prefix) = path.split_once('/').unwrap_or((path, ""));
    if bucket.is_empty() {
        return Err(S3purgeError::InvalidTarget(format!(
            "{locator}: bucket name is empty"
        )));
    }

    Ok(Scope::new(bucket, prefix))
}

/// Multiply every target by the expanded prefix pattern.
///
/// Each expanded prefix is appended to the target's own prefix. Without a
/// pattern the targets are returned as they are. Duplicate scopes are
/// dropped, keeping the first occurrence.
pub fn expand_scopes(
    targets: &[Scope],
    prefix_pattern: Option<&str>,
) -> Result<Vec<Scope>, S3purgeError> {
    if targets.is_empty() {
        return Err(S3purgeError::InvalidConfig(
            "at least one target is required".to_string(),
        ));
    }

    let suffixes = match prefix_pattern {
        Some(pattern) if !pattern.is_empty() => expand_braces(pattern)?,
        _ => vec![String::new()],
    };

    let mut seen = HashSet::new();
    let mut scopes = Vec::with_capacity(targets.len() * suffixes.len());
    for target in targets {
        for suffix in &suffixes {
            let scope = Scope::new(target.bucket.clone(), format!("{}{suffix}", target.prefix));
            if seen.insert(scope.clone()) {
                scopes.push(scope);
            }
        }
    }
    Ok(scopes)
}

/// Distinct buckets named by `scopes`, in first-seen order.
pub fn touched_buckets(scopes: &[Scope]) -> Vec<String> {
    let mut seen = HashSet::new();
    scopes
        .iter()
        .filter(|scope| seen.insert(scope.bucket.as_str()))
        .map(|scope| scope.bucket.clone())
        .collect()
}
