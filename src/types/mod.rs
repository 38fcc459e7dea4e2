use std::fmt;
use std::fmt::{Debug, Display, Formatter};
use std::path::PathBuf;

use aws_sdk_s3::types::{DeleteMarkerEntry, ObjectVersion};
use zeroize_derive::{Zeroize, ZeroizeOnDrop};

pub mod error;
pub mod stats;
pub mod token;

pub use stats::{PurgeCounters, PurgeMetrics, PurgeStats};

/// A subtree of one bucket to enumerate and purge.
///
/// The prefix may be empty, in which case the whole bucket is covered.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Scope {
    pub bucket: String,
    pub prefix: String,
}

impl Scope {
    pub fn new(bucket: impl Into<String>, prefix: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            prefix: prefix.into(),
        }
    }
}

impl Display for Scope {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "s3://{}/{}", self.bucket, self.prefix)
    }
}

/// One deletable unit: an object version or a delete marker.
///
/// Both kinds are deleted the same way, by key and version id. `version_id`
/// is `None` only for objects written before versioning was enabled and
/// listed without an explicit `null` version.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ObjectVersionId {
    pub key: String,
    pub version_id: Option<String>,
}

impl ObjectVersionId {
    pub fn new(key: impl Into<String>, version_id: Option<String>) -> Self {
        Self {
            key: key.into(),
            version_id,
        }
    }
}

impl Display for ObjectVersionId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match &self.version_id {
            Some(version_id) => write!(f, "{}?versionId={}", self.key, version_id),
            None => write!(f, "{}", self.key),
        }
    }
}

impl From<&ObjectVersion> for ObjectVersionId {
    fn from(version: &ObjectVersion) -> Self {
        Self::new(
            version.key().unwrap_or_default(),
            version.version_id().map(String::from),
        )
    }
}

impl From<&DeleteMarkerEntry> for ObjectVersionId {
    fn from(marker: &DeleteMarkerEntry) -> Self {
        Self::new(
            marker.key().unwrap_or_default(),
            marker.version_id().map(String::from),
        )
    }
}

/// The unit of work passed through the deletion queue.
///
/// Holds at most [`MAX_BATCH_SIZE`](crate::deleter::batch::MAX_BATCH_SIZE)
/// identifiers, all from the same bucket.
#[derive(Debug, Clone, PartialEq)]
pub struct DeleteBatch {
    pub bucket: String,
    pub objects: Vec<ObjectVersionId>,
}

impl DeleteBatch {
    pub fn new(bucket: impl Into<String>, objects: Vec<ObjectVersionId>) -> Self {
        Self {
            bucket: bucket.into(),
            objects,
        }
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}

/// AWS configuration file locations.
#[derive(Debug, Clone)]
pub struct ClientConfigLocation {
    pub aws_config_file: Option<PathBuf>,
    pub aws_shared_credentials_file: Option<PathBuf>,
}

/// AWS credential sources supported by s3purge.
#[derive(Debug, Clone)]
pub enum S3Credentials {
    Profile(String),
    Credentials { access_keys: AccessKeys },
    FromEnvironment,
}

/// AWS access key pair.
///
/// The secret_access_key and session_token are cleared from memory
/// when this struct is dropped.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct AccessKeys {
    pub access_key: String,
    pub secret_access_key: String,
    pub session_token: Option<String>,
}

impl Debug for AccessKeys {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let mut keys = f.debug_struct("AccessKeys");
        let session_token = self
            .session_token
            .as_ref()
            .map_or("None", |_| "** redacted **");
        keys.field("access_key", &self.access_key)
            .field("secret_access_key", &"** redacted **")
            .field("session_token", &session_token);
        keys.finish()
    }
}
