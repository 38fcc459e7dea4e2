pub mod args;

use crate::types::{ClientConfigLocation, S3Credentials, Scope};
use aws_sdk_s3::types::RequestPayer;
use aws_smithy_types::checksum_config::RequestChecksumCalculation;

/// Main configuration for a purge run.
///
/// Holds everything a [`PurgePipeline`](crate::PurgePipeline) needs: the
/// target scopes, an optional prefix pattern, AWS client settings, worker
/// pool size, and the dry-run / keep-buckets switches.
///
/// # Quick Start
///
/// ```
/// use s3purge_rs::Config;
///
/// let config = Config::for_bucket("my-bucket");
/// assert_eq!(config.worker_size, 64);
/// assert_eq!(config.max_keys, 1000);
/// ```
///
/// Several scopes and a brace pattern:
///
/// ```
/// use s3purge_rs::Config;
/// use s3purge_rs::types::Scope;
///
/// let mut config = Config::for_targets(vec![
///     Scope::new("bucket-a", ""),
///     Scope::new("bucket-b", "tmp/"),
/// ]);
/// config.prefix_pattern = Some("{0..9}".to_string());
/// config.dry_run = true;
/// ```
#[derive(Debug, Clone)]
pub struct Config {
    pub targets: Vec<Scope>,
    /// Brace-expandable pattern appended to every target prefix.
    pub prefix_pattern: Option<String>,
    pub show_no_progress: bool,
    pub target_client_config: Option<ClientConfig>,
    pub tracing_config: Option<TracingConfig>,
    pub worker_size: u16,
    pub dry_run: bool,
    pub keep_buckets: bool,
    pub rate_limit_objects: Option<u32>,
    pub max_keys: i32,
    pub stats_interval_seconds: u64,
    pub auto_complete_shell: Option<clap_complete::shells::Shell>,
}

impl Config {
    /// Create a `Config` with CLI defaults for the given scopes.
    ///
    /// No S3 client is configured. Set `target_client_config`, or build the
    /// config with `parse_from_args`, before calling `PurgePipeline::new`.
    pub fn for_targets(targets: Vec<Scope>) -> Self {
        Config {
            targets,
            ..Config::default()
        }
    }

    /// Create a `Config` that purges a whole bucket.
    pub fn for_bucket(bucket: &str) -> Self {
        Self::for_targets(vec![Scope::new(bucket, "")])
    }
}

impl Default for Config {
    /// Defaults match the CLI. `targets` is empty and must be set before a
    /// pipeline is run.
    fn default() -> Self {
        Config {
            targets: Vec::new(),
            prefix_pattern: None,
            show_no_progress: false,
            target_client_config: None,
            tracing_config: None,
            worker_size: 64,
            dry_run: false,
            keep_buckets: false,
            rate_limit_objects: None,
            max_keys: 1000,
            stats_interval_seconds: 3,
            auto_complete_shell: None,
        }
    }
}

/// AWS S3 client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub client_config_location: ClientConfigLocation,
    pub credential: S3Credentials,
    pub region: Option<String>,
    pub endpoint_url: Option<String>,
    pub force_path_style: bool,
    pub request_payer: Option<RequestPayer>,
    pub retry_config: RetryConfig,
    pub cli_timeout_config: CLITimeoutConfig,
    pub disable_stalled_stream_protection: bool,
    pub request_checksum_calculation: RequestChecksumCalculation,
}

/// AWS SDK retry policy (transport-level, below the transient item retry).
#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub aws_max_attempts: u32,
    pub initial_backoff_milliseconds: u64,
}

#[derive(Debug, Clone)]
pub struct CLITimeoutConfig {
    pub operation_timeout_milliseconds: Option<u64>,
    pub operation_attempt_timeout_milliseconds: Option<u64>,
    pub connect_timeout_milliseconds: Option<u64>,
    pub read_timeout_milliseconds: Option<u64>,
}

/// Tracing (logging) configuration, consumed by the binary.
#[derive(Debug, Clone, Copy)]
pub struct TracingConfig {
    pub tracing_level: log::Level,
    pub json_tracing: bool,
    pub aws_sdk_tracing: bool,
    pub span_events_tracing: bool,
    pub disable_color_tracing: bool,
}
