use crate::config::{CLITimeoutConfig, ClientConfig, Config, RetryConfig, TracingConfig};
use crate::scope::{expand_braces, parse_locator};
use crate::types::{AccessKeys, ClientConfigLocation, S3Credentials, Scope};
use aws_sdk_s3::types::RequestPayer;
use aws_smithy_types::checksum_config::RequestChecksumCalculation;
use clap::Parser;
use clap::builder::NonEmptyStringValueParser;
use clap_verbosity_flag::{Verbosity, WarnLevel};
use std::ffi::OsString;
use std::path::PathBuf;

mod value_parser;


// ---------------------------------------------------------------------------
// Default constants
// ---------------------------------------------------------------------------

const DEFAULT_REGION: &str = "us-east-1";
const DEFAULT_WORKER_SIZE: u16 = 64;
const DEFAULT_MAX_KEYS: i32 = 1000;
const DEFAULT_STATS_INTERVAL_SECONDS: u64 = 3;
const DEFAULT_AWS_MAX_ATTEMPTS: u32 = 10;
const DEFAULT_INITIAL_BACKOFF_MILLISECONDS: u64 = 100;
const DEFAULT_JSON_TRACING: bool = false;
const DEFAULT_AWS_SDK_TRACING: bool = false;
const DEFAULT_SPAN_EVENTS_TRACING: bool = false;
const DEFAULT_DISABLE_COLOR_TRACING: bool = false;
const DEFAULT_FORCE_PATH_STYLE: bool = false;
const DEFAULT_DRY_RUN: bool = false;
const DEFAULT_KEEP_BUCKETS: bool = false;
const DEFAULT_DISABLE_STALLED_STREAM_PROTECTION: bool = false;
const DEFAULT_REQUEST_PAYER: bool = false;
const DEFAULT_SHOW_NO_PROGRESS: bool = false;

// ---------------------------------------------------------------------------
// Error messages
// ---------------------------------------------------------------------------

const ERROR_MESSAGE_NO_TARGETS: &str = "At least one target is required.";
const ERROR_MESSAGE_WORKER_SIZE_ZERO: &str = "Worker size must be at least 1.";
const ERROR_MESSAGE_MAX_KEYS_OUT_OF_RANGE: &str = "Max keys must be between 1 and 1000.";
const ERROR_MESSAGE_RATE_LIMIT_ZERO: &str = "Rate limit must be at least 1 object per second.";
const ERROR_MESSAGE_STATS_INTERVAL_ZERO: &str = "Stats interval must be at least 1 second.";
const ERROR_MESSAGE_SECRET_KEY_REQUIRED: &str =
    "--secret-key is required when --access-key is given.";

// ---------------------------------------------------------------------------
// CLIArgs (clap-derived argument struct)
// ---------------------------------------------------------------------------

/// s3purge - Remove every object version, every delete marker and then the
/// bucket itself, as fast as S3 allows.
///
/// Example:
///   s3purge my-bucket --dry-run
///   s3purge s3://my-bucket/logs/ other-bucket
///   s3purge my-bucket --prefix '{{0..9},{a..z},{A..Z}}' --workers 256
#[derive(Parser, Clone, Debug)]
#[command(name = "s3purge", version, about, long_about = None)]
pub struct CLIArgs {
    /// Buckets or prefixes to purge: <BUCKET>, <BUCKET>/<PREFIX> or s3://<BUCKET>[/<PREFIX>]
    #[arg(
        value_parser = value_parser::target::check_target,
        num_args = 1..,
        required_unless_present = "auto_complete_shell",
    )]
    pub targets: Vec<String>,

    // -----------------------------------------------------------------------
    // General options
    // -----------------------------------------------------------------------
    /// List every version but do not delete anything.
    #[arg(short = 'd', long, env, default_value_t = DEFAULT_DRY_RUN, help_heading = "General")]
    pub dry_run: bool,

    /// Delete objects but leave the buckets in place.
    #[arg(long, env, default_value_t = DEFAULT_KEEP_BUCKETS, help_heading = "General")]
    pub keep_buckets: bool,

    /// Don't show the progress bar.
    #[arg(long, env, default_value_t = DEFAULT_SHOW_NO_PROGRESS, help_heading = "General")]
    pub show_no_progress: bool,

    /// Seconds between progress log lines.
    #[arg(long, env, default_value_t = DEFAULT_STATS_INTERVAL_SECONDS, help_heading = "General")]
    pub stats_interval_seconds: u64,

    // -----------------------------------------------------------------------
    // Listing options
    // -----------------------------------------------------------------------
    /// Brace-expandable prefix appended to every target.
    #[arg(
        long = "prefix",
        env = "PREFIX_PATTERN",
        value_parser = NonEmptyStringValueParser::new(),
        help_heading = "Listing",
        long_help = r#"Prefix pattern appended to every target's prefix. Each expansion is
listed independently and in parallel.
Supports comma lists, numeric and letter ranges, and nesting.

Example: "logs/{2023,2024}/" or "{{0..9},{a..z},{A..Z}}""#
    )]
    pub prefix_pattern: Option<String>,

    /// Max keys per listing request (1-1000).
    #[arg(long, env, default_value_t = DEFAULT_MAX_KEYS, help_heading = "Listing")]
    pub max_keys: i32,

    // -----------------------------------------------------------------------
    // Performance options
    // -----------------------------------------------------------------------
    /// Number of concurrent delete workers.
    #[arg(long, visible_alias = "workers", env, default_value_t = DEFAULT_WORKER_SIZE, help_heading = "Performance")]
    pub worker_size: u16,

    /// Maximum objects per second for rate limiting.
    #[arg(long, env, help_heading = "Performance")]
    pub rate_limit_objects: Option<u32>,

    // -----------------------------------------------------------------------
    // Logging options
    // -----------------------------------------------------------------------
    /// Verbosity level. -q (quiet), default (normal), -v, -vv, -vvv.
    #[command(flatten)]
    pub verbosity: Verbosity<WarnLevel>,

    /// Output logs in JSON format.
    #[arg(long, env, default_value_t = DEFAULT_JSON_TRACING, help_heading = "Logging")]
    pub json_tracing: bool,

    /// Enable AWS SDK tracing.
    #[arg(long, env, default_value_t = DEFAULT_AWS_SDK_TRACING, help_heading = "Logging")]
    pub aws_sdk_tracing: bool,

    /// Enable tracing span events.
    #[arg(long, env, default_value_t = DEFAULT_SPAN_EVENTS_TRACING, help_heading = "Logging")]
    pub span_events_tracing: bool,

    /// Disable colored output in logs.
    #[arg(long, env, default_value_t = DEFAULT_DISABLE_COLOR_TRACING, help_heading = "Logging")]
    pub disable_color_tracing: bool,

    // -----------------------------------------------------------------------
    // Retry options
    // -----------------------------------------------------------------------
    /// Maximum attempts per AWS SDK request.
    #[arg(long, env, default_value_t = DEFAULT_AWS_MAX_ATTEMPTS, help_heading = "Retry")]
    pub aws_max_attempts: u32,

    /// Initial backoff in milliseconds for SDK retries.
    #[arg(long, env, default_value_t = DEFAULT_INITIAL_BACKOFF_MILLISECONDS, help_heading = "Retry")]
    pub initial_backoff_milliseconds: u64,

    // -----------------------------------------------------------------------
    // Timeout options
    // -----------------------------------------------------------------------
    #[arg(long, env, help_heading = "Timeout")]
    pub operation_timeout_milliseconds: Option<u64>,

    #[arg(long, env, help_heading = "Timeout")]
    pub operation_attempt_timeout_milliseconds: Option<u64>,

    #[arg(long, env, help_heading = "Timeout")]
    pub connect_timeout_milliseconds: Option<u64>,

    #[arg(long, env, help_heading = "Timeout")]
    pub read_timeout_milliseconds: Option<u64>,

    // -----------------------------------------------------------------------
    // AWS configuration
    // -----------------------------------------------------------------------
    /// AWS config file path.
    #[arg(long, env, help_heading = "AWS")]
    pub aws_config_file: Option<PathBuf>,

    /// AWS shared credentials file path.
    #[arg(long, env, help_heading = "AWS")]
    pub aws_shared_credentials_file: Option<PathBuf>,

    /// AWS profile. Without a profile or access keys the default credential
    /// chain is used.
    #[arg(long, value_parser = NonEmptyStringValueParser::new(), conflicts_with = "access_key", help_heading = "AWS")]
    pub profile: Option<String>,

    #[arg(long, value_parser = NonEmptyStringValueParser::new(), help_heading = "AWS")]
    pub access_key: Option<String>,

    #[arg(long, value_parser = NonEmptyStringValueParser::new(), help_heading = "AWS")]
    pub secret_key: Option<String>,

    #[arg(long, value_parser = NonEmptyStringValueParser::new(), help_heading = "AWS")]
    pub session_token: Option<String>,

    /// AWS region.
    #[arg(long, env = "AWS_REGION", default_value = DEFAULT_REGION, value_parser = NonEmptyStringValueParser::new(), help_heading = "AWS")]
    pub region: String,

    /// Custom S3-compatible endpoint URL (e.g. MinIO).
    #[arg(long, env, value_parser = value_parser::url::check_scheme, help_heading = "AWS")]
    pub endpoint_url: Option<String>,

    /// Force path-style access (required for some S3-compatible services).
    #[arg(long, env, default_value_t = DEFAULT_FORCE_PATH_STYLE, help_heading = "AWS")]
    pub force_path_style: bool,

    /// Send requests as the requester of a requester-pays bucket.
    #[arg(long, env, default_value_t = DEFAULT_REQUEST_PAYER, help_heading = "AWS")]
    pub request_payer: bool,

    /// Disable stalled stream protection.
    #[arg(long, env, default_value_t = DEFAULT_DISABLE_STALLED_STREAM_PROTECTION, help_heading = "AWS")]
    pub disable_stalled_stream_protection: bool,

    // -----------------------------------------------------------------------
    // Advanced options
    // -----------------------------------------------------------------------
    /// Generate shell completions.
    #[arg(long, env, help_heading = "Advanced")]
    pub auto_complete_shell: Option<clap_complete::shells::Shell>,
}

// ---------------------------------------------------------------------------
// parse_from_args (public API)
// ---------------------------------------------------------------------------

/// Parse command-line arguments into a `CLIArgs` struct.
///
/// # Example
///
/// ```
/// use s3purge_rs::config::args::parse_from_args;
///
/// let args = vec!["s3purge", "my-bucket", "s3://other-bucket/tmp/", "--dry-run"];
/// let cli_args = parse_from_args(args).unwrap();
/// assert!(cli_args.dry_run);
/// assert_eq!(cli_args.targets.len(), 2);
/// ```
pub fn parse_from_args<I, T>(args: I) -> Result<CLIArgs, clap::Error>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    CLIArgs::try_parse_from(args)
}

/// Parse arguments and build a Config in one step.
pub fn build_config_from_args<I, T>(args: I) -> Result<Config, String>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let cli_args = CLIArgs::try_parse_from(args).map_err(|e| e.to_string())?;
    Config::try_from(cli_args)
}

// ---------------------------------------------------------------------------
// Validation and Config conversion
// ---------------------------------------------------------------------------

impl CLIArgs {
    fn validate(&self) -> Result<(), String> {
        if self.targets.is_empty() && self.auto_complete_shell.is_none() {
            return Err(ERROR_MESSAGE_NO_TARGETS.to_string());
        }
        if self.worker_size == 0 {
            return Err(ERROR_MESSAGE_WORKER_SIZE_ZERO.to_string());
        }
        if !(1..=1000).contains(&self.max_keys) {
            return Err(ERROR_MESSAGE_MAX_KEYS_OUT_OF_RANGE.to_string());
        }
        if self.rate_limit_objects == Some(0) {
            return Err(ERROR_MESSAGE_RATE_LIMIT_ZERO.to_string());
        }
        if self.stats_interval_seconds == 0 {
            return Err(ERROR_MESSAGE_STATS_INTERVAL_ZERO.to_string());
        }
        if self.access_key.is_some() && self.secret_key.is_none() {
            return Err(ERROR_MESSAGE_SECRET_KEY_REQUIRED.to_string());
        }
        if let Some(pattern) = &self.prefix_pattern {
            expand_braces(pattern).map_err(|e| e.to_string())?;
        }
        Ok(())
    }

    fn parse_targets(&self) -> Result<Vec<Scope>, String> {
        self.targets
            .iter()
            .map(|target| parse_locator(target).map_err(|e| e.to_string()))
            .collect()
    }

    fn build_client_config(&self) -> Option<ClientConfig> {
        let credential = if let Some(ref profile) = self.profile {
            S3Credentials::Profile(profile.clone())
        } else if let Some(ref access_key) = self.access_key {
            S3Credentials::Credentials {
                access_keys: AccessKeys {
                    access_key: access_key.clone(),
                    secret_access_key: self.secret_key.clone().unwrap_or_default(),
                    session_token: self.session_token.clone(),
                },
            }
        } else {
            S3Credentials::FromEnvironment
        };

        let request_payer = if self.request_payer {
            Some(RequestPayer::Requester)
        } else {
            None
        };

        Some(ClientConfig {
            client_config_location: ClientConfigLocation {
                aws_config_file: self.aws_config_file.clone(),
                aws_shared_credentials_file: self.aws_shared_credentials_file.clone(),
            },
            credential,
            region: Some(self.region.clone()),
            endpoint_url: self.endpoint_url.clone(),
            force_path_style: self.force_path_style,
            request_payer,
            retry_config: RetryConfig {
                aws_max_attempts: self.aws_max_attempts,
                initial_backoff_milliseconds: self.initial_backoff_milliseconds,
            },
            cli_timeout_config: CLITimeoutConfig {
                operation_timeout_milliseconds: self.operation_timeout_milliseconds,
                operation_attempt_timeout_milliseconds: self.operation_attempt_timeout_milliseconds,
                connect_timeout_milliseconds: self.connect_timeout_milliseconds,
                read_timeout_milliseconds: self.read_timeout_milliseconds,
            },
            disable_stalled_stream_protection: self.disable_stalled_stream_protection,
            request_checksum_calculation: RequestChecksumCalculation::WhenRequired,
        })
    }

    fn build_tracing_config(&self) -> Option<TracingConfig> {
        let log_level = self.verbosity.log_level()?;

        Some(TracingConfig {
            tracing_level: log_level,
            json_tracing: self.json_tracing,
            aws_sdk_tracing: self.aws_sdk_tracing,
            span_events_tracing: self.span_events_tracing,
            disable_color_tracing: self.disable_color_tracing,
        })
    }
}

impl TryFrom<CLIArgs> for Config {
    type Error = String;

    fn try_from(args: CLIArgs) -> Result<Self, Self::Error> {
        args.validate()?;

        Ok(Config {
            targets: args.parse_targets()?,
            prefix_pattern: args.prefix_pattern.clone(),
            show_no_progress: args.show_no_progress,
            target_client_config: args.build_client_config(),
            tracing_config: args.build_tracing_config(),
            worker_size: args.worker_size,
            dry_run: args.dry_run,
            keep_buckets: args.keep_buckets,
            rate_limit_objects: args.rate_limit_objects,
            max_keys: args.max_keys,
            stats_interval_seconds: args.stats_interval_seconds,
            auto_complete_shell: args.auto_complete_shell,
        })
    }
}
