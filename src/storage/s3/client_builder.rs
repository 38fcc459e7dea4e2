use std::time::Duration;

use aws_config::meta::region::RegionProviderChain;
#[allow(deprecated)]
use aws_config::profile::profile_file::{ProfileFileKind, ProfileFiles};
use aws_config::retry::RetryConfig;
use aws_config::timeout::TimeoutConfig;
use aws_config::{BehaviorVersion, ConfigLoader, Region};
use aws_sdk_s3::Client;
use aws_sdk_s3::config::{Credentials, StalledStreamProtectionConfig};

use crate::config::ClientConfig;
use crate::types::S3Credentials;

const CREDENTIALS_PROVIDER_NAME: &str = "s3purge";

impl ClientConfig {
    /// Build an S3 client from the CLI/library settings.
    ///
    /// Region resolution order: explicit region, then the profile/environment
    /// default chain.
    pub async fn create_client(&self) -> Client {
        let sdk_config = self.load_sdk_config().await;

        let mut builder = aws_sdk_s3::config::Builder::from(&sdk_config)
            .force_path_style(self.force_path_style)
            .request_checksum_calculation(self.request_checksum_calculation);

        if let Some(endpoint_url) = &self.endpoint_url {
            builder = builder.endpoint_url(endpoint_url);
        }

        if self.disable_stalled_stream_protection {
            builder = builder.stalled_stream_protection(StalledStreamProtectionConfig::disabled());
        }

        Client::from_conf(builder.build())
    }

    async fn load_sdk_config(&self) -> aws_config::SdkConfig {
        let region_provider =
            RegionProviderChain::first_try(self.region.clone().map(Region::new))
                .or_default_provider();

        let loader = aws_config::defaults(BehaviorVersion::latest())
            .region(region_provider)
            .retry_config(self.build_retry_config())
            .timeout_config(self.build_timeout_config());

        self.apply_credentials(loader).load().await
    }

    #[allow(deprecated)]
    fn apply_credentials(&self, loader: ConfigLoader) -> ConfigLoader {
        match &self.credential {
            S3Credentials::Credentials { access_keys } => {
                loader.credentials_provider(Credentials::new(
                    access_keys.access_key.clone(),
                    access_keys.secret_access_key.clone(),
                    access_keys.session_token.clone(),
                    None,
                    CREDENTIALS_PROVIDER_NAME,
                ))
            }
            S3Credentials::Profile(profile_name) => {
                let loader = loader.profile_name(profile_name);
                match self.build_profile_files() {
                    Some(profile_files) => loader.profile_files(profile_files),
                    None => loader,
                }
            }
            S3Credentials::FromEnvironment => loader,
        }
    }

    #[allow(deprecated)]
    fn build_profile_files(&self) -> Option<ProfileFiles> {
        let location = &self.client_config_location;
        if location.aws_config_file.is_none() && location.aws_shared_credentials_file.is_none() {
            return None;
        }

        let mut builder = ProfileFiles::builder()
            .include_default_config_file(location.aws_config_file.is_none())
            .include_default_credentials_file(location.aws_shared_credentials_file.is_none());
        if let Some(path) = &location.aws_config_file {
            builder = builder.with_file(ProfileFileKind::Config, path);
        }
        if let Some(path) = &location.aws_shared_credentials_file {
            builder = builder.with_file(ProfileFileKind::Credentials, path);
        }

        Some(builder.build())
    }

    fn build_retry_config(&self) -> RetryConfig {
        RetryConfig::standard()
            .with_max_attempts(self.retry_config.aws_max_attempts)
            .with_initial_backoff(Duration::from_millis(
                self.retry_config.initial_backoff_milliseconds,
            ))
    }

    fn build_timeout_config(&self) -> TimeoutConfig {
        let timeouts = &self.cli_timeout_config;
        let mut builder = TimeoutConfig::builder();
        builder
            .set_operation_timeout(timeouts.operation_timeout_milliseconds.map(Duration::from_millis))
            .set_operation_attempt_timeout(
                timeouts
                    .operation_attempt_timeout_milliseconds
                    .map(Duration::from_millis),
            )
            .set_connect_timeout(timeouts.connect_timeout_milliseconds.map(Duration::from_millis))
            .set_read_timeout(timeouts.read_timeout_milliseconds.map(Duration::from_millis));
        builder.build()
    }
}
