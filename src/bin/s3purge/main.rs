use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::{CommandFactory, Parser};
use clap_complete::generate;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use s3purge_rs::config::Config;
use s3purge_rs::{
    CLIArgs, PurgeCounters, PurgePipeline, create_pipeline_cancellation_token,
    exit_code_from_error, is_cancelled_error,
};

mod ctrl_c_handler;
mod indicator;
mod tracing_init;
mod ui_config;

const EXIT_CODE_SUCCESS: i32 = 0;
const EXIT_CODE_FAILURE: i32 = 1;

/// s3purge - empty S3 buckets of every version and delete marker, then
/// delete the buckets.
///
/// This binary is a thin wrapper over the s3purge-rs library.
#[cfg_attr(coverage_nightly, coverage(off))]
#[tokio::main]
async fn main() -> Result<()> {
    let config = load_config_exit_if_err();

    if let Some(shell) = config.auto_complete_shell {
        generate(
            shell,
            &mut CLIArgs::command(),
            "s3purge",
            &mut std::io::stdout(),
        );

        return Ok(());
    }

    start_tracing_if_necessary(&config);

    trace!("config = {:?}", config);

    let exit_code = run(config).await;
    if exit_code != EXIT_CODE_SUCCESS {
        std::process::exit(exit_code);
    }

    Ok(())
}

#[cfg_attr(coverage_nightly, coverage(off))]
fn load_config_exit_if_err() -> Config {
    match Config::try_from(CLIArgs::parse()) {
        Ok(config) => config,
        Err(error_message) => {
            clap::Error::raw(clap::error::ErrorKind::ValueValidation, error_message).exit()
        }
    }
}

fn start_tracing_if_necessary(config: &Config) -> bool {
    match &config.tracing_config {
        Some(tracing_config) => {
            tracing_init::init_tracing(tracing_config);
            true
        }
        None => false,
    }
}

#[cfg_attr(coverage_nightly, coverage(off))]
async fn run(config: Config) -> i32 {
    let cancellation_token = create_pipeline_cancellation_token();
    ctrl_c_handler::spawn_ctrl_c_handler(cancellation_token.clone());

    let counters = Arc::new(PurgeCounters::new());
    let indicator_stop_token = CancellationToken::new();
    let indicator_join_handle = indicator::show_indicator(
        counters.clone(),
        indicator_stop_token.clone(),
        Duration::from_secs(config.stats_interval_seconds),
        ui_config::is_progress_indicator_needed(&config),
        ui_config::is_show_result_needed(&config),
    );

    let start_time = tokio::time::Instant::now();
    debug!("purge pipeline start.");

    let mut pipeline = PurgePipeline::new(config, cancellation_token, counters).await;
    pipeline.run().await;

    indicator_stop_token.cancel();
    if let Err(e) = indicator_join_handle.await {
        warn!("progress indicator failed: {}", e);
    }

    let duration_sec = format!("{:.3}", start_time.elapsed().as_secs_f32());

    let Some(errors) = pipeline.get_errors_and_consume() else {
        info!(duration_sec = duration_sec, "s3purge has been completed.");
        return EXIT_CODE_SUCCESS;
    };

    let mut exit_code = EXIT_CODE_FAILURE;
    for (index, err) in errors.iter().enumerate() {
        if index == 0 {
            exit_code = exit_code_from_error(err);
        }
        if is_cancelled_error(err) {
            warn!("purge cancelled by user. Buckets were not deleted.");
            continue;
        }
        error!("{:#}", err);
    }
    error!(duration_sec = duration_sec, "s3purge failed.");

    exit_code
}
