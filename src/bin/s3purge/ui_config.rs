use s3purge_rs::config::Config;

/// Whether to show the live-updating progress line.
///
/// Off in quiet mode, above Warn verbosity (log lines take the terminal),
/// and with JSON logging.
pub fn is_progress_indicator_needed(config: &Config) -> bool {
    if config.show_no_progress {
        return false;
    }

    match &config.tracing_config {
        None => true,
        Some(tracing_config) => {
            tracing_config.tracing_level <= log::Level::Warn && !tracing_config.json_tracing
        }
    }
}

/// Whether to print the final summary line.
pub fn is_show_result_needed(config: &Config) -> bool {
    if config.show_no_progress {
        return false;
    }

    config
        .tracing_config
        .as_ref()
        .is_none_or(|tracing_config| !tracing_config.json_tracing)
}
