use std::env;
use std::io::IsTerminal;

use tracing_subscriber::fmt::format::FmtSpan;

use s3purge_rs::config::TracingConfig;

const EVENT_FILTER_ENV_VAR: &str = "RUST_LOG";

pub fn init_tracing(config: &TracingConfig) {
    let fmt_span = if config.span_events_tracing {
        FmtSpan::NEW | FmtSpan::CLOSE
    } else {
        FmtSpan::NONE
    };

    let subscriber_builder = tracing_subscriber::fmt()
        .with_writer(std::io::stdout)
        .compact()
        .with_ansi(!config.disable_color_tracing && std::io::stdout().is_terminal())
        .with_span_events(fmt_span);

    let mut show_target = true;
    let event_filter = match env::var(EVENT_FILTER_ENV_VAR) {
        _ if config.aws_sdk_tracing => aws_sdk_event_filter(config.tracing_level),
        Ok(filter) => filter,
        Err(_) => {
            show_target = false;
            crate_event_filter(config.tracing_level)
        }
    };

    let subscriber_builder = subscriber_builder
        .with_env_filter(event_filter)
        .with_target(show_target);
    if config.json_tracing {
        subscriber_builder.json().init();
    } else {
        subscriber_builder.init();
    }
}

fn crate_event_filter(tracing_level: log::Level) -> String {
    format!("s3purge_rs={tracing_level},s3purge={tracing_level}")
}

fn aws_sdk_event_filter(tracing_level: log::Level) -> String {
    format!(
        "{},aws_smithy_runtime={tracing_level},aws_config={tracing_level},aws_sigv4={tracing_level}",
        crate_event_filter(tracing_level)
    )
}
