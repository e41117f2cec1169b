// Tracing subscriber for the blobmig binary.
//
// Events go to stderr; stdout carries only the summary line.

use std::env;
use std::io::IsTerminal;

use tracing_subscriber::fmt::format::FmtSpan;

use blobmig_rs::config::TracingConfig;

const EVENT_FILTER_ENV_VAR: &str = "RUST_LOG";
const LIBRARY_TARGET: &str = "blobmig_rs";
const BINARY_TARGET: &str = "blobmig";

pub fn init_tracing(config: &TracingConfig) {
    let filter = event_filter(config.tracing_level, env::var(EVENT_FILTER_ENV_VAR).ok());
    let span_events = if config.span_events_tracing {
        FmtSpan::NEW | FmtSpan::CLOSE
    } else {
        FmtSpan::NONE
    };

    let builder = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .with_target(false)
        .with_ansi(!config.disable_color_tracing && std::io::stderr().is_terminal())
        .with_span_events(span_events);

    if config.json_tracing {
        builder.json().init();
    } else {
        builder.compact().init();
    }
}

/// `RUST_LOG` replaces the filter entirely, SDK targets included.
fn event_filter(level: log::Level, rust_log: Option<String>) -> String {
    rust_log.unwrap_or_else(|| format!("{LIBRARY_TARGET}={level},{BINARY_TARGET}={level}"))
}
