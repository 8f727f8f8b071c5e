use std::time::Instant;

use tracing_subscriber::EnvFilter;

use crate::config::LogFormat;

/// Initialize the tracing subscriber with the configured log level.
///
/// Maps config log levels to tracing levels:
/// - "DISABLED" -> no subscriber installed
/// - "WARNING" -> WARN
/// - "CRITICAL" -> ERROR
/// - Others map directly (TRACE, DEBUG, INFO, WARN, ERROR)
pub fn init_tracing(log_level: &str, format: LogFormat) {
    let Some(directive) = tracing_directive(log_level) else {
        return;
    };

    let filter = EnvFilter::try_new(directive).unwrap_or_else(|_| EnvFilter::new("INFO"));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false);
    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

fn tracing_directive(log_level: &str) -> Option<String> {
    let level = log_level.to_uppercase();
    match level.as_str() {
        "DISABLED" => None,
        "WARNING" => Some("WARN".to_string()),
        "CRITICAL" => Some("ERROR".to_string()),
        _ => Some(level),
    }
}

/// Log a completed upstream gateway call.
pub fn log_gateway_complete(operation: &'static str, model: &str, start_time: Instant) {
    tracing::debug!(
        operation,
        model,
        elapsed_ms = u64::try_from(start_time.elapsed().as_millis()).unwrap_or(u64::MAX),
        "upstream call completed"
    );
}
