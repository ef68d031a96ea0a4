use std::time::Instant;

use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::protocol::anthropic::StopReason;
use crate::stream::StreamTranslator;
use crate::util::elapsed_secs_f64;

/// Initialize the tracing subscriber with the configured log level.
///
/// Maps config log levels to tracing levels:
/// - "DISABLED" -> no subscriber installed
/// - "WARNING" -> WARN
/// - "CRITICAL" -> ERROR
/// - Others map directly (TRACE, DEBUG, INFO, ERROR)
///
/// Logs go to stderr so that stdout stays a clean event stream.
pub fn init_tracing(log_level: &str) {
    let level = log_level.to_uppercase();

    if level == "DISABLED" {
        return;
    }

    let filter = EnvFilter::try_new(tracing_level(&level)).unwrap_or_else(|_| EnvFilter::new("INFO"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();
}

#[must_use]
fn tracing_level(level: &str) -> &str {
    match level {
        "WARNING" => "WARN",
        "CRITICAL" => "ERROR",
        other => other,
    }
}

/// Log the outcome of one translated stream at INFO level.
pub fn log_stream_complete(translator: &StreamTranslator, stop_reason: StopReason, started_at: Instant) {
    let usage = translator.usage();
    let stats = translator.stats();
    info!(
        model = translator.model(),
        message_id = translator.message_id(),
        blocks = stats.blocks,
        records = stats.records,
        skipped_records = stats.skipped_records,
        orphan_fragments = stats.orphan_fragments,
        input_tokens = usage.input_tokens,
        output_tokens = usage.output_tokens,
        stop_reason = stop_reason.as_str(),
        duration_seconds = elapsed_secs_f64(started_at),
        "stream translated"
    );
}
