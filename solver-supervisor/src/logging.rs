use std::fs::OpenOptions;

use tracing_subscriber::layer::SubscriberExt;

use crate::monitor::ProcessMonitor;

/// Holds every guard that must outlive the logging setup for one command:
/// dropping this flushes the non-blocking writers and restores whatever
/// subscriber was active before.
pub struct CommandLogGuard {
    _subscriber: tracing::subscriber::DefaultGuard,
    _text_writer: tracing_appender::non_blocking::WorkerGuard,
    _json_writer: tracing_appender::non_blocking::WorkerGuard,
}

/// Re-establish file-backed logging fresh for the command about to run,
/// writing a human-readable line per event to `<run_name>.log` and the same
/// events as JSON to `<run_name>.events.jsonl`.
pub fn setup_for_command(monitor: &ProcessMonitor, run_name: &str) -> std::io::Result<CommandLogGuard> {
    let text_file = OpenOptions::new().create(true).append(true).open(monitor.log_path(run_name))?;
    let json_file = OpenOptions::new().create(true).append(true).open(monitor.events_path(run_name))?;

    let (text_writer, text_guard) = tracing_appender::non_blocking(text_file);
    let (json_writer, json_guard) = tracing_appender::non_blocking(json_file);

    let text_layer = tracing_subscriber::fmt::layer()
        .with_writer(text_writer)
        .with_ansi(false)
        .with_target(true);
    let json_layer = tracing_subscriber::fmt::layer()
        .json()
        .with_writer(json_writer)
        .with_ansi(false);

    let subscriber = tracing_subscriber::registry().with(text_layer).with(json_layer);
    let subscriber_guard = tracing::subscriber::set_default(subscriber);

    Ok(CommandLogGuard {
        _subscriber: subscriber_guard,
        _text_writer: text_guard,
        _json_writer: json_guard,
    })
}
