use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

pub const LOG_ENV: &str = "VERBATIM_LOG";
pub const LOG_FILE: &str = "verbatim.log";

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Send tracing output to `<log_dir>/verbatim.log`. The terminal belongs to
/// the TUI, so nothing is printed to stderr.
///
/// Returns `None` when the directory cannot be created or a subscriber is
/// already installed. Keep the guard alive until exit to flush buffered lines.
pub fn init(log_dir: &Path) -> Option<WorkerGuard> {
    std::fs::create_dir_all(log_dir).ok()?;

    let file_appender = tracing_appender::rolling::never(log_dir, LOG_FILE);
    let (writer, guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_writer(writer)
        .with_ansi(false)
        .with_target(true)
        .try_init()
        .ok()?;

    Some(guard)
}
