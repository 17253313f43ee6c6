use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::{SubscriberInitExt, TryInitError};
use tracing_subscriber::{EnvFilter, fmt};

pub const LOG_FILE_NAME: &str = "trove.log";

fn filter(verbosity: u8) -> EnvFilter {
    match verbosity {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        1 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    }
}

/// Install the global subscriber: human-readable stdout plus a daily rolling
/// file in `log_dir` (no ANSI colours).
///
/// The returned guard flushes the file writer on drop and must be held for the
/// lifetime of the program.
pub fn init(log_dir: &Path, verbosity: u8) -> Result<WorkerGuard, TryInitError> {
    let (writer, guard) = tracing_appender::non_blocking(rolling::daily(log_dir, LOG_FILE_NAME));
    tracing_subscriber::registry()
        .with(filter(verbosity))
        .with(fmt::layer().with_target(false))
        .with(fmt::layer().with_ansi(false).with_writer(writer))
        .try_init()?;
    Ok(guard)
}
