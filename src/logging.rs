//! File-based logging for tunebase
//!
//! The TUI owns the terminal, so tracing output goes to a daily rolling file.

use std::path::PathBuf;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

const DEFAULT_LOG_DIR: &str = ".logs";
const LOG_DIR_ENV: &str = "TUNEBASE_LOG_DIR";
const LOG_FILE_PREFIX: &str = "tunebase";
const DEFAULT_FILTER: &str = "tunebase=debug,reqwest=info,rodio=info,warn";

fn log_dir() -> PathBuf {
    std::env::var(LOG_DIR_ENV)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_LOG_DIR))
}

/// Initialize the logging system.
///
/// Logs are written to `<dir>/tunebase.YYYY-MM-DD.log`, where `<dir>` is
/// `TUNEBASE_LOG_DIR` or `.logs`. `RUST_LOG` overrides the default filter:
///
/// - `tunebase` modules: DEBUG
/// - `reqwest`, `rodio`: INFO
/// - Other crates: WARN
pub fn init_logging() -> anyhow::Result<()> {
    let dir = log_dir();
    std::fs::create_dir_all(&dir)?;

    let file_appender = RollingFileAppender::new(Rotation::DAILY, &dir, LOG_FILE_PREFIX);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    // Flushes on drop; kept alive until the process exits
    Box::leak(Box::new(guard));

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let fmt_layer = fmt::layer()
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_target(true)
        .with_thread_names(true) // the audio thread is named
        .with_span_events(FmtSpan::CLOSE);

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init()?;

    tracing::info!(dir = %dir.display(), "Logging initialized");

    Ok(())
}

/// Log a backend request and its result
#[macro_export]
macro_rules! log_api_result {
    ($operation:expr, $result:expr) => {
        match &$result {
            Ok(_) => tracing::info!(operation = $operation, "Backend request successful"),
            Err(e) => tracing::error!(operation = $operation, error = %e, "Backend request failed"),
        }
    };
}

/// Log a backend request with additional context
#[macro_export]
macro_rules! log_api_request {
    ($operation:expr, $($field:tt)*) => {
        tracing::debug!(operation = $operation, $($field)*, "Backend request started");
    };
}
