use std::path::PathBuf;
use tracing::debug;
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::error::{RelayError, Result};

const LOG_FILE_SUFFIX: &str = "log";

/// Daily rolling log files named `YYYY-MM-DD.log`
pub struct FileLogger {
    log_directory: PathBuf,
    rotation: Rotation,
}

impl FileLogger {
    pub fn new(log_directory: PathBuf) -> Self {
        Self {
            log_directory,
            rotation: Rotation::DAILY,
        }
    }

    pub fn setup_file_logging(&self) -> Result<(NonBlocking, WorkerGuard)> {
        // Ensure log directory exists
        std::fs::create_dir_all(&self.log_directory)?;

        let file_appender = RollingFileAppender::builder()
            .rotation(self.rotation.clone())
            .filename_suffix(LOG_FILE_SUFFIX)
            .build(&self.log_directory)
            .map_err(|e| RelayError::LoggingError(e.to_string()))?;

        Ok(tracing_appender::non_blocking(file_appender))
    }
}

/// Level used when `RUST_LOG` is not set
pub fn default_level(debug_enabled: bool) -> &'static str {
    if debug_enabled { "debug" } else { "info" }
}

/// Install console and file output. Keep the returned guard alive for the
/// lifetime of the process or buffered file output is lost.
pub fn setup_logging(file_logger: &FileLogger, debug_enabled: bool) -> Result<WorkerGuard> {
    let (file_writer, guard) = file_logger.setup_file_logging()?;
    let level = default_level(debug_enabled);
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer()) // Console output
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(file_writer)
                .with_ansi(false),
        )
        .try_init()
        .map_err(|e| RelayError::LoggingError(e.to_string()))?;

    debug!(
        "Logging configured (level={}, dir={:?})",
        level, file_logger.log_directory
    );
    Ok(guard)
}
