//! Logging setup for host applications.
//!
//! The library only emits `tracing` events. A host that has no subscriber
//! of its own can call [`init_logging`] to send them to a file:
//! - non-blocking writer, flushed when the returned guard drops
//! - filtered by `RUST_LOG`, defaulting to `info`

use std::fs;
use std::io;
use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Default filter when `RUST_LOG` is unset.
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Keeps the background log writer alive. Dropping it flushes the file.
#[must_use = "logging stops when the guard is dropped"]
pub struct LoggingGuard {
    _file_guard: WorkerGuard,
}

/// Installs a global subscriber writing to `log_dir/log_file`.
///
/// The file is truncated at start.
///
/// # Errors
///
/// Returns an error if the directory cannot be created, the file cannot be
/// truncated, or a global subscriber is already installed.
pub fn init_logging(log_dir: impl AsRef<Path>, log_file: &str) -> Result<LoggingGuard, io::Error> {
    let log_dir = log_dir.as_ref();
    fs::create_dir_all(log_dir)?;
    fs::write(log_dir.join(log_file), "")?;

    let file_appender = tracing_appender::rolling::never(log_dir, log_file);
    let (writer, file_guard) = tracing_appender::non_blocking(file_appender);

    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(writer)
        .with_ansi(false)
        .with_span_events(FmtSpan::CLOSE);

    tracing_subscriber::registry()
        .with(env_filter())
        .with(file_layer)
        .try_init()
        .map_err(|e| io::Error::new(io::ErrorKind::AlreadyExists, e))?;

    Ok(LoggingGuard {
        _file_guard: file_guard,
    })
}

/// `RUST_LOG` if set and valid, otherwise [`DEFAULT_LOG_FILTER`].
pub fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER))
}

/// Default log file name.
pub fn default_log_file() -> &'static str {
    "tileview.log"
}

#[cfg(test)]
mod tests {
    use super::*;

    // A global subscriber can only be installed once per process, so
    // init_logging itself is exercised by a single test.
    #[test]
    fn test_init_logging_writes_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let log_dir = dir.path().join("nested/logs");
        std::fs::create_dir_all(&log_dir).unwrap();
        std::fs::write(log_dir.join("t.log"), "stale").unwrap();

        match init_logging(&log_dir, "t.log") {
            Ok(guard) => {
                tracing::info!(target: "tileview", "logging initialised");
                drop(guard);
                let contents = std::fs::read_to_string(log_dir.join("t.log")).unwrap();
                assert!(!contents.contains("stale"));
            }
            // Another test installed a subscriber first.
            Err(e) => assert_eq!(e.kind(), io::ErrorKind::AlreadyExists),
        }
    }

    #[test]
    fn test_default_log_file() {
        assert_eq!(default_log_file(), "tileview.log");
    }

    #[test]
    fn test_env_filter_builds() {
        let _ = env_filter();
    }
}
