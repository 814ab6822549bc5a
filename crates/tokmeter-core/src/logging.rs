//! Logging infrastructure for tokmeter.
//!
//! Structured logging through the `tracing` ecosystem. The accounting
//! services only emit events; installing a subscriber is left to the
//! embedding application, which can use [`init_logging`] for the standard
//! setup.
//!
//! ## Features
//!
//! - JSON lines written to `~/.tokmeter/logs/tokmeter.log` (daily rotation)
//! - Console output on stderr with configurable verbosity
//! - `RUST_LOG` overrides the default filter
//!
//! ## Example
//!
//! ```no_run
//! use tokmeter_core::logging;
//!
//! let _guard = logging::init_logging(None, false).expect("logging init");
//!
//! tracing::info!("meter started");
//! tracing::debug!(model = "claude-sonnet-4.0", "pricing loaded");
//! ```

use std::path::PathBuf;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    EnvFilter,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

use crate::error::{CoreError, Result};

/// Guard that must be held to ensure log flushing on shutdown.
///
/// Keep this guard alive for the lifetime of the application.
pub struct LogGuard {
    _file_guard: Option<WorkerGuard>,
}

/// Initialize the tokmeter logging system.
///
/// This sets up:
/// - File logging to `<log_dir>/tokmeter.log` (JSON lines format)
/// - Console logging to stderr (human-readable format)
///
/// # Arguments
///
/// * `log_dir` - Optional custom log directory. Defaults to `~/.tokmeter/logs/`
/// * `verbose` - If true, sets log level to DEBUG. Otherwise uses INFO.
pub fn init_logging(log_dir: Option<PathBuf>, verbose: bool) -> Result<LogGuard> {
    let log_dir = match log_dir {
        Some(dir) => dir,
        None => default_log_dir()?,
    };

    std::fs::create_dir_all(&log_dir).map_err(|e| CoreError::DirectoryCreation {
        path: log_dir.clone(),
        source: e,
    })?;

    let file_appender = tracing_appender::rolling::daily(&log_dir, "tokmeter.log");
    let (non_blocking_file, file_guard) = tracing_appender::non_blocking(file_appender);

    let default_level = if verbose { "debug" } else { "info" };
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("tokmeter={default_level}")));

    let file_layer = fmt::layer()
        .with_writer(non_blocking_file)
        .with_ansi(false)
        .json()
        .with_span_events(FmtSpan::CLOSE)
        .with_current_span(true)
        .with_span_list(true);

    let console_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(true)
        .with_target(true)
        .with_file(verbose)
        .with_line_number(verbose)
        .compact();

    tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .with(console_layer)
        .try_init()
        .map_err(|e| CoreError::internal(format!("logging already initialized: {e}")))?;

    tracing::debug!(log_dir = %log_dir.display(), verbose, "logging initialized");

    Ok(LogGuard {
        _file_guard: Some(file_guard),
    })
}

/// Initialize minimal console-only logging for tests.
pub fn init_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new("debug"))
        .with_test_writer()
        .try_init();
}

/// Get the default log directory path.
///
/// Returns `~/.tokmeter/logs/`
pub fn default_log_dir() -> Result<PathBuf> {
    let home = std::env::var("HOME").map_err(|_| CoreError::Internal {
        message: "HOME environment variable not set".into(),
    })?;

    Ok(home_log_dir(PathBuf::from(home)))
}

fn home_log_dir(home: PathBuf) -> PathBuf {
    home.join(".tokmeter").join("logs")
}

/// Log a cost event under the `tokmeter::cost` target.
///
/// # Example
///
/// ```ignore
/// log_cost_event!(model = "claude-sonnet-4.0", tokens = 3000, cost_usd = 0.033);
/// ```
#[macro_export]
macro_rules! log_cost_event {
    ($($field:tt)*) => {
        tracing::info!(
            target: "tokmeter::cost",
            $($field)*,
            "cost event"
        )
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_home_log_dir() {
        let dir = home_log_dir(PathBuf::from("/tmp/test-home"));
        assert_eq!(dir, PathBuf::from("/tmp/test-home/.tokmeter/logs"));
    }

    #[test]
    fn test_init_logging_rejects_file_as_dir() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let result = init_logging(Some(file.path().join("logs")), false);
        assert!(matches!(result, Err(CoreError::DirectoryCreation { .. })));
    }

    #[test]
    fn test_init_test_logging() {
        init_test_logging();
        init_test_logging();
    }
}
