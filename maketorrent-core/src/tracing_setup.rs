//! Tracing setup for maketorrent
//!
//! Console logs follow the user-selected level. A log file, when requested,
//! captures everything at trace level for debugging a failed run.

use std::fs::{File, create_dir_all};
use std::path::Path;
use std::sync::Mutex;

use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, fmt};

/// Initialize tracing with console output and an optional full-detail log file
///
/// # Arguments
/// * `console_level` - Log level for console output, overridden by `RUST_LOG`
/// * `log_file` - File receiving trace-level logs, truncated on every run
///
/// # Errors
///
/// - `std::io::Error` - If the log file or its directory cannot be created
pub fn init_tracing(console_level: Level, log_file: Option<&Path>) -> Result<(), std::io::Error> {
    let console_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(console_level.to_string()));

    // Console layer goes to stderr so piped output stays clean
    let console_layer = fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_filter(console_filter);

    let file_layer = match log_file {
        Some(path) => {
            if let Some(parent) = path.parent()
                && !parent.as_os_str().is_empty()
            {
                create_dir_all(parent)?;
            }
            let file = File::create(path)?;

            Some(
                fmt::layer()
                    .with_target(true)
                    .with_thread_ids(true)
                    .with_thread_names(true)
                    .with_file(true)
                    .with_line_number(true)
                    .with_ansi(false) // No color codes in files
                    .with_writer(Mutex::new(file))
                    .with_filter(EnvFilter::new("trace")),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(console_layer)
        .with(file_layer)
        .init();

    tracing::debug!(
        "Tracing initialized: console={}, log_file={:?}",
        console_level,
        log_file
    );

    Ok(())
}

/// Console log levels reachable from the `--verbose` and `--debug` switches
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CliLogLevel {
    /// Warnings and errors only
    Warn,
    /// Phase summaries and per-file progress
    Info,
    /// Per-piece details
    Debug,
}

impl CliLogLevel {
    /// Picks the console level from the `--verbose` and `--debug` switches.
    pub fn from_flags(verbose: bool, debug: bool) -> Self {
        match (verbose, debug) {
            (_, true) => CliLogLevel::Debug,
            (true, false) => CliLogLevel::Info,
            (false, false) => CliLogLevel::Warn,
        }
    }

    /// Converts CLI log level to tracing Level enum.
    ///
    /// # Examples
    /// ```
    /// use maketorrent_core::tracing_setup::CliLogLevel;
    ///
    /// let level = CliLogLevel::Info.as_tracing_level();
    /// assert_eq!(level, tracing::Level::INFO);
    /// ```
    pub fn as_tracing_level(self) -> Level {
        match self {
            CliLogLevel::Warn => Level::WARN,
            CliLogLevel::Info => Level::INFO,
            CliLogLevel::Debug => Level::DEBUG,
        }
    }
}
