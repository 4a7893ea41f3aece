//! Structured logging setup built on `tracing`.
//!
//! Records from crates using the `log` facade are bridged into `tracing`, so
//! one subscriber sees everything.

use std::path::PathBuf;
use tracing::Level;
use tracing_appender::{
    non_blocking::{NonBlocking, WorkerGuard},
    rolling::{RollingFileAppender, Rotation},
};
use tracing_log::LogTracer;
use tracing_subscriber::{
    EnvFilter,
    fmt::{self, format::FmtSpan},
    prelude::*,
};

use crate::config::Settings;

/// Log initialization options.
#[derive(Debug, Clone)]
pub struct LogOptions {
    /// Log level (default: INFO)
    pub level: Level,

    /// Whether to log to stderr (default: true)
    pub log_to_stderr: bool,

    /// Whether to log to a daily-rolling file (default: false)
    pub log_to_file: bool,

    /// Directory to store log files (default: "./logs")
    pub log_dir: PathBuf,

    /// Base filename for log files (default: "wg-manager")
    pub log_file_name: String,

    /// Whether to use JSON format for logs (default: false)
    pub json_format: bool,

    /// Whether to include file and line information (default: true)
    pub include_file_line: bool,

    /// Whether to log span open/close events (default: false)
    pub include_span_events: bool,
}

impl Default for LogOptions {
    fn default() -> Self {
        LogOptions {
            level: Level::INFO,
            log_to_stderr: true,
            log_to_file: false,
            log_dir: PathBuf::from("./logs"),
            log_file_name: "wg-manager".to_string(),
            json_format: false,
            include_file_line: true,
            include_span_events: false,
        }
    }
}

/// Parse a level name, falling back to INFO for anything unrecognised.
pub fn parse_level(level: &str) -> Level {
    match level.to_ascii_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    }
}

/// Initialize logging with the given options.
///
/// Returns a guard that must be kept alive for as long as file logging is
/// wanted; dropping it flushes and stops the background writer. Calling this
/// more than once per process leaves the first subscriber in place.
///
/// # Examples
///
/// ```
/// use wg_manager::logging::{init_logging, LogOptions};
/// use tracing::Level;
///
/// let options = LogOptions {
///     level: Level::DEBUG,
///     ..Default::default()
/// };
///
/// let _guard = init_logging(options);
/// ```
pub fn init_logging(options: LogOptions) -> Option<WorkerGuard> {
    // Bridge `log` crate records into `tracing`
    let _ = LogTracer::init();

    let filter = EnvFilter::from_default_env().add_directive(options.level.into());
    let span_events = if options.include_span_events {
        FmtSpan::NEW | FmtSpan::CLOSE
    } else {
        FmtSpan::NONE
    };

    let mut layers = Vec::new();
    let mut guard = None;

    if options.log_to_stderr {
        let stderr_layer = fmt::layer()
            .with_file(options.include_file_line)
            .with_line_number(options.include_file_line)
            .with_target(true)
            .with_span_events(span_events.clone())
            .with_writer(std::io::stderr);

        let stderr_layer = if options.json_format {
            stderr_layer.json().boxed()
        } else {
            stderr_layer.boxed()
        };

        layers.push(stderr_layer);
    }

    if options.log_to_file {
        let file_appender =
            RollingFileAppender::new(Rotation::DAILY, &options.log_dir, &options.log_file_name);

        let (non_blocking, worker_guard) = NonBlocking::new(file_appender);
        guard = Some(worker_guard);

        let file_layer = fmt::layer()
            .with_file(options.include_file_line)
            .with_line_number(options.include_file_line)
            .with_target(true)
            .with_ansi(false)
            .with_span_events(span_events)
            .with_writer(non_blocking);

        let file_layer = if options.json_format {
            file_layer.json().boxed()
        } else {
            file_layer.boxed()
        };

        layers.push(file_layer);
    }

    // Ignore if a global subscriber is already set in this process
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(layers)
        .try_init();

    guard
}

/// Initialize logging with default options.
pub fn init_default_logging() -> Option<WorkerGuard> {
    init_logging(LogOptions::default())
}

/// Translate [`Settings`] into [`LogOptions`].
pub fn options_from_settings(settings: &Settings) -> LogOptions {
    let defaults = LogOptions::default();
    LogOptions {
        level: parse_level(&settings.log_level),
        log_to_file: settings.logging.log_to_file,
        log_dir: settings.logging.log_dir.clone().unwrap_or(defaults.log_dir.clone()),
        json_format: settings.logging.json,
        ..defaults
    }
}

/// Initialize logging from [`Settings`].
///
/// # Examples
///
/// ```
/// use wg_manager::config::Settings;
/// use wg_manager::logging::init_logging_from_settings;
///
/// let settings = Settings::default();
/// let _guard = init_logging_from_settings(&settings);
/// ```
pub fn init_logging_from_settings(settings: &Settings) -> Option<WorkerGuard> {
    init_logging(options_from_settings(settings))
}
