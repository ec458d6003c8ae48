//! # Logging Utilities
//!
//! Logging infrastructure for dwarfline using `tracing`.
//!
//! This module provides structured logging with support for:
//! - Pretty output for terminals and JSON output for log collectors
//! - Environment variable configuration
//! - An optional log file next to console output
//!
//! Console output goes to stderr so that it never mixes with resolved
//! locations printed on stdout.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use dwarfline_utils::{init_logging, LogConfig};
//!
//! // Reads RUST_LOG, DWARFLINE_LOG_FORMAT and DWARFLINE_LOG_FILE
//! let _guard = init_logging(&LogConfig::from_env()).expect("Failed to initialize logging");
//!
//! tracing::info!("Application started");
//! ```
//!
//! ## Environment Variables
//!
//! - `RUST_LOG`: Log filter (e.g., `RUST_LOG=debug`, `RUST_LOG=dwarfline_core=trace`)
//! - `DWARFLINE_LOG_FORMAT`: Output format (`json` or `pretty`, default: `pretty`)
//! - `DWARFLINE_LOG_FILE`: Optional log file. If it names a directory, a dated
//!   file `YYYY-MM-DD-dwarfline.log` is created inside it.

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::{env, io};

use chrono::Utc;
use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::time::ChronoUtc;
use tracing_subscriber::fmt::{self};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry};

/// Environment variable selecting the output format.
pub const LOG_FORMAT_ENV: &str = "DWARFLINE_LOG_FORMAT";
/// Environment variable naming the log file.
pub const LOG_FILE_ENV: &str = "DWARFLINE_LOG_FILE";

/// Log output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat
{
    /// Pretty-printed, human-readable format (default)
    #[default]
    Pretty,
    /// JSON format, one object per event
    Json,
}

impl FromStr for LogFormat
{
    type Err = LoggingError;

    fn from_str(s: &str) -> Result<Self, Self::Err>
    {
        match s.to_lowercase().as_str() {
            "pretty" | "text" | "dev" => Ok(LogFormat::Pretty),
            "json" | "prod" => Ok(LogFormat::Json),
            _ => Err(LoggingError::InvalidFormat(format!("{s}. Use 'pretty' or 'json'"))),
        }
    }
}

/// Log level
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel
{
    /// Error level
    Error,
    /// Warning level (default for the CLI)
    Warn,
    /// Info level
    Info,
    /// Debug level: unit and line program summaries
    Debug,
    /// Trace level: every opcode
    Trace,
}

impl From<LogLevel> for Level
{
    fn from(level: LogLevel) -> Self
    {
        match level {
            LogLevel::Error => Level::ERROR,
            LogLevel::Warn => Level::WARN,
            LogLevel::Info => Level::INFO,
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Trace => Level::TRACE,
        }
    }
}

impl FromStr for LogLevel
{
    type Err = LoggingError;

    fn from_str(s: &str) -> Result<Self, Self::Err>
    {
        match s.to_lowercase().as_str() {
            "error" | "err" => Ok(LogLevel::Error),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "info" => Ok(LogLevel::Info),
            "debug" | "dbg" => Ok(LogLevel::Debug),
            "trace" => Ok(LogLevel::Trace),
            _ => Err(LoggingError::InvalidLevel(format!(
                "{s}. Use 'error', 'warn', 'info', 'debug', or 'trace'"
            ))),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogConfig
{
    /// Explicit level. Takes precedence over `RUST_LOG` when set.
    pub level: Option<LogLevel>,
    pub format: LogFormat,
    /// Optional log file, written in addition to the console.
    pub file: Option<PathBuf>,
}

impl LogConfig
{
    /// Configuration from `DWARFLINE_LOG_FORMAT` and `DWARFLINE_LOG_FILE`.
    ///
    /// An unparsable format falls back to pretty output.
    pub fn from_env() -> Self
    {
        let format = env::var(LOG_FORMAT_ENV)
            .ok()
            .and_then(|s| LogFormat::from_str(&s).ok())
            .unwrap_or_default();
        let file = env::var_os(LOG_FILE_ENV).filter(|path| !path.is_empty()).map(PathBuf::from);

        Self {
            level: None,
            format,
            file,
        }
    }

    #[must_use]
    pub fn with_level(mut self, level: Option<LogLevel>) -> Self
    {
        if level.is_some() {
            self.level = level;
        }
        self
    }

    #[must_use]
    pub fn with_format(mut self, format: Option<LogFormat>) -> Self
    {
        if let Some(format) = format {
            self.format = format;
        }
        self
    }

    /// Build the event filter.
    ///
    /// Priority:
    /// 1. An explicit level (from `--log-level`)
    /// 2. `RUST_LOG`, which may carry per-module directives
    /// 3. `warn`
    fn filter(&self) -> EnvFilter
    {
        if let Some(level) = self.level {
            return EnvFilter::new(Level::from(level).to_string());
        }
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(Level::WARN.to_string()))
    }
}

/// Keeps the background log-file writer alive.
///
/// Buffered file output is flushed when this is dropped, so hold it until the
/// program exits.
#[must_use = "dropping the guard stops file logging"]
#[derive(Debug)]
pub struct LoggingGuard
{
    file: Option<PathBuf>,
    _worker: Option<WorkerGuard>,
}

impl LoggingGuard
{
    /// Path of the log file, if file logging is enabled.
    pub fn file(&self) -> Option<&Path>
    {
        self.file.as_deref()
    }
}

/// Resolve the log file path. A directory gets a dated file inside it.
pub fn resolve_log_file(path: &Path) -> PathBuf
{
    if path.is_dir() {
        let today = Utc::now().format("%Y-%m-%d");
        path.join(format!("{today}-dwarfline.log"))
    } else {
        path.to_path_buf()
    }
}

/// Initialize logging
///
/// ## Example
///
/// ```rust,no_run
/// use dwarfline_utils::{init_logging, LogConfig, LogFormat, LogLevel};
///
/// let config = LogConfig {
///     level: Some(LogLevel::Debug),
///     format: LogFormat::Json,
///     file: None,
/// };
/// let _guard = init_logging(&config).expect("Failed to initialize logging");
/// ```
///
/// ## Errors
///
/// Returns an error if:
/// - Logging is already initialized
/// - The log file's directory cannot be created
pub fn init_logging(config: &LogConfig) -> Result<LoggingGuard, LoggingError>
{
    let filter = config.filter();

    let (file_layer, worker, file) = match &config.file {
        Some(path) => {
            let path = resolve_log_file(path);
            let directory = path.parent().filter(|dir| !dir.as_os_str().is_empty()).unwrap_or(Path::new("."));
            std::fs::create_dir_all(directory)?;
            let file_name = path
                .file_name()
                .ok_or_else(|| LoggingError::InitializationFailed(format!("{} is not a file path", path.display())))?;

            // The file name already carries the date when one was generated
            let appender = tracing_appender::rolling::never(directory, file_name);
            let (non_blocking, worker) = tracing_appender::non_blocking(appender);
            let layer = match config.format {
                LogFormat::Pretty => fmt::layer()
                    .with_writer(non_blocking)
                    .with_target(true)
                    .with_thread_ids(true)
                    .with_file(true)
                    .with_line_number(true)
                    .with_timer(ChronoUtc::rfc_3339())
                    .with_ansi(false) // No ANSI in files
                    .with_filter(filter.clone())
                    .boxed(),
                LogFormat::Json => fmt::layer()
                    .json()
                    .with_writer(non_blocking)
                    .with_target(true)
                    .with_thread_ids(true)
                    .with_file(true)
                    .with_line_number(true)
                    .with_timer(ChronoUtc::rfc_3339())
                    .with_current_span(true)
                    .with_span_list(true)
                    .with_filter(filter.clone())
                    .boxed(),
            };
            (Some(layer), Some(worker), Some(path))
        }
        None => (None, None, None),
    };

    let console_layer = match config.format {
        LogFormat::Pretty => fmt::layer()
            .with_target(true)
            .with_timer(ChronoUtc::rfc_3339())
            .with_ansi(true)
            .with_writer(io::stderr)
            .with_filter(filter)
            .boxed(),
        LogFormat::Json => fmt::layer()
            .json()
            .with_target(true)
            .with_timer(ChronoUtc::rfc_3339())
            .with_current_span(true)
            .with_span_list(true)
            .with_writer(io::stderr)
            .with_filter(filter)
            .boxed(),
    };

    Registry::default()
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .map_err(|err| LoggingError::InitializationFailed(err.to_string()))?;

    Ok(LoggingGuard { file, _worker: worker })
}

/// Logging initialization error
#[derive(Debug, thiserror::Error)]
pub enum LoggingError
{
    /// Invalid log format
    #[error("Invalid log format: {0}")]
    InvalidFormat(String),

    /// Invalid log level
    #[error("Invalid log level: {0}")]
    InvalidLevel(String),

    /// Failed to initialize logging
    #[error("Failed to initialize logging: {0}")]
    InitializationFailed(String),

    /// File logging error
    #[error("File logging error: {0}")]
    FileError(#[from] io::Error),
}
