//! # Logging Utilities
//!
//! Logging infrastructure for memscope using `tracing`.
//!
//! Console output goes to stderr so that values printed on stdout (by
//! `memscope read`, for instance) can be piped without log noise.
//! Commands that redraw the terminal log to a file instead, see
//! [`init_logging_to_file`].
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use memscope_utils::init_logging;
//!
//! // Keep the guard alive until the program exits
//! let _guard = init_logging().expect("Failed to initialize logging");
//! tracing::info!("Application started");
//! ```
//!
//! ## Environment Variables
//!
//! - `RUST_LOG`: level filter (e.g. `RUST_LOG=debug`, `RUST_LOG=memscope_core=trace`)
//! - `MEMSCOPE_LOG_FORMAT`: `pretty` (default) or `json`
//! - `MEMSCOPE_LOG_FILE`: also write logs to this file (rotated daily)

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::{env, fmt as stdfmt, io};

use chrono::{Local, NaiveDate};
use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::time::ChronoUtc;
use tracing_subscriber::fmt::{self, MakeWriter};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry};

/// Environment variable selecting the output format
pub const LOG_FORMAT_ENV: &str = "MEMSCOPE_LOG_FORMAT";
/// Environment variable naming an additional log file
pub const LOG_FILE_ENV: &str = "MEMSCOPE_LOG_FILE";

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat
{
    /// Human-readable, colored on terminals
    #[default]
    Pretty,
    /// One JSON object per line
    Json,
}

impl FromStr for LogFormat
{
    type Err = LoggingError;

    fn from_str(s: &str) -> Result<Self, Self::Err>
    {
        match s.to_lowercase().as_str() {
            "pretty" | "dev" | "development" => Ok(LogFormat::Pretty),
            "json" | "prod" | "production" => Ok(LogFormat::Json),
            _ => Err(LoggingError::InvalidFormat(s.to_string())),
        }
    }
}

/// Log level
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel
{
    /// Error level
    Error,
    /// Warning level
    Warn,
    /// Info level (default)
    Info,
    /// Debug level
    Debug,
    /// Trace level (most verbose)
    Trace,
}

impl LogLevel
{
    /// Lowercase name, as accepted by `RUST_LOG`
    #[must_use]
    pub fn as_str(self) -> &'static str
    {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

impl stdfmt::Display for LogLevel
{
    fn fmt(&self, f: &mut stdfmt::Formatter<'_>) -> stdfmt::Result
    {
        f.write_str(self.as_str())
    }
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
            _ => Err(LoggingError::InvalidLevel(s.to_string())),
        }
    }
}

/// Keeps file logging alive
///
/// Log lines are written to files by a background worker; dropping this
/// guard flushes and stops it. Hold it for the life of the program.
#[must_use = "dropping the guard stops file logging"]
#[derive(Debug, Default)]
pub struct LoggingGuard
{
    _file: Option<WorkerGuard>,
}

/// Initialize logging from the environment
///
/// Reads `RUST_LOG`, `MEMSCOPE_LOG_FORMAT` and `MEMSCOPE_LOG_FILE`.
///
/// ## Errors
///
/// Returns an error if:
/// - `MEMSCOPE_LOG_FORMAT` is not a known format
/// - A global subscriber is already installed
pub fn init_logging() -> Result<LoggingGuard, LoggingError>
{
    let format = match env::var(LOG_FORMAT_ENV) {
        Ok(value) => value.parse()?,
        Err(_) => LogFormat::default(),
    };
    install(format, None, env::var_os(LOG_FILE_ENV).map(PathBuf::from))
}

/// Initialize logging with an explicit level and format
///
/// The level replaces whatever `RUST_LOG` says. `MEMSCOPE_LOG_FILE` is
/// still honored.
///
/// ## Example
///
/// ```rust,no_run
/// use memscope_utils::{LogFormat, LogLevel, init_logging_with_level};
///
/// let _guard = init_logging_with_level(LogLevel::Debug, LogFormat::Pretty)
///     .expect("Failed to initialize logging");
/// ```
///
/// ## Errors
///
/// Returns an error if a global subscriber is already installed.
pub fn init_logging_with_level(level: LogLevel, format: LogFormat) -> Result<LoggingGuard, LoggingError>
{
    install(format, Some(level.into()), env::var_os(LOG_FILE_ENV).map(PathBuf::from))
}

/// Initialize file-only logging, for commands that own the terminal
///
/// Logs go to `MEMSCOPE_LOG_FILE` if set, otherwise to
/// `~/.memscope/YYYY-MM-DD-memscope.log` (or the system temp directory when
/// there is no home). With `level` unset, `RUST_LOG` or `info` applies.
///
/// Returns the path being written and the guard.
///
/// ## Errors
///
/// Returns an error if the log directory cannot be created or a global
/// subscriber is already installed.
pub fn init_logging_to_file(level: Option<LogLevel>, format: LogFormat) -> Result<(PathBuf, LoggingGuard), LoggingError>
{
    let path = match env::var_os(LOG_FILE_ENV) {
        Some(path) => PathBuf::from(path),
        None => default_log_path(env::var_os("HOME").map(PathBuf::from).as_deref(), Local::now().date_naive()),
    };
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir)?;
    }

    let (writer, guard) = file_writer(&path, false);
    let layers = vec![layer(format, writer, false)];
    Registry::default()
        .with(layers)
        .with(filter(level.map(Into::into)))
        .try_init()
        .map_err(|e| LoggingError::InitializationFailed(e.to_string()))?;

    Ok((path, LoggingGuard { _file: Some(guard) }))
}

/// Default location for file-only logs
fn default_log_path(home: Option<&Path>, today: NaiveDate) -> PathBuf
{
    let name = format!("{}-memscope.log", today.format("%Y-%m-%d"));
    match home {
        Some(home) => home.join(".memscope").join(name),
        None => env::temp_dir().join(name),
    }
}

fn install(format: LogFormat, level: Option<Level>, log_file: Option<PathBuf>) -> Result<LoggingGuard, LoggingError>
{
    let mut layers = vec![layer(format, io::stderr, true)];
    let file_guard = log_file.map(|path| {
        let (writer, guard) = file_writer(&path, true);
        layers.push(layer(format, writer, false));
        guard
    });

    Registry::default()
        .with(layers)
        .with(filter(level))
        .try_init()
        .map_err(|e| LoggingError::InitializationFailed(e.to_string()))?;
    Ok(LoggingGuard { _file: file_guard })
}

/// Explicit level, else `RUST_LOG`, else `info`
fn filter(level: Option<Level>) -> EnvFilter
{
    match level {
        Some(level) => EnvFilter::new(level.to_string()),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(Level::INFO.to_string())),
    }
}

fn file_writer(path: &Path, rotate: bool) -> (tracing_appender::non_blocking::NonBlocking, WorkerGuard)
{
    let dir = path.parent().filter(|d| !d.as_os_str().is_empty()).unwrap_or(Path::new("."));
    let name = path.file_name().unwrap_or_default();
    // Dated default paths already rotate by name.
    let appender = if rotate {
        tracing_appender::rolling::daily(dir, name)
    } else {
        tracing_appender::rolling::never(dir, name)
    };
    tracing_appender::non_blocking(appender)
}

fn layer<W>(format: LogFormat, writer: W, ansi: bool) -> BoxedLayer
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    let base = fmt::layer()
        .with_writer(writer)
        .with_target(true)
        .with_thread_names(true)
        .with_file(true)
        .with_line_number(true)
        .with_timer(ChronoUtc::rfc_3339());

    match format {
        LogFormat::Pretty => base.with_ansi(ansi).boxed(),
        LogFormat::Json => base.json().with_current_span(true).with_span_list(true).boxed(),
    }
}

/// Logging initialization error
#[derive(Debug, thiserror::Error)]
pub enum LoggingError
{
    /// Invalid log format
    #[error("Unknown log format: {0}. Use 'pretty' or 'json'")]
    InvalidFormat(String),

    /// Invalid log level
    #[error("Unknown log level: {0}. Use 'error', 'warn', 'info', 'debug', or 'trace'")]
    InvalidLevel(String),

    /// A subscriber could not be installed
    #[error("Failed to initialize logging: {0}")]
    InitializationFailed(String),

    /// File logging error
    #[error("File logging error: {0}")]
    FileError(#[from] io::Error),
}

#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn test_log_format_from_str()
    {
        assert_eq!(LogFormat::from_str("pretty").unwrap(), LogFormat::Pretty);
        assert_eq!(LogFormat::from_str("JSON").unwrap(), LogFormat::Json);
        assert_eq!(LogFormat::from_str("dev").unwrap(), LogFormat::Pretty);
        assert_eq!(LogFormat::from_str("prod").unwrap(), LogFormat::Json);
        assert!(matches!(
            LogFormat::from_str("xml"),
            Err(LoggingError::InvalidFormat(s)) if s == "xml"
        ));
    }

    #[test]
    fn test_log_level_from_str()
    {
        assert_eq!(LogLevel::from_str("error").unwrap(), LogLevel::Error);
        assert_eq!(LogLevel::from_str("warning").unwrap(), LogLevel::Warn);
        assert_eq!(LogLevel::from_str("info").unwrap(), LogLevel::Info);
        assert_eq!(LogLevel::from_str("dbg").unwrap(), LogLevel::Debug);
        assert_eq!(LogLevel::from_str("trace").unwrap(), LogLevel::Trace);
        assert!(LogLevel::from_str("loud").is_err());
    }

    #[test]
    fn test_log_level_round_trips_through_display()
    {
        for level in [LogLevel::Error, LogLevel::Warn, LogLevel::Info, LogLevel::Debug, LogLevel::Trace] {
            assert_eq!(level.to_string().parse::<LogLevel>().unwrap(), level);
            assert_eq!(Level::from(level).to_string().to_lowercase(), level.as_str());
        }
    }

    #[test]
    fn test_default_log_path()
    {
        let day = NaiveDate::from_ymd_opt(2025, 3, 9).unwrap();
        assert_eq!(
            default_log_path(Some(Path::new("/home/alice")), day),
            PathBuf::from("/home/alice/.memscope/2025-03-09-memscope.log")
        );
        assert_eq!(
            default_log_path(None, day),
            env::temp_dir().join("2025-03-09-memscope.log")
        );
    }
}
