//! Bridge from the `log` facade to a host supplied [`Logger`].
//!
//! Binaries usually install their own `log` implementation (the CLI routes
//! records through `tracing-subscriber`). Embedders without one can hand a
//! [`Logger`] to [`set_logger`] instead.

use std::sync::{Arc, OnceLock};

/// Receives the crate's log records.
///
/// # Examples
///
/// ```rust
/// use vaultkit_core::logger::{LogLevel, Logger};
///
/// struct StderrLogger;
///
/// impl Logger for StderrLogger {
///     fn log(&self, level: LogLevel, message: String) {
///         eprintln!("[{level:?}] {message}");
///     }
/// }
/// ```
pub trait Logger: Sync + Send {
    /// Logs `message` at `level`.
    fn log(&self, level: LogLevel, message: String);
}

/// Severity of a record, from most to least verbose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    /// Very detailed tracing.
    Trace,
    /// Debugging information, e.g. every payload pulled from the content network.
    Debug,
    /// Progress of the application.
    Info,
    /// Recoverable problems such as skipped log entries or missing metadata.
    Warn,
    /// Failures.
    Error,
}

impl From<log::Level> for LogLevel {
    fn from(level: log::Level) -> Self {
        match level {
            log::Level::Error => Self::Error,
            log::Level::Warn => Self::Warn,
            log::Level::Info => Self::Info,
            log::Level::Debug => Self::Debug,
            log::Level::Trace => Self::Trace,
        }
    }
}

impl From<LogLevel> for log::LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => Self::Trace,
            LogLevel::Debug => Self::Debug,
            LogLevel::Info => Self::Info,
            LogLevel::Warn => Self::Warn,
            LogLevel::Error => Self::Error,
        }
    }
}

static HOST_LOGGER: OnceLock<Arc<dyn Logger>> = OnceLock::new();

struct HostBridge;

impl log::Log for HostBridge {
    fn enabled(&self, metadata: &log::Metadata) -> bool {
        // debug and trace from dependencies (reqwest, hyper, ...) are dropped
        metadata.level() <= log::Level::Info || metadata.target().starts_with("vaultkit")
    }

    fn log(&self, record: &log::Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        match HOST_LOGGER.get() {
            Some(logger) => logger.log(record.level().into(), record.args().to_string()),
            None => eprintln!("[{}] {}", record.level(), record.args()),
        }
    }

    fn flush(&self) {}
}

/// Installs `logger` as the receiver of every record.
///
/// Only the first call installs a logger; later calls are ignored.
///
/// # Errors
///
/// Returns a `log::SetLoggerError` if another `log` implementation was
/// installed first.
pub fn set_logger(logger: Arc<dyn Logger>) -> Result<(), log::SetLoggerError> {
    set_logger_with_level(logger, LogLevel::Trace)
}

/// Like [`set_logger`], dropping records below `min_level`.
///
/// # Errors
///
/// See [`set_logger`].
pub fn set_logger_with_level(
    logger: Arc<dyn Logger>,
    min_level: LogLevel,
) -> Result<(), log::SetLoggerError> {
    if HOST_LOGGER.set(logger).is_err() {
        log::debug!("logger already set");
        return Ok(());
    }
    static BRIDGE: HostBridge = HostBridge;
    log::set_logger(&BRIDGE)?;
    log::set_max_level(min_level.into());
    Ok(())
}
