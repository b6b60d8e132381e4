//! Tracing setup
//!
//! One rolling ledger log under `log_dir`, written off the request path by
//! a non-blocking worker. Text mode also echoes to stdout; JSON mode writes
//! the file only. Bad settings are reported instead of silently falling
//! back, so a typo in `rotation` or `log_level` fails startup.

use thiserror::Error;
use tracing::level_filters::LevelFilter;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{InitError, RollingFileAppender, Rotation};
use tracing_subscriber::util::TryInitError;
use tracing_subscriber::{EnvFilter, filter::ParseError, fmt, prelude::*};

use crate::config::AppConfig;

#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("Unknown log rotation '{0}', expected minutely, hourly, daily or never")]
    UnknownRotation(String),

    #[error("Unknown log level '{0}'")]
    UnknownLevel(String),

    #[error("Invalid log filter '{directive}': {source}")]
    Filter {
        directive: String,
        #[source]
        source: ParseError,
    },

    #[error("Failed to open log directory {dir}: {source}")]
    Appender {
        dir: String,
        #[source]
        source: InitError,
    },

    #[error("Tracing subscriber already installed: {0}")]
    Install(#[from] TryInitError),
}

/// Map the `rotation` setting onto an appender schedule
pub fn parse_rotation(name: &str) -> Result<Rotation, LoggingError> {
    match name {
        "minutely" => Ok(Rotation::MINUTELY),
        "hourly" => Ok(Rotation::HOURLY),
        "daily" => Ok(Rotation::DAILY),
        "never" => Ok(Rotation::NEVER),
        other => Err(LoggingError::UnknownRotation(other.to_string())),
    }
}

/// Default directive for a configured level
///
/// sqlx logs every statement at info, so it is capped at warn.
pub fn filter_directive(level: &str) -> String {
    format!("{},sqlx=warn", level)
}

/// `rust_log` (the `RUST_LOG` value) wins over the configured level
fn build_filter(level: &str, rust_log: Option<&str>) -> Result<EnvFilter, LoggingError> {
    level
        .parse::<LevelFilter>()
        .map_err(|_| LoggingError::UnknownLevel(level.to_string()))?;

    let directive = match rust_log.filter(|v| !v.trim().is_empty()) {
        Some(v) => v.to_string(),
        None => filter_directive(level),
    };
    EnvFilter::try_new(&directive).map_err(|source| LoggingError::Filter { directive, source })
}

fn file_appender(config: &AppConfig) -> Result<RollingFileAppender, LoggingError> {
    let mut builder = RollingFileAppender::builder()
        .rotation(parse_rotation(&config.rotation)?)
        .filename_prefix(&config.log_file);
    if let Some(keep) = config.max_log_files {
        builder = builder.max_log_files(keep);
    }
    builder
        .build(&config.log_dir)
        .map_err(|source| LoggingError::Appender {
            dir: config.log_dir.clone(),
            source,
        })
}

/// Install the global subscriber; keep the guard alive for the process
pub fn init_logging(config: &AppConfig) -> Result<WorkerGuard, LoggingError> {
    let rust_log = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    let filter = build_filter(&config.log_level, rust_log.as_deref())?;
    let (writer, guard) = tracing_appender::non_blocking(file_appender(config)?);

    let registry = tracing_subscriber::registry().with(filter);
    if config.use_json {
        let file_layer = fmt::layer()
            .json()
            .with_current_span(false)
            .with_writer(writer)
            .with_ansi(false);
        registry.with(file_layer).try_init()?;
    } else {
        let file_layer = fmt::layer()
            .with_target(false)
            .with_writer(writer)
            .with_ansi(false);
        let stdout_layer = fmt::layer().with_target(false);
        registry.with(file_layer).with(stdout_layer).try_init()?;
    }

    Ok(guard)
}
