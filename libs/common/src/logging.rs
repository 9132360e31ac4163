//! Logging bootstrap for perfmon tools
//!
//! Installs one global subscriber:
//! - console layer on stderr: `timestamp [LEVEL] message fields`
//! - optional JSON file layer, rolled daily through `tracing-appender`
//!
//! `RUST_LOG` takes precedence over [`LogConfig::level`].

use std::path::PathBuf;
use std::sync::OnceLock;

use serde::{Deserialize, Serialize};
use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    fmt::{
        self,
        format::Writer,
        FmtContext, FormatEvent, FormatFields,
    },
    layer::SubscriberExt,
    registry::LookupSpan,
    util::SubscriberInitExt,
    EnvFilter, Layer,
};

use crate::error::{Error, Result};
use crate::serde_defaults;

/// Custom format for log level with brackets: `[INFO]`, `[WARN]`, etc.
fn format_level(level: &Level) -> &'static str {
    match *level {
        Level::TRACE => "[TRACE]",
        Level::DEBUG => "[DEBUG]",
        Level::INFO => "[INFO]",
        Level::WARN => "[WARN]",
        Level::ERROR => "[ERROR]",
    }
}

/// Event formatter that outputs: `timestamp [LEVEL] message`
///
/// Example output: `2026-10-14T09:12:44.809112Z [WARN] Trailing bytes after catalog trailing=4`
struct BracketedLevelFormat;

impl<S, N> FormatEvent<S, N> for BracketedLevelFormat
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &tracing::Event<'_>,
    ) -> std::fmt::Result {
        let now = chrono::Utc::now();
        write!(writer, "{} ", now.format("%Y-%m-%dT%H:%M:%S%.6fZ"))?;

        let level = *event.metadata().level();
        if writer.has_ansi_escapes() {
            let color = match level {
                Level::TRACE => "\x1b[35m", // magenta
                Level::DEBUG => "\x1b[34m", // blue
                Level::INFO => "\x1b[32m",  // green
                Level::WARN => "\x1b[33m",  // yellow
                Level::ERROR => "\x1b[31m", // red
            };
            write!(writer, "{}{}\x1b[0m ", color, format_level(&level))?;
        } else {
            write!(writer, "{} ", format_level(&level))?;
        }

        ctx.field_format().format_fields(writer.by_ref(), event)?;

        writeln!(writer)
    }
}

// Keeps the file writer thread alive for the life of the process
static FILE_GUARD: OnceLock<WorkerGuard> = OnceLock::new();
static INITIALIZED: OnceLock<()> = OnceLock::new();

/// Logger configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogConfig {
    /// Service name, used as the log file prefix
    #[serde(default = "serde_defaults::service_name")]
    pub service_name: String,
    /// Filter directive used when `RUST_LOG` is unset (e.g. "info,perfmon_calc=debug")
    #[serde(default = "serde_defaults::log_level")]
    pub level: String,
    /// Colored console output
    #[serde(default = "serde_defaults::bool_true")]
    pub ansi: bool,
    /// Directory for JSON log files; console only when absent
    #[serde(default)]
    pub log_dir: Option<PathBuf>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            service_name: serde_defaults::service_name(),
            level: serde_defaults::log_level(),
            ansi: serde_defaults::bool_true(),
            log_dir: None,
        }
    }
}

impl LogConfig {
    /// Console-only configuration with the given default filter
    pub fn console(level: impl Into<String>) -> Self {
        Self {
            level: level.into(),
            ..Default::default()
        }
    }

    /// Log file name prefix inside `log_dir` (the date is appended on rotation)
    pub fn file_prefix(&self) -> String {
        format!("{}.log", self.service_name)
    }
}

/// Build the filter: `RUST_LOG` when set and valid, otherwise `config.level`
fn build_filter(config: &LogConfig) -> Result<EnvFilter> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }
    EnvFilter::try_new(&config.level)
        .map_err(|e| Error::Logging(format!("invalid log level '{}': {}", config.level, e)))
}

/// Install the global subscriber; later calls are no-ops
pub fn init(config: &LogConfig) -> Result<()> {
    if INITIALIZED.get().is_some() {
        return Ok(());
    }

    let filter = build_filter(config)?;

    let console_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(config.ansi)
        .event_format(BracketedLevelFormat)
        .boxed();

    let file_layer = match &config.log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)?;
            let appender = tracing_appender::rolling::daily(dir, config.file_prefix());
            let (non_blocking, guard) = tracing_appender::non_blocking(appender);
            let _ = FILE_GUARD.set(guard);
            Some(
                fmt::layer()
                    .json()
                    .with_writer(non_blocking)
                    .with_level(true)
                    .with_target(true)
                    .boxed(),
            )
        },
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| Error::Logging(e.to_string()))?;
    let _ = INITIALIZED.set(());

    tracing::debug!(
        service = %config.service_name,
        log_dir = ?config.log_dir,
        "Logging initialized"
    );
    Ok(())
}

/// Whether [`init`] has installed the subscriber
pub fn is_initialized() -> bool {
    INITIALIZED.get().is_some()
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;

    #[test]
    fn test_format_level() {
        assert_eq!(format_level(&Level::INFO), "[INFO]");
        assert_eq!(format_level(&Level::ERROR), "[ERROR]");
        assert_eq!(format_level(&Level::TRACE), "[TRACE]");
    }

    #[test]
    fn test_defaults_from_empty_document() {
        let config: LogConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, LogConfig::default());
        assert_eq!(config.level, "info");
        assert!(config.ansi);
        assert_eq!(config.file_prefix(), "perfmon-replay.log");
    }

    #[test]
    fn test_console_config() {
        let config = LogConfig::console("debug,perfmon_calc=trace");
        assert_eq!(config.level, "debug,perfmon_calc=trace");
        assert!(config.log_dir.is_none());
    }

    #[test]
    fn test_init_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let config = LogConfig {
            log_dir: Some(dir.path().join("logs")),
            ansi: false,
            ..Default::default()
        };
        init(&config).unwrap();
        assert!(is_initialized());
        assert!(dir.path().join("logs").is_dir());
        init(&config).unwrap();
        tracing::info!(test = "logging", "Second init kept the first subscriber");
    }
}
