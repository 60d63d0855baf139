//! Logger initialization.
//!
//! This module provides functions to initialize the logger with custom formatting.

use std::io::{self, Write};

use crate::config::LogFormat;
use crate::error_handling::InitializationError;
use colored::*;
use env_logger::fmt::Formatter;
use log::{Level, LevelFilter, Record};

/// Initializes the logger with the specified level and format.
///
/// Configures `env_logger` with custom formatting. Supports both plain text
/// (with colors and timestamps) and JSON formats for structured logging.
///
/// The logger reads from the `RUST_LOG` environment variable by default, but
/// the provided `level` parameter will override it. This allows developers to
/// use `RUST_LOG=debug` for quick debugging while still supporting explicit
/// CLI control via `--log-level`.
///
/// # Arguments
///
/// * `level` - Minimum log level to display (overrides `RUST_LOG` if set)
/// * `format` - Log format (Plain or Json)
///
/// # Returns
///
/// `Ok(())` if initialization succeeds, or an error if logger setup fails.
///
/// # Errors
///
/// Returns `InitializationError::LoggerError` if logger initialization fails.
///
/// # Examples
///
/// ```bash
/// # Use RUST_LOG for quick debugging (no CLI args needed)
/// RUST_LOG=debug registry_transport https://registry-1.docker.io/v2/
///
/// # Override with CLI args (takes precedence)
/// RUST_LOG=debug registry_transport https://registry-1.docker.io/v2/ --log-level info
///
/// # Per-module filtering via RUST_LOG
/// RUST_LOG=registry_transport=debug,reqwest=info registry_transport https://ghcr.io/v2/
/// ```
pub fn init_logger_with(level: LevelFilter, format: LogFormat) -> Result<(), InitializationError> {
    colored::control::set_override(true);

    // Read from RUST_LOG environment variable first, then override with CLI arg
    let mut builder = env_logger::Builder::from_default_env();

    // Override with CLI-provided level (takes precedence over RUST_LOG)
    builder.filter_level(level);
    builder.filter_module("reqwest", LevelFilter::Info);
    builder.filter_module("hyper", LevelFilter::Info);
    builder.filter_module("hyper_util", LevelFilter::Info);
    builder.filter_module("wiremock", LevelFilter::Warn);
    builder.filter_module("registry_transport", level);

    match format {
        LogFormat::Json => builder.format(format_json),
        LogFormat::Plain => builder.format(format_plain),
    };

    // Use try_init() instead of init() to avoid panicking if logger is already initialized
    // This is important for tests where logger may be initialized multiple times
    builder.try_init().map_err(InitializationError::from)?;

    Ok(())
}

fn format_json(buf: &mut Formatter, record: &Record) -> io::Result<()> {
    writeln!(
        buf,
        "{{\"ts\":{},\"level\":\"{}\",\"target\":\"{}\",\"msg\":{}}}",
        chrono::Utc::now().timestamp_millis(),
        record.level(),
        record.target(),
        serde_json::to_string(&record.args().to_string()).unwrap_or_else(|_| "\"\"".into())
    )
}

fn format_plain(buf: &mut Formatter, record: &Record) -> io::Result<()> {
    let level = record.level();
    let colored_level = match level {
        Level::Error => level.to_string().red(),
        Level::Warn => level.to_string().yellow(),
        Level::Info => level.to_string().green(),
        Level::Debug => level.to_string().blue(),
        Level::Trace => level.to_string().purple(),
    };
    writeln!(
        buf,
        "{} {} [{}] {}",
        chrono::Local::now().format("%H:%M:%S%.3f"),
        record.target().cyan(),
        colored_level,
        record.args()
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_logger_twice_fails_without_panic() {
        // Whichever call installs the global logger first, a later one must error
        let _ = init_logger_with(LevelFilter::Info, LogFormat::Plain);
        let result = init_logger_with(LevelFilter::Debug, LogFormat::Json);
        assert!(matches!(result, Err(InitializationError::LoggerError(_))));
    }
}
