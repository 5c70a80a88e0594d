// src/logging.rs

//! Logging setup for `flowgate` using `tracing` + `tracing-subscriber`.
//!
//! Priority for determining the log level:
//! 1. `--log-level` CLI flag (if provided)
//! 2. `FLOWGATE_LOG` environment variable (e.g. "info", "debug")
//! 3. default to `info`
//!
//! Logs are sent to STDERR so that stdout carries only the execution record.

use anyhow::Result;
use tracing_subscriber::fmt;

use crate::cli::LogLevel;

/// Environment variable consulted when no `--log-level` is given.
pub const LOG_ENV_VAR: &str = "FLOWGATE_LOG";

/// Initialise the global logging subscriber. Call once at startup.
pub fn init_logging(cli_level: Option<LogLevel>) -> Result<()> {
    let level = resolve_level(cli_level, std::env::var(LOG_ENV_VAR).ok().as_deref());

    fmt()
        .with_max_level(level)
        .with_target(true)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to initialise logging: {e}"))?;

    Ok(())
}

/// CLI flag first, then the environment value, else `info`.
pub fn resolve_level(cli_level: Option<LogLevel>, env_value: Option<&str>) -> tracing::Level {
    match cli_level {
        Some(lvl) => level_from_log_level(lvl),
        None => env_value
            .and_then(parse_level_str)
            .unwrap_or(tracing::Level::INFO),
    }
}

fn level_from_log_level(lvl: LogLevel) -> tracing::Level {
    match lvl {
        LogLevel::Error => tracing::Level::ERROR,
        LogLevel::Warn => tracing::Level::WARN,
        LogLevel::Info => tracing::Level::INFO,
        LogLevel::Debug => tracing::Level::DEBUG,
        LogLevel::Trace => tracing::Level::TRACE,
    }
}

fn parse_level_str(s: &str) -> Option<tracing::Level> {
    match s.trim().to_lowercase().as_str() {
        "error" => Some(tracing::Level::ERROR),
        "warn" | "warning" => Some(tracing::Level::WARN),
        "info" => Some(tracing::Level::INFO),
        "debug" => Some(tracing::Level::DEBUG),
        "trace" => Some(tracing::Level::TRACE),
        _ => None,
    }
}
