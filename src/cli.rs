// src/cli.rs

//! CLI argument parsing using `clap`.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

use crate::types::ReviewDecision;

/// Command-line arguments for `flowgate`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "flowgate",
    version,
    about = "Run dependency-ordered workflows with retries, drift triggers and review gates.",
    long_about = None
)]
pub struct CliArgs {
    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `FLOWGATE_LOG` or a default level will be used.
    #[arg(long, global = true, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Parse + validate a workflow, print its steps and levels, run nothing.
    Check {
        /// Path to the workflow file (TOML).
        #[arg(long, value_name = "PATH")]
        workflow: PathBuf,
    },

    /// Run a workflow once with pass-through step bodies and print the final
    /// execution record as JSON.
    Run {
        /// Path to the workflow file (TOML).
        #[arg(long, value_name = "PATH")]
        workflow: PathBuf,

        /// Execution input as `key=value`. Values that parse as JSON are kept
        /// typed; anything else is a string. Repeatable.
        #[arg(long = "input", value_name = "KEY=VALUE", value_parser = parse_input)]
        inputs: Vec<(String, serde_json::Value)>,

        /// Decision submitted for every review step.
        #[arg(long, value_name = "DECISION", default_value = "approve", value_parser = parse_decision)]
        review_decision: ReviewDecision,

        /// Identity recorded as the deciding reviewer.
        #[arg(long, value_name = "NAME", default_value = "flowgate-cli")]
        reviewer: String,

        /// Optional engine config (TOML) for channel sizing.
        #[arg(long, value_name = "PATH")]
        engine_config: Option<PathBuf>,
    },
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

fn parse_input(s: &str) -> Result<(String, serde_json::Value), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got '{s}'"))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("empty key in '{s}'"));
    }
    let value = serde_json::from_str(value)
        .unwrap_or_else(|_| serde_json::Value::String(value.to_string()));
    Ok((key.to_string(), value))
}

fn parse_decision(s: &str) -> Result<ReviewDecision, String> {
    s.parse::<ReviewDecision>().map_err(|e| e.to_string())
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
