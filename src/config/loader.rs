// src/config/loader.rs

use std::fs;
use std::path::Path;

use crate::config::engine::EngineConfig;
use crate::config::model::{RawWorkflowDefinition, WorkflowDefinition};
use crate::config::validate::validate_engine_config;
use crate::errors::Result;

/// Load a workflow file from a given path and return the raw definition.
///
/// This only performs TOML deserialization; it does **not** check the
/// dependency graph. Use [`load_and_validate`] for that.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawWorkflowDefinition> {
    let contents = fs::read_to_string(path.as_ref())?;
    let raw: RawWorkflowDefinition = toml::from_str(&contents)?;
    Ok(raw)
}

/// Load a workflow file and activate it.
///
/// Activation rejects dangling or self dependencies, duplicate step ids and
/// dependency cycles, so a cyclic workflow can never reach the scheduler.
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<WorkflowDefinition> {
    let raw = load_from_path(path)?;
    WorkflowDefinition::try_from(raw)
}

/// Parse and activate a workflow held in memory.
pub fn parse_definition(contents: &str) -> Result<WorkflowDefinition> {
    let raw: RawWorkflowDefinition = toml::from_str(contents)?;
    WorkflowDefinition::try_from(raw)
}

/// Load and validate the engine config.
pub fn load_engine_config(path: impl AsRef<Path>) -> Result<EngineConfig> {
    let contents = fs::read_to_string(path.as_ref())?;
    let cfg: EngineConfig = toml::from_str(&contents)?;
    validate_engine_config(&cfg)?;
    Ok(cfg)
}
