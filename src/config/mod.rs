// src/config/mod.rs

//! Configuration loading and validation for flowgate.
//!
//! - [`model`] is the TOML-backed workflow definition model.
//! - [`engine`] holds engine-wide settings and drift model configuration.
//! - [`loader`] reads files from disk.
//! - [`validate`] activates definitions: dependency closure, duplicate ids,
//!   review settings and cycle detection.

pub mod engine;
pub mod loader;
pub mod model;
pub mod validate;

pub use engine::{DriftModelConfig, EngineConfig, EngineSection};
pub use loader::{load_and_validate, load_engine_config, load_from_path, parse_definition};
pub use model::{
    RawWorkflowDefinition, RetryPolicy, ReviewSettings, StepDefinition, TriggerDefinition,
    WorkflowDefinition, WorkflowSection,
};
pub use validate::validate_engine_config;
