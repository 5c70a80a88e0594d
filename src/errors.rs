// src/errors.rs

//! Crate-wide error types and aliases.

use thiserror::Error;

use crate::engine::{ExecutionId, StepId};
use crate::review::ReviewId;
use crate::types::StepType;

/// Problems with the shape of a workflow's dependency graph.
///
/// These are raised when a definition is activated and never at run time.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GraphError {
    #[error("cycle detected in workflow graph involving step '{0}'")]
    Cycle(StepId),

    #[error("step '{step}' has unknown dependency '{dependency}' in `depends_on`")]
    UnknownDependency { step: StepId, dependency: StepId },

    #[error("step '{0}' cannot depend on itself in `depends_on`")]
    SelfDependency(StepId),

    #[error("duplicate step id '{0}'")]
    DuplicateStep(StepId),
}

/// Failure of a single step attempt.
///
/// Caught at the executor boundary and turned into step state; it never
/// propagates into the orchestration loop.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StepExecutionError {
    #[error("{0}")]
    Failed(String),

    #[error("step body panicked: {0}")]
    Panicked(String),

    #[error("no runtime registered for step type '{0}'")]
    NoRuntime(StepType),
}

#[derive(Error, Debug)]
pub enum FlowgateError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("Invalid workflow graph: {0}")]
    Graph(#[from] GraphError),

    #[error("Workflow definition not found: {0}")]
    DefinitionNotFound(String),

    #[error("Execution not found: {0}")]
    ExecutionNotFound(ExecutionId),

    #[error("Execution {0} is still running")]
    ExecutionStillRunning(ExecutionId),

    #[error("Retraining already active for model '{model_id}' (execution {active:?})")]
    RetrainingActive {
        model_id: String,
        active: Option<ExecutionId>,
    },

    #[error("Review request not found: {0}")]
    ReviewNotFound(ReviewId),

    #[error("Review request {0} has already been resolved")]
    ReviewAlreadyResolved(ReviewId),

    #[error("Drift signal not found: {0}")]
    SignalNotFound(uuid::Uuid),

    #[error("No drift configuration for model '{0}'")]
    UnknownModel(String),

    #[error("Illegal {entity} transition from {from} to {to}")]
    IllegalTransition {
        entity: &'static str,
        from: String,
        to: String,
    },

    #[error("No step runtime registered for step type '{0}'")]
    MissingStepRuntime(StepType),

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, FlowgateError>;
