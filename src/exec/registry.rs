// src/exec/registry.rs

//! Step runtime registry: one executable unit per step type.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;

use crate::config::WorkflowDefinition;
use crate::engine::{ExecutionId, StepId};
use crate::errors::{FlowgateError, Result};
use crate::types::{Params, StepType};

/// Everything a step body gets to see.
#[derive(Debug, Clone)]
pub struct StepInput {
    pub execution_id: ExecutionId,
    pub step_id: StepId,
    pub step_type: StepType,
    /// 1-based attempt number.
    pub attempt: u32,
    /// The step's own `inputs` from the definition.
    pub params: Params,
    /// Inputs the execution was submitted with.
    pub execution_inputs: Params,
    /// Outputs of the step's direct dependencies, keyed by step id.
    pub upstream: BTreeMap<StepId, Params>,
}

/// Executable unit behind a step type.
///
/// Bodies may be invoked more than once for the same step when the retry
/// policy allows it.
#[async_trait]
pub trait StepBody: Send + Sync {
    async fn run(&self, input: StepInput) -> anyhow::Result<Params>;
}

/// Adapter turning an async closure into a [`StepBody`].
pub struct FnStep<F>(pub F);

#[async_trait]
impl<F, Fut> StepBody for FnStep<F>
where
    F: Fn(StepInput) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<Params>> + Send + 'static,
{
    async fn run(&self, input: StepInput) -> anyhow::Result<Params> {
        (self.0)(input).await
    }
}

/// Maps each [`StepType`] to its [`StepBody`].
///
/// Built once at startup and shared read-only by every execution.
#[derive(Clone, Default)]
pub struct StepRegistry {
    bodies: HashMap<StepType, Arc<dyn StepBody>>,
}

impl fmt::Debug for StepRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StepRegistry")
            .field("registered", &self.registered_types())
            .finish()
    }
}

impl StepRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the body for a step type, replacing any previous one.
    ///
    /// `human_review` cannot be registered: those steps are completed by the
    /// review gate.
    pub fn register(&mut self, step_type: StepType, body: Arc<dyn StepBody>) -> Result<()> {
        if step_type.is_human_review() {
            return Err(FlowgateError::ConfigError(
                "human_review steps are completed by the review gate and take no step body"
                    .to_string(),
            ));
        }
        self.bodies.insert(step_type, body);
        Ok(())
    }

    /// Register an async closure as the body for a step type.
    pub fn register_fn<F, Fut>(&mut self, step_type: StepType, f: F) -> Result<()>
    where
        F: Fn(StepInput) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<Params>> + Send + 'static,
    {
        self.register(step_type, Arc::new(FnStep(f)))
    }

    pub fn get(&self, step_type: StepType) -> Option<Arc<dyn StepBody>> {
        self.bodies.get(&step_type).cloned()
    }

    pub fn registered_types(&self) -> Vec<StepType> {
        let mut types: Vec<StepType> = self.bodies.keys().copied().collect();
        types.sort();
        types
    }

    /// Fail if any non-review step of `def` has no registered body.
    pub fn ensure_covers(&self, def: &WorkflowDefinition) -> Result<()> {
        for step in def.steps() {
            if !step.step_type.is_human_review() && !self.bodies.contains_key(&step.step_type) {
                return Err(FlowgateError::MissingStepRuntime(step.step_type));
            }
        }
        Ok(())
    }
}
