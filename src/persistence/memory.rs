// src/persistence/memory.rs

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use tracing::debug;

use crate::config::WorkflowDefinition;
use crate::engine::ExecutionId;
use crate::errors::{FlowgateError, Result};
use crate::execution::{Execution, StepRuntimeState};
use crate::persistence::Persistence;

/// Process-local [`Persistence`] backed by concurrent maps.
///
/// Keeps every step update it receives so callers can inspect the history
/// of a step, not just its latest state.
#[derive(Debug, Default)]
pub struct InMemoryPersistence {
    definitions: DashMap<String, Arc<WorkflowDefinition>>,
    executions: DashMap<ExecutionId, Execution>,
    step_updates: DashMap<ExecutionId, Vec<StepRuntimeState>>,
}

impl InMemoryPersistence {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make a definition loadable under its workflow id.
    pub fn insert_definition(&self, definition: WorkflowDefinition) -> Arc<WorkflowDefinition> {
        let definition = Arc::new(definition);
        self.definitions
            .insert(definition.id().to_string(), Arc::clone(&definition));
        definition
    }

    /// Last saved snapshot of an execution.
    pub fn execution(&self, execution_id: ExecutionId) -> Option<Execution> {
        self.executions.get(&execution_id).map(|e| e.value().clone())
    }

    /// Every step update received for one step of an execution, oldest first.
    pub fn step_history(&self, execution_id: ExecutionId, step_id: &str) -> Vec<StepRuntimeState> {
        self.step_updates
            .get(&execution_id)
            .map(|updates| {
                updates
                    .iter()
                    .filter(|s| s.step_id() == step_id)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[async_trait]
impl Persistence for InMemoryPersistence {
    async fn load_definition(&self, definition_id: &str) -> Result<Arc<WorkflowDefinition>> {
        self.definitions
            .get(definition_id)
            .map(|d| Arc::clone(d.value()))
            .ok_or_else(|| FlowgateError::DefinitionNotFound(definition_id.to_string()))
    }

    async fn save_execution(&self, execution: &Execution) -> Result<()> {
        debug!(
            execution_id = %execution.id(),
            status = %execution.status(),
            "saving execution snapshot"
        );
        self.executions.insert(execution.id(), execution.clone());
        Ok(())
    }

    async fn update_step_state(
        &self,
        execution_id: ExecutionId,
        step_id: &str,
        state: &StepRuntimeState,
    ) -> Result<()> {
        debug!(%execution_id, step = %step_id, status = %state.status(), "saving step state");
        self.step_updates
            .entry(execution_id)
            .or_default()
            .push(state.clone());
        Ok(())
    }
}
