// src/execution/status.rs

use serde::Serialize;

use crate::config::WorkflowDefinition;
use crate::engine::ExecutionId;
use crate::execution::record::{Execution, ExecutionStatus};
use crate::execution::step_state::StepStatus;

/// Read-only progress projection of an execution.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExecutionStatusReport {
    pub execution_id: ExecutionId,
    pub workflow_id: String,
    pub status: ExecutionStatus,
    pub completed_steps: usize,
    pub total_steps: usize,
    pub progress_percent: f64,
    /// Display names of steps currently running, in definition order.
    pub current_steps: Vec<String>,
    pub errors: Vec<String>,
}

impl ExecutionStatusReport {
    pub fn from_execution(execution: &Execution, definition: &WorkflowDefinition) -> Self {
        let total_steps = definition.steps().len();
        let completed_steps = execution
            .step_states()
            .values()
            .filter(|s| s.status() == StepStatus::Completed)
            .count();

        let current_steps = definition
            .steps()
            .iter()
            .filter(|s| {
                execution
                    .step(&s.id)
                    .is_some_and(|st| st.status() == StepStatus::Running)
            })
            .map(|s| s.display_name().to_string())
            .collect();

        let progress_percent = if total_steps == 0 {
            0.0
        } else {
            completed_steps as f64 * 100.0 / total_steps as f64
        };

        Self {
            execution_id: execution.id(),
            workflow_id: execution.workflow_id().to_string(),
            status: execution.status(),
            completed_steps,
            total_steps,
            progress_percent,
            current_steps,
            errors: execution.errors(),
        }
    }
}
