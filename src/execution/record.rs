// src/execution/record.rs

//! The execution record: one run of a workflow definition.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::WorkflowDefinition;
use crate::engine::{ExecutionId, StepId};
use crate::errors::{FlowgateError, Result};
use crate::execution::step_state::{StepRuntimeState, StepStatus, StepTransition};
use crate::types::{Params, TriggerType};

/// Overall status of an execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl ExecutionStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, ExecutionStatus::Running)
    }
}

impl fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ExecutionStatus::Running => "running",
            ExecutionStatus::Completed => "completed",
            ExecutionStatus::Failed => "failed",
            ExecutionStatus::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

/// What started an execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ExecutionTrigger {
    Manual,
    Schedule,
    Event { event: String },
    Drift { model_id: String },
}

impl ExecutionTrigger {
    pub fn trigger_type(&self) -> TriggerType {
        match self {
            ExecutionTrigger::Manual => TriggerType::Manual,
            ExecutionTrigger::Schedule => TriggerType::Schedule,
            ExecutionTrigger::Event { .. } => TriggerType::Event,
            ExecutionTrigger::Drift { .. } => TriggerType::Drift,
        }
    }

    /// Model whose drift caused this execution, if any.
    pub fn drift_model(&self) -> Option<&str> {
        match self {
            ExecutionTrigger::Drift { model_id } => Some(model_id),
            _ => None,
        }
    }
}

/// Category of an execution log line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogKind {
    ExecutionStarted,
    StepStarted,
    StepCompleted,
    StepAttemptFailed,
    StepRetryScheduled,
    /// Permanent failure: attempts exhausted, or a review that did not approve.
    StepFailed,
    StepSkipped,
    ReviewRequested,
    ReviewResolved,
    ExecutionTimedOut,
    ExecutionFinished,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LogEntry {
    pub at: DateTime<Utc>,
    pub kind: LogKind,
    pub step_id: Option<StepId>,
    pub message: String,
}

/// One run instance of a workflow definition.
///
/// Owned by the execution's drive loop; everybody else reads clones or
/// projections taken under a read lock.
#[derive(Debug, Clone, Serialize)]
pub struct Execution {
    id: ExecutionId,
    workflow_id: String,
    trigger: ExecutionTrigger,
    inputs: Params,
    status: ExecutionStatus,
    steps: BTreeMap<StepId, StepRuntimeState>,
    log: Vec<LogEntry>,
    started_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
}

impl Execution {
    /// Create a running execution with every step `pending`.
    pub fn new(definition: &WorkflowDefinition, inputs: Params, trigger: ExecutionTrigger) -> Self {
        let now = Utc::now();
        let steps = definition
            .steps()
            .iter()
            .map(|s| (s.id.clone(), StepRuntimeState::new(s.id.clone())))
            .collect();

        let mut execution = Self {
            id: Uuid::now_v7(),
            workflow_id: definition.id().to_string(),
            trigger,
            inputs,
            status: ExecutionStatus::Running,
            steps,
            log: Vec::new(),
            started_at: now,
            completed_at: None,
        };

        let message = format!(
            "execution started for workflow '{}' (trigger: {:?})",
            definition.id(),
            execution.trigger.trigger_type()
        );
        execution.log.push(LogEntry {
            at: now,
            kind: LogKind::ExecutionStarted,
            step_id: None,
            message,
        });

        execution
    }

    pub fn id(&self) -> ExecutionId {
        self.id
    }

    pub fn workflow_id(&self) -> &str {
        &self.workflow_id
    }

    pub fn trigger(&self) -> &ExecutionTrigger {
        &self.trigger
    }

    pub fn inputs(&self) -> &Params {
        &self.inputs
    }

    pub fn status(&self) -> ExecutionStatus {
        self.status
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at
    }

    pub fn duration(&self) -> Option<chrono::Duration> {
        self.completed_at.map(|end| end - self.started_at)
    }

    pub fn step(&self, step_id: &str) -> Option<&StepRuntimeState> {
        self.steps.get(step_id)
    }

    pub fn step_states(&self) -> &BTreeMap<StepId, StepRuntimeState> {
        &self.steps
    }

    pub fn log(&self) -> &[LogEntry] {
        &self.log
    }

    /// Log lines of one kind, optionally restricted to one step.
    pub fn log_entries(&self, kind: LogKind, step_id: Option<&str>) -> Vec<&LogEntry> {
        self.log
            .iter()
            .filter(|e| e.kind == kind)
            .filter(|e| step_id.is_none() || e.step_id.as_deref() == step_id)
            .collect()
    }

    /// Error messages of every permanently failed step.
    pub fn errors(&self) -> Vec<String> {
        self.steps
            .values()
            .filter(|s| s.status() == StepStatus::Failed)
            .filter_map(|s| s.error().map(|e| format!("{}: {e}", s.step_id())))
            .collect()
    }

    /// Apply a transition to one step of a running execution.
    pub fn apply_step(
        &mut self,
        step_id: &str,
        transition: &StepTransition,
        now: DateTime<Utc>,
    ) -> Result<&StepRuntimeState> {
        self.ensure_running("step update")?;
        let id = self.id;
        let state = self.steps.get_mut(step_id).ok_or_else(|| {
            FlowgateError::ConfigError(format!("execution {id} has no step '{step_id}'"))
        })?;
        state.apply(transition, now)?;
        Ok(state)
    }

    /// Append a log line. Ignored once the execution is terminal.
    pub fn record(&mut self, kind: LogKind, step_id: Option<&str>, message: impl Into<String>) {
        if self.status.is_terminal() {
            return;
        }
        self.log.push(LogEntry {
            at: Utc::now(),
            kind,
            step_id: step_id.map(str::to_string),
            message: message.into(),
        });
    }

    /// Move the execution to a terminal status. After this the record is
    /// frozen.
    pub fn finish(&mut self, status: ExecutionStatus, now: DateTime<Utc>) -> Result<()> {
        if !status.is_terminal() {
            return Err(FlowgateError::IllegalTransition {
                entity: "execution",
                from: self.status.to_string(),
                to: status.to_string(),
            });
        }
        self.ensure_running("finish")?;

        self.log.push(LogEntry {
            at: now,
            kind: LogKind::ExecutionFinished,
            step_id: None,
            message: format!("execution {status}"),
        });
        self.status = status;
        self.completed_at = Some(now);
        Ok(())
    }

    fn ensure_running(&self, action: &str) -> Result<()> {
        if self.status.is_terminal() {
            return Err(FlowgateError::IllegalTransition {
                entity: "execution",
                from: self.status.to_string(),
                to: action.to_string(),
            });
        }
        Ok(())
    }
}
