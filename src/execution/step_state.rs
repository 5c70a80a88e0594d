// src/execution/step_state.rs

//! Per-step runtime state and its transition table.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::engine::StepId;
use crate::errors::{FlowgateError, Result};
use crate::types::Params;

/// Lifecycle status of one step within one execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    /// Waiting on dependencies, or waiting out a retry delay.
    Pending,
    /// Dispatched to the executor (a review step stays here until decided).
    Running,
    Completed,
    Failed,
    /// Never attempted because an ancestor did not complete.
    Skipped,
}

impl StepStatus {
    /// Whether the step has settled for scheduling purposes.
    ///
    /// `Failed` counts as terminal: the executor only reports a failure that
    /// will be retried while the frontier is still in flight.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            StepStatus::Completed | StepStatus::Failed | StepStatus::Skipped
        )
    }
}

impl fmt::Display for StepStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            StepStatus::Pending => "pending",
            StepStatus::Running => "running",
            StepStatus::Completed => "completed",
            StepStatus::Failed => "failed",
            StepStatus::Skipped => "skipped",
        };
        f.write_str(s)
    }
}

/// A requested change to a step's state.
#[derive(Debug, Clone, PartialEq)]
pub enum StepTransition {
    /// pending -> running; bumps the attempt count.
    Start,
    /// running -> completed with the captured output.
    Complete(Params),
    /// running -> failed with the captured error.
    Fail(String),
    /// failed -> pending, ahead of another attempt.
    Retry,
    /// pending -> skipped with the reason it became unreachable.
    Skip(String),
}

impl StepTransition {
    pub fn target(&self) -> StepStatus {
        match self {
            StepTransition::Start => StepStatus::Running,
            StepTransition::Complete(_) => StepStatus::Completed,
            StepTransition::Fail(_) => StepStatus::Failed,
            StepTransition::Retry => StepStatus::Pending,
            StepTransition::Skip(_) => StepStatus::Skipped,
        }
    }
}

/// Mutable state of a single step in a single execution.
///
/// Fields are only changed through [`StepRuntimeState::apply`], which rejects
/// transitions outside the lifecycle table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepRuntimeState {
    step_id: StepId,
    status: StepStatus,
    attempts: u32,
    started_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
    output: Params,
    error: Option<String>,
}

impl StepRuntimeState {
    pub fn new(step_id: impl Into<StepId>) -> Self {
        Self {
            step_id: step_id.into(),
            status: StepStatus::Pending,
            attempts: 0,
            started_at: None,
            completed_at: None,
            output: Params::new(),
            error: None,
        }
    }

    pub fn step_id(&self) -> &str {
        &self.step_id
    }

    pub fn status(&self) -> StepStatus {
        self.status
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at
    }

    pub fn output(&self) -> &Params {
        &self.output
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Time between the start of the latest attempt and its end.
    pub fn duration(&self) -> Option<chrono::Duration> {
        match (self.started_at, self.completed_at) {
            (Some(start), Some(end)) => Some(end - start),
            _ => None,
        }
    }

    /// Apply a transition, or fail with [`FlowgateError::IllegalTransition`]
    /// leaving the state untouched.
    pub fn apply(&mut self, transition: &StepTransition, now: DateTime<Utc>) -> Result<()> {
        match (self.status, transition) {
            (StepStatus::Pending, StepTransition::Start) => {
                self.status = StepStatus::Running;
                self.attempts += 1;
                self.started_at = Some(now);
                self.completed_at = None;
                self.error = None;
            }
            (StepStatus::Running, StepTransition::Complete(output)) => {
                self.status = StepStatus::Completed;
                self.output = output.clone();
                self.completed_at = Some(now);
            }
            (StepStatus::Running, StepTransition::Fail(error)) => {
                self.status = StepStatus::Failed;
                self.error = Some(error.clone());
                self.completed_at = Some(now);
            }
            (StepStatus::Failed, StepTransition::Retry) => {
                self.status = StepStatus::Pending;
                self.completed_at = None;
            }
            (StepStatus::Pending, StepTransition::Skip(reason)) => {
                self.status = StepStatus::Skipped;
                self.error = Some(reason.clone());
                self.completed_at = Some(now);
            }
            (from, t) => {
                return Err(FlowgateError::IllegalTransition {
                    entity: "step",
                    from: from.to_string(),
                    to: t.target().to_string(),
                });
            }
        }
        Ok(())
    }
}
