// src/dag/scheduler_step.rs

//! Result type of one scheduler pass.

use crate::dag::state_manager::UnreachableStep;
use crate::engine::StepId;

/// What the orchestrator should do next for an execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchedulerStep {
    /// Run these steps concurrently, then plan again.
    Dispatch(Vec<StepId>),
    /// Nothing is ready but some steps are still running.
    Waiting,
    /// Nothing is ready or running; mark these steps skipped and plan again.
    Skip(Vec<UnreachableStep>),
    /// Every step has settled.
    Finished,
    /// Pending steps remain with nothing ready, running or failed upstream.
    /// Cannot happen for an activated definition; reported instead of
    /// looping.
    Stalled(Vec<StepId>),
}
