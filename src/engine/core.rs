// src/engine/core.rs

//! Pure per-execution state machine.
//!
//! [`ExecutionCore`] owns the scheduler and the execution record of one run.
//! It turns [`StepEvent`]s into step transitions and log lines, and answers
//! "what next" through the scheduler. It has no channels, spawns nothing and
//! never awaits; the async shell in [`crate::engine::runtime`] drives it.
//!
//! Every mutating method returns snapshots of the step states it changed so
//! the shell can persist them.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use parking_lot::RwLock;
use tracing::{info, warn};

use crate::config::WorkflowDefinition;
use crate::dag::{Scheduler, SchedulerStep, UnreachableStep};
use crate::engine::StepId;
use crate::exec::{StepDispatch, StepEvent};
use crate::execution::{
    Execution, ExecutionStatus, LogKind, StepRuntimeState, StepStatus, StepTransition,
};

#[derive(Debug)]
pub struct ExecutionCore {
    definition: Arc<WorkflowDefinition>,
    scheduler: Scheduler,
    record: Arc<RwLock<Execution>>,
    /// Set when the run must end `failed` regardless of step outcomes.
    forced_failure: Option<String>,
}

impl ExecutionCore {
    pub fn new(definition: Arc<WorkflowDefinition>, record: Arc<RwLock<Execution>>) -> Self {
        let scheduler = Scheduler::from_definition(&definition);
        Self {
            definition,
            scheduler,
            record,
            forced_failure: None,
        }
    }

    pub fn definition(&self) -> &Arc<WorkflowDefinition> {
        &self.definition
    }

    pub fn record(&self) -> &Arc<RwLock<Execution>> {
        &self.record
    }

    pub fn forced_failure(&self) -> Option<&str> {
        self.forced_failure.as_deref()
    }

    /// Ask the scheduler what to do next.
    pub fn next_step(&self) -> SchedulerStep {
        let record = self.record.read();
        self.scheduler.plan(record.step_states())
    }

    /// Build one dispatch per ready step, carrying the outputs of its direct
    /// dependencies.
    pub fn dispatches(&self, ready: &[StepId]) -> Vec<StepDispatch> {
        let record = self.record.read();
        let graph = self.scheduler.graph();

        ready
            .iter()
            .filter_map(|step_id| {
                let step = self.definition.step(step_id)?;
                let upstream: BTreeMap<StepId, _> = graph
                    .dependencies_of(step_id)
                    .iter()
                    .filter_map(|dep| {
                        record
                            .step(dep)
                            .map(|s| (dep.clone(), s.output().clone()))
                    })
                    .collect();

                Some(StepDispatch {
                    execution_id: record.id(),
                    step: step.clone(),
                    retry: self.definition.retry().clone(),
                    execution_inputs: record.inputs().clone(),
                    upstream,
                })
            })
            .collect()
    }

    /// Fold one executor event into the record.
    pub fn apply_event(&mut self, event: &StepEvent) -> Vec<StepRuntimeState> {
        let mut record = self.record.write();
        let mut changed = Vec::new();

        match event {
            StepEvent::Started { step_id, attempt } => {
                if let Some(state) = transition(&mut record, step_id, StepTransition::Start) {
                    record.record(
                        LogKind::StepStarted,
                        Some(step_id),
                        format!(
                            "step '{}' started (attempt {attempt})",
                            self.display_name(step_id)
                        ),
                    );
                    changed.push(state);
                }
            }
            StepEvent::Completed { step_id, output } => {
                let t = StepTransition::Complete(output.clone());
                if let Some(state) = transition(&mut record, step_id, t) {
                    record.record(
                        LogKind::StepCompleted,
                        Some(step_id),
                        format!(
                            "step '{}' completed after {} attempt(s)",
                            self.display_name(step_id),
                            state.attempts()
                        ),
                    );
                    changed.push(state);
                }
            }
            StepEvent::AttemptFailed {
                step_id,
                attempt,
                error,
                retry_in,
            } => {
                let t = StepTransition::Fail(error.clone());
                if transition(&mut record, step_id, t).is_some() {
                    record.record(
                        LogKind::StepAttemptFailed,
                        Some(step_id),
                        format!(
                            "attempt {attempt} of step '{}' failed: {error}",
                            self.display_name(step_id)
                        ),
                    );
                    if let Some(state) = transition(&mut record, step_id, StepTransition::Retry) {
                        record.record(
                            LogKind::StepRetryScheduled,
                            Some(step_id),
                            format!(
                                "retrying step '{}' in {}ms",
                                self.display_name(step_id),
                                retry_in.as_millis()
                            ),
                        );
                        changed.push(state);
                    }
                }
            }
            StepEvent::Failed {
                step_id,
                attempts,
                error,
            } => {
                let t = StepTransition::Fail(error.clone());
                if let Some(state) = transition(&mut record, step_id, t) {
                    record.record(
                        LogKind::StepFailed,
                        Some(step_id),
                        format!(
                            "step '{}' failed after {attempts} attempt(s): {error}",
                            self.display_name(step_id)
                        ),
                    );
                    changed.push(state);
                }
            }
            StepEvent::ReviewRequested { step_id, request } => {
                record.record(
                    LogKind::ReviewRequested,
                    Some(step_id),
                    format!(
                        "review {} requested from '{}' (deadline {})",
                        request.id, request.reviewer, request.deadline
                    ),
                );
            }
            StepEvent::ReviewResolved { step_id, request } => {
                record.record(
                    LogKind::ReviewResolved,
                    Some(step_id),
                    format!(
                        "review {} {} by '{}'",
                        request.id,
                        request.status,
                        request.decided_by.as_deref().unwrap_or("unknown")
                    ),
                );
            }
        }

        changed
    }

    /// Mark unreachable steps skipped.
    pub fn skip(&mut self, unreachable: &[UnreachableStep]) -> Vec<StepRuntimeState> {
        let mut record = self.record.write();
        let mut changed = Vec::new();

        for u in unreachable {
            let reason = format!("dependency not completed: {}", u.blocked_by.join(", "));
            let t = StepTransition::Skip(reason.clone());
            if let Some(state) = transition(&mut record, &u.step_id, t) {
                record.record(
                    LogKind::StepSkipped,
                    Some(&u.step_id),
                    format!("step '{}' skipped: {reason}", self.display_name(&u.step_id)),
                );
                changed.push(state);
            }
        }

        changed
    }

    /// Fail members of a finished batch that never reported an outcome, for
    /// example because their task was aborted.
    pub fn fail_orphaned(&mut self, batch: &[StepId]) -> Vec<StepRuntimeState> {
        let mut record = self.record.write();
        let mut changed = Vec::new();
        let error = "step task ended without reporting an outcome".to_string();

        for step_id in batch {
            let status = match record.step(step_id) {
                Some(s) => s.status(),
                None => continue,
            };
            if status == StepStatus::Pending {
                transition(&mut record, step_id, StepTransition::Start);
            } else if status != StepStatus::Running {
                continue;
            }
            if let Some(state) = transition(&mut record, step_id, StepTransition::Fail(error.clone())) {
                warn!(step = %step_id, "step left running by its task; marking failed");
                record.record(
                    LogKind::StepFailed,
                    Some(step_id),
                    format!("step '{}' failed: {error}", self.display_name(step_id)),
                );
                changed.push(state);
            }
        }

        changed
    }

    /// Overall timeout hit: skip everything still pending and force failure.
    /// Running steps are left alone.
    pub fn time_out(&mut self, limit: Duration) -> Vec<StepRuntimeState> {
        let reason = format!("execution timed out after {}s", limit.as_secs());
        {
            let mut record = self.record.write();
            record.record(LogKind::ExecutionTimedOut, None, reason.clone());
        }
        self.force_failure(reason)
    }

    /// No step can make progress although some are pending.
    pub fn stall(&mut self, pending: &[StepId]) -> Vec<StepRuntimeState> {
        warn!(?pending, "execution stalled with pending steps");
        self.force_failure(format!("execution stalled with pending steps: {}", pending.join(", ")))
    }

    fn force_failure(&mut self, reason: String) -> Vec<StepRuntimeState> {
        let mut record = self.record.write();
        let pending: Vec<StepId> = record
            .step_states()
            .values()
            .filter(|s| s.status() == StepStatus::Pending)
            .map(|s| s.step_id().to_string())
            .collect();

        let mut changed = Vec::new();
        for step_id in pending {
            if let Some(state) = transition(&mut record, &step_id, StepTransition::Skip(reason.clone())) {
                record.record(
                    LogKind::StepSkipped,
                    Some(&step_id),
                    format!("step '{}' skipped: {reason}", self.display_name(&step_id)),
                );
                changed.push(state);
            }
        }

        self.forced_failure.get_or_insert(reason);
        changed
    }

    /// Decide the terminal status, freeze the record and return a snapshot.
    ///
    /// `completed` iff every non-skipped step completed and nothing forced a
    /// failure.
    pub fn finalize(&mut self) -> Execution {
        let mut record = self.record.write();

        let all_ok = record
            .step_states()
            .values()
            .all(|s| matches!(s.status(), StepStatus::Completed | StepStatus::Skipped));
        let any_skipped = record
            .step_states()
            .values()
            .any(|s| s.status() == StepStatus::Skipped);

        // A skip always has a failed ancestor or a forced failure behind it.
        let status = if all_ok && !any_skipped && self.forced_failure.is_none() {
            ExecutionStatus::Completed
        } else {
            ExecutionStatus::Failed
        };

        if let Err(err) = record.finish(status, Utc::now()) {
            warn!(execution_id = %record.id(), error = %err, "execution already finished");
        }

        info!(
            execution_id = %record.id(),
            workflow = %record.workflow_id(),
            status = %record.status(),
            "execution finished"
        );

        record.clone()
    }

    fn display_name<'a>(&'a self, step_id: &'a str) -> &'a str {
        self.definition
            .step(step_id)
            .map(|s| s.display_name())
            .unwrap_or(step_id)
    }
}

/// Apply one transition, logging instead of propagating a rejected one.
fn transition(
    record: &mut Execution,
    step_id: &str,
    t: StepTransition,
) -> Option<StepRuntimeState> {
    match record.apply_step(step_id, &t, Utc::now()) {
        Ok(state) => Some(state.clone()),
        Err(err) => {
            warn!(
                execution_id = %record.id(),
                step = %step_id,
                target = %t.target(),
                error = %err,
                "rejected step transition"
            );
            None
        }
    }
}
