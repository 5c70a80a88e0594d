// src/dag/scheduler.rs

use std::collections::BTreeMap;

use tracing::debug;

use crate::config::WorkflowDefinition;
use crate::dag::graph::DagGraph;
use crate::dag::scheduler_step::SchedulerStep;
use crate::dag::state_manager::{StateView, UnreachableStep};
use crate::engine::StepId;
use crate::execution::StepRuntimeState;

/// Dependency scheduler for one workflow definition.
///
/// Holds only the immutable graph; the per-run state is passed in on every
/// call so one scheduler can be shared by any number of executions.
#[derive(Debug, Clone)]
pub struct Scheduler {
    graph: DagGraph,
}

impl Scheduler {
    pub fn from_definition(def: &WorkflowDefinition) -> Self {
        Self {
            graph: DagGraph::from_definition(def),
        }
    }

    pub fn graph(&self) -> &DagGraph {
        &self.graph
    }

    /// Every pending step whose dependencies have all completed, in
    /// definition order.
    pub fn ready_frontier(&self, states: &BTreeMap<StepId, StepRuntimeState>) -> Vec<StepId> {
        StateView::new(&self.graph, states).collect_ready()
    }

    /// Whether the dependencies of `step` are satisfied. `None` for an
    /// unknown step.
    pub fn deps_satisfied(
        &self,
        step: &str,
        states: &BTreeMap<StepId, StepRuntimeState>,
    ) -> Option<bool> {
        if !self.graph.contains(step) {
            return None;
        }
        Some(StateView::new(&self.graph, states).deps_satisfied(step))
    }

    /// Pending steps that can never run because an ancestor did not complete.
    pub fn unreachable_steps(
        &self,
        states: &BTreeMap<StepId, StepRuntimeState>,
    ) -> Vec<UnreachableStep> {
        StateView::new(&self.graph, states).collect_unreachable()
    }

    /// Decide the next move for an execution in the given state.
    pub fn plan(&self, states: &BTreeMap<StepId, StepRuntimeState>) -> SchedulerStep {
        let view = StateView::new(&self.graph, states);

        let ready = view.collect_ready();
        if !ready.is_empty() {
            debug!(?ready, "scheduler: ready frontier");
            return SchedulerStep::Dispatch(ready);
        }

        if view.any_running() {
            return SchedulerStep::Waiting;
        }

        let pending = view.pending();
        if pending.is_empty() {
            debug!("scheduler: all steps settled");
            return SchedulerStep::Finished;
        }

        let unreachable = view.collect_unreachable();
        if !unreachable.is_empty() {
            debug!(count = unreachable.len(), "scheduler: unreachable steps found");
            return SchedulerStep::Skip(unreachable);
        }

        SchedulerStep::Stalled(pending)
    }
}
