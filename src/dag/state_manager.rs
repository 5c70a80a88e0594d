// src/dag/state_manager.rs

//! Read-only queries over the per-step states of one execution.

use std::collections::{BTreeMap, HashSet};

use tracing::warn;

use crate::dag::graph::DagGraph;
use crate::engine::StepId;
use crate::execution::{StepRuntimeState, StepStatus};

/// A step that can no longer run because some dependency did not complete.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnreachableStep {
    pub step_id: StepId,
    /// Direct dependencies that ended `failed` or `skipped`.
    pub blocked_by: Vec<StepId>,
}

/// Read-only view that answers scheduling questions for one execution.
pub struct StateView<'a> {
    graph: &'a DagGraph,
    states: &'a BTreeMap<StepId, StepRuntimeState>,
}

impl<'a> StateView<'a> {
    pub fn new(graph: &'a DagGraph, states: &'a BTreeMap<StepId, StepRuntimeState>) -> Self {
        Self { graph, states }
    }

    fn status_of(&self, step: &str) -> Option<StepStatus> {
        self.states.get(step).map(|s| s.status())
    }

    /// Whether every dependency of `step` has completed.
    ///
    /// Any other dependency status, `skipped` included, leaves the step
    /// waiting or unreachable.
    pub fn deps_satisfied(&self, step: &str) -> bool {
        for dep in self.graph.dependencies_of(step) {
            match self.status_of(dep) {
                Some(StepStatus::Completed) => {}
                Some(_) => return false,
                None => {
                    warn!(step = %step, dep = %dep, "dependency missing from execution state");
                    return false;
                }
            }
        }
        true
    }

    /// Pending steps whose dependencies are all completed, in definition order.
    pub fn collect_ready(&self) -> Vec<StepId> {
        self.graph
            .steps()
            .filter(|s| self.status_of(s) == Some(StepStatus::Pending))
            .filter(|s| self.deps_satisfied(s))
            .map(str::to_string)
            .collect()
    }

    pub fn any_running(&self) -> bool {
        self.states
            .values()
            .any(|s| s.status() == StepStatus::Running)
    }

    pub fn pending(&self) -> Vec<StepId> {
        self.graph
            .steps()
            .filter(|s| self.status_of(s) == Some(StepStatus::Pending))
            .map(str::to_string)
            .collect()
    }

    /// Pending steps cut off by a failed or skipped ancestor.
    ///
    /// Propagates transitively: a step behind another unreachable step is
    /// itself unreachable, blocked by that step.
    pub fn collect_unreachable(&self) -> Vec<UnreachableStep> {
        let mut blocked: HashSet<&str> = self
            .graph
            .steps()
            .filter(|s| {
                matches!(
                    self.status_of(s),
                    Some(StepStatus::Failed) | Some(StepStatus::Skipped)
                )
            })
            .collect();

        let mut unreachable = Vec::new();
        let mut changed = true;

        while changed {
            changed = false;
            for step in self.graph.steps() {
                if blocked.contains(step) || self.status_of(step) != Some(StepStatus::Pending) {
                    continue;
                }
                let blocked_by: Vec<StepId> = self
                    .graph
                    .dependencies_of(step)
                    .iter()
                    .filter(|d| blocked.contains(d.as_str()))
                    .cloned()
                    .collect();

                if !blocked_by.is_empty() {
                    blocked.insert(step);
                    unreachable.push(UnreachableStep {
                        step_id: step.to_string(),
                        blocked_by,
                    });
                    changed = true;
                }
            }
        }

        // Report in definition order regardless of discovery order.
        let position = |id: &str| self.graph.steps().position(|s| s == id);
        unreachable.sort_by_key(|u| position(&u.step_id));
        unreachable
    }
}
