// src/dag/graph.rs

use std::collections::{HashMap, HashSet};

use crate::config::WorkflowDefinition;
use crate::engine::StepId;

/// Internal node structure: stores immediate deps and dependents.
#[derive(Debug, Clone)]
struct DagNode {
    /// Steps that must complete before this one can run.
    deps: Vec<StepId>,
    /// Steps that depend on this one, in definition order.
    dependents: Vec<StepId>,
}

/// In-memory step graph keyed by step id.
///
/// Acyclicity and closure of the dependency relation are guaranteed by
/// activation (`config::validate`); this only keeps adjacency and the
/// definition order used for tie-breaks.
#[derive(Debug, Clone)]
pub struct DagGraph {
    order: Vec<StepId>,
    nodes: HashMap<StepId, DagNode>,
}

impl DagGraph {
    pub fn from_definition(def: &WorkflowDefinition) -> Self {
        let mut nodes: HashMap<StepId, DagNode> = HashMap::new();
        let order: Vec<StepId> = def.steps().iter().map(|s| s.id.clone()).collect();

        for step in def.steps() {
            nodes.insert(
                step.id.clone(),
                DagNode {
                    deps: step.depends_on.clone(),
                    dependents: Vec::new(),
                },
            );
        }

        // Walk in definition order so dependents lists keep that order.
        for step in def.steps() {
            for dep in step.depends_on.iter() {
                if let Some(dep_node) = nodes.get_mut(dep) {
                    dep_node.dependents.push(step.id.clone());
                }
            }
        }

        Self { order, nodes }
    }

    /// All step ids in definition order.
    pub fn steps(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(|s| s.as_str())
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn contains(&self, step: &str) -> bool {
        self.nodes.contains_key(step)
    }

    pub fn dependencies_of(&self, step: &str) -> &[StepId] {
        self.nodes
            .get(step)
            .map(|n| n.deps.as_slice())
            .unwrap_or(&[])
    }

    pub fn dependents_of(&self, step: &str) -> &[StepId] {
        self.nodes
            .get(step)
            .map(|n| n.dependents.as_slice())
            .unwrap_or(&[])
    }

    /// Steps with no dependencies.
    pub fn roots(&self) -> Vec<StepId> {
        self.order
            .iter()
            .filter(|s| self.dependencies_of(s).is_empty())
            .cloned()
            .collect()
    }

    /// Frontiers the scheduler would dispatch if every step succeeded.
    pub fn levels(&self) -> Vec<Vec<StepId>> {
        let mut done: HashSet<&str> = HashSet::new();
        let mut levels = Vec::new();

        while done.len() < self.order.len() {
            let level: Vec<StepId> = self
                .order
                .iter()
                .filter(|s| !done.contains(s.as_str()))
                .filter(|s| {
                    self.dependencies_of(s)
                        .iter()
                        .all(|d| done.contains(d.as_str()))
                })
                .cloned()
                .collect();

            if level.is_empty() {
                // Unreachable for an activated definition.
                break;
            }
            for step in level.iter() {
                if let Some((key, _)) = self.nodes.get_key_value(step.as_str()) {
                    done.insert(key.as_str());
                }
            }
            levels.push(level);
        }

        levels
    }
}
