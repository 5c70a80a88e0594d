// src/config/validate.rs

use std::collections::HashSet;

use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;

use crate::config::engine::EngineConfig;
use crate::config::model::{RawWorkflowDefinition, WorkflowDefinition};
use crate::errors::{FlowgateError, GraphError, Result};

impl TryFrom<RawWorkflowDefinition> for WorkflowDefinition {
    type Error = FlowgateError;

    fn try_from(raw: RawWorkflowDefinition) -> std::result::Result<Self, Self::Error> {
        validate_raw_definition(&raw)?;
        Ok(WorkflowDefinition::new_unchecked(raw))
    }
}

fn validate_raw_definition(def: &RawWorkflowDefinition) -> Result<()> {
    validate_workflow_section(def)?;
    ensure_has_steps(def)?;
    validate_retry_policy(def)?;
    validate_step_ids(def)?;
    validate_step_dependencies(def)?;
    validate_review_steps(def)?;
    validate_dag(def)?;
    Ok(())
}

fn validate_workflow_section(def: &RawWorkflowDefinition) -> Result<()> {
    if def.workflow.id.trim().is_empty() {
        return Err(FlowgateError::ConfigError(
            "[workflow].id must not be empty".to_string(),
        ));
    }
    if def.workflow.timeout_secs == Some(0) {
        return Err(FlowgateError::ConfigError(format!(
            "workflow '{}': timeout_secs must be >= 1 (got 0)",
            def.workflow.id
        )));
    }
    Ok(())
}

fn ensure_has_steps(def: &RawWorkflowDefinition) -> Result<()> {
    if def.steps.is_empty() {
        return Err(FlowgateError::ConfigError(format!(
            "workflow '{}' must contain at least one [[step]] section",
            def.workflow.id
        )));
    }
    Ok(())
}

fn validate_retry_policy(def: &RawWorkflowDefinition) -> Result<()> {
    if def.retry.max_attempts == 0 {
        return Err(FlowgateError::ConfigError(
            "[retry].max_attempts must be >= 1 (got 0)".to_string(),
        ));
    }
    Ok(())
}

fn validate_step_ids(def: &RawWorkflowDefinition) -> Result<()> {
    let mut seen = HashSet::new();
    for step in def.steps.iter() {
        if step.id.trim().is_empty() {
            return Err(FlowgateError::ConfigError(
                "every [[step]] needs a non-empty `id`".to_string(),
            ));
        }
        if !seen.insert(step.id.as_str()) {
            return Err(GraphError::DuplicateStep(step.id.clone()).into());
        }
    }
    Ok(())
}

fn validate_step_dependencies(def: &RawWorkflowDefinition) -> Result<()> {
    let ids: HashSet<&str> = def.steps.iter().map(|s| s.id.as_str()).collect();

    for step in def.steps.iter() {
        for dep in step.depends_on.iter() {
            if dep == &step.id {
                return Err(GraphError::SelfDependency(step.id.clone()).into());
            }
            if !ids.contains(dep.as_str()) {
                return Err(GraphError::UnknownDependency {
                    step: step.id.clone(),
                    dependency: dep.clone(),
                }
                .into());
            }
        }
    }
    Ok(())
}

fn validate_review_steps(def: &RawWorkflowDefinition) -> Result<()> {
    for step in def.steps.iter() {
        match (step.step_type.is_human_review(), &step.review) {
            (true, None) => {
                return Err(FlowgateError::ConfigError(format!(
                    "human_review step '{}' needs a `review = {{ reviewer = ... }}` table",
                    step.id
                )));
            }
            (true, Some(review)) if review.reviewer.trim().is_empty() => {
                return Err(FlowgateError::ConfigError(format!(
                    "human_review step '{}' has an empty reviewer",
                    step.id
                )));
            }
            (false, Some(_)) => {
                return Err(FlowgateError::ConfigError(format!(
                    "step '{}' of type '{}' cannot carry review settings",
                    step.id, step.step_type
                )));
            }
            _ => {}
        }
    }
    Ok(())
}

fn validate_dag(def: &RawWorkflowDefinition) -> Result<()> {
    // Edge direction: dependency -> dependent.
    let mut graph: DiGraphMap<&str, ()> = DiGraphMap::new();

    for step in def.steps.iter() {
        graph.add_node(step.id.as_str());
    }

    for step in def.steps.iter() {
        for dep in step.depends_on.iter() {
            graph.add_edge(dep.as_str(), step.id.as_str(), ());
        }
    }

    match toposort(&graph, None) {
        Ok(_order) => Ok(()),
        Err(cycle) => Err(GraphError::Cycle(cycle.node_id().to_string()).into()),
    }
}

/// Sanity checks for the engine config.
pub fn validate_engine_config(cfg: &EngineConfig) -> Result<()> {
    if cfg.engine.event_channel_capacity == 0 {
        return Err(FlowgateError::ConfigError(
            "[engine].event_channel_capacity must be >= 1 (got 0)".to_string(),
        ));
    }
    if cfg.engine.drift_check_interval_secs == 0 {
        return Err(FlowgateError::ConfigError(
            "[engine].drift_check_interval_secs must be >= 1 (got 0)".to_string(),
        ));
    }
    if cfg.engine.history_limit == 0 {
        return Err(FlowgateError::ConfigError(
            "[engine].history_limit must be >= 1 (got 0)".to_string(),
        ));
    }

    let mut seen = HashSet::new();
    for model in cfg.models.iter() {
        if !seen.insert(model.model_id.as_str()) {
            return Err(FlowgateError::ConfigError(format!(
                "model '{}' is configured more than once",
                model.model_id
            )));
        }
        if !(model.threshold.is_finite() && model.threshold > 0.0) {
            return Err(FlowgateError::ConfigError(format!(
                "model '{}': threshold must be a positive number (got {})",
                model.model_id, model.threshold
            )));
        }
        if let Some(dq) = model.data_quality_threshold {
            if !(dq.is_finite() && dq > 0.0) {
                return Err(FlowgateError::ConfigError(format!(
                    "model '{}': data_quality_threshold must be a positive number (got {dq})",
                    model.model_id
                )));
            }
        }
        if model.retraining_workflow.trim().is_empty() {
            return Err(FlowgateError::ConfigError(format!(
                "model '{}': retraining_workflow must not be empty",
                model.model_id
            )));
        }
    }
    Ok(())
}
