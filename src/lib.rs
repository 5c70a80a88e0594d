// src/lib.rs

pub mod cli;
pub mod config;
pub mod dag;
pub mod drift;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod execution;
pub mod logging;
pub mod persistence;
pub mod review;
pub mod types;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::cli::{CliArgs, Command};
use crate::config::{WorkflowDefinition, load_and_validate, load_engine_config};
use crate::dag::DagGraph;
use crate::engine::{Engine, ExecutionId};
use crate::exec::{StepInput, StepRegistry};
use crate::execution::ExecutionTrigger;
use crate::review::ReviewSubmission;
use crate::types::{Params, ReviewDecision, StepType};

/// How often `run` checks for review requests to auto-resolve.
const REVIEW_POLL_INTERVAL: Duration = Duration::from_millis(20);

/// High-level entry point used by `main.rs`.
pub async fn run(args: CliArgs) -> Result<()> {
    match args.command {
        Command::Check { workflow } => {
            let def = load_and_validate(&workflow)?;
            print_check(&def);
            Ok(())
        }
        Command::Run {
            workflow,
            inputs,
            review_decision,
            reviewer,
            engine_config,
        } => {
            let def = Arc::new(load_and_validate(&workflow)?);
            let inputs: Params = inputs.into_iter().collect();
            run_workflow(
                def,
                inputs,
                review_decision,
                &reviewer,
                engine_config.as_deref(),
            )
            .await
        }
    }
}

async fn run_workflow(
    def: Arc<WorkflowDefinition>,
    inputs: Params,
    decision: ReviewDecision,
    reviewer: &str,
    engine_config: Option<&Path>,
) -> Result<()> {
    let mut builder = Engine::builder().registry(passthrough_registry()?);
    if let Some(path) = engine_config {
        builder = builder.config(load_engine_config(path)?);
    }
    let engine = builder.build();

    let execution_id = engine
        .submit_definition(Arc::clone(&def), inputs, ExecutionTrigger::Manual)
        .await?;
    info!(%execution_id, workflow = %def.id(), "workflow submitted");

    let resolver = tokio::spawn(auto_resolve_reviews(
        engine.clone(),
        execution_id,
        decision,
        reviewer.to_string(),
    ));

    let execution = engine.wait_for(execution_id).await?;
    resolver.abort();

    let json = serde_json::to_string_pretty(&execution).context("serialising execution")?;
    println!("{json}");

    info!(status = %execution.status(), "workflow finished");
    Ok(())
}

/// Submit `decision` for every review request the execution opens, until it
/// is aborted.
async fn auto_resolve_reviews(
    engine: Engine,
    execution_id: ExecutionId,
    decision: ReviewDecision,
    reviewer: String,
) {
    loop {
        for request in engine
            .pending_reviews()
            .into_iter()
            .filter(|r| r.execution_id == execution_id)
        {
            let submission = ReviewSubmission::new(decision, reviewer.clone())
                .with_comments("resolved from the command line");
            match engine.submit_review_decision(request.id, submission) {
                Ok(resolved) => debug!(review_id = %resolved.id, status = %resolved.status, "review auto-resolved"),
                Err(err) => warn!(review_id = %request.id, error = %err, "failed to auto-resolve review"),
            }
        }
        tokio::time::sleep(REVIEW_POLL_INTERVAL).await;
    }
}

/// One body per executable step type that echoes what it was given.
fn passthrough_registry() -> Result<StepRegistry> {
    let mut registry = StepRegistry::new();
    for step_type in StepType::ALL.iter().copied().filter(|t| !t.is_human_review()) {
        registry.register_fn(step_type, |input: StepInput| async move {
            let mut output = Params::new();
            output.insert("step".into(), Value::String(input.step_id));
            output.insert("type".into(), Value::String(input.step_type.to_string()));
            output.insert("params".into(), Value::Object(input.params));
            output.insert(
                "upstream".into(),
                Value::Array(input.upstream.into_keys().map(Value::String).collect()),
            );
            anyhow::Ok(output)
        })?;
    }
    Ok(registry)
}

/// Dry-run output: steps, dependencies and success-path levels.
fn print_check(def: &WorkflowDefinition) {
    println!("flowgate check: {}", def.name());
    println!("  workflow.id = {}", def.id());
    if let Some(timeout) = def.timeout() {
        println!("  workflow.timeout_secs = {}", timeout.as_secs());
    }
    let retry = def.retry();
    println!(
        "  retry = {} attempts, {:?} backoff, base {}ms",
        retry.max_attempts, retry.backoff, retry.base_delay_ms
    );
    for trigger in def.triggers() {
        println!("  trigger: {:?}", trigger);
    }
    println!();

    println!("steps ({}):", def.steps().len());
    for step in def.steps() {
        println!("  - {} [{}]", step.id, step.step_type);
        if step.display_name() != step.id {
            println!("      name: {}", step.display_name());
        }
        if !step.depends_on.is_empty() {
            println!("      depends_on: {:?}", step.depends_on);
        }
        if let Some(review) = &step.review {
            println!(
                "      review: {} (deadline {}s)",
                review.reviewer, review.deadline_secs
            );
        }
    }
    println!();

    let graph = DagGraph::from_definition(def);
    println!("levels:");
    for (i, level) in graph.levels().iter().enumerate() {
        println!("  {i}: {}", level.join(", "));
    }

    debug!("check complete (no execution)");
}
