// tests/orchestrator_scenarios.rs

mod common;
use crate::common::{Script, ScriptedSteps, StepBuilder, StepJournal, WorkflowBuilder};

use std::sync::Arc;
use std::time::Duration;

use flowgate::engine::Engine;
use flowgate::errors::FlowgateError;
use flowgate::exec::StepRegistry;
use flowgate::execution::{ExecutionStatus, ExecutionTrigger, LogKind, StepStatus};
use flowgate::persistence::InMemoryPersistence;
use flowgate::review::ReviewSubmission;
use flowgate::types::{Params, StepType};
use serde_json::json;
use uuid::Uuid;

#[tokio::test(start_paused = true)]
async fn fan_out_runs_siblings_concurrently() {
    common::init_tracing();

    let def = WorkflowBuilder::new("fan-out")
        .step(StepBuilder::new("A", StepType::Ingestion).input("source", json!("leads")))
        .step(StepBuilder::new("B", StepType::Training).after("A"))
        .step(StepBuilder::new("C", StepType::Validation).after("A"))
        .build();

    let journal = StepJournal::new();
    let steps = ScriptedSteps::new(journal.clone())
        .script("A", Script::ok().with_output("rows", json!(120)))
        .script("B", Script::ok().with_delay(Duration::from_millis(100)))
        .script("C", Script::ok().with_delay(Duration::from_millis(100)));
    let (engine, _) = common::scripted_engine(steps);

    let mut inputs = Params::new();
    inputs.insert("run_by".into(), json!("tests"));

    let exec = common::with_timeout(engine.run_definition(common::arc(def), inputs))
        .await
        .unwrap();

    assert_eq!(exec.status(), ExecutionStatus::Completed);
    for id in ["A", "B", "C"] {
        assert_eq!(exec.step(id).unwrap().status(), StepStatus::Completed);
        assert_eq!(exec.step(id).unwrap().attempts(), 1);
    }
    assert_eq!(journal.max_concurrency(), 2, "B and C overlap");
    assert_eq!(journal.started()[0], "A");

    let b_input = journal.input_of("B").unwrap();
    assert_eq!(b_input.upstream["A"]["rows"], 120);
    assert_eq!(b_input.execution_inputs["run_by"], "tests");

    let a_input = journal.input_of("A").unwrap();
    assert_eq!(a_input.params["source"], "leads");
    assert!(a_input.upstream.is_empty());

    assert_eq!(exec.log_entries(LogKind::StepCompleted, None).len(), 3);
    assert_eq!(exec.log().last().unwrap().kind, LogKind::ExecutionFinished);
}

#[tokio::test(start_paused = true)]
async fn dependents_start_only_after_dependencies_finish() {
    let def = WorkflowBuilder::new("chain")
        .step(StepBuilder::new("ingest", StepType::Ingestion))
        .step(StepBuilder::new("train", StepType::Training).after("ingest"))
        .step(StepBuilder::new("predict", StepType::Prediction).after("train"))
        .build();

    let journal = StepJournal::new();
    let steps = ScriptedSteps::new(journal.clone())
        .script("ingest", Script::ok().with_delay(Duration::from_millis(50)))
        .script("train", Script::ok().with_delay(Duration::from_millis(50)));
    let (engine, _) = common::scripted_engine(steps);

    let exec = common::with_timeout(engine.run_definition(common::arc(def), Params::new()))
        .await
        .unwrap();

    assert_eq!(exec.status(), ExecutionStatus::Completed);
    assert_eq!(journal.started(), vec!["ingest", "train", "predict"]);
    assert_eq!(journal.max_concurrency(), 1);

    let ingest = exec.step("ingest").unwrap();
    let train = exec.step("train").unwrap();
    assert!(train.started_at().unwrap() >= ingest.completed_at().unwrap());
}

#[tokio::test]
async fn submit_execution_loads_definition_from_persistence() {
    let persistence = Arc::new(InMemoryPersistence::new());
    persistence.insert_definition(
        WorkflowBuilder::new("stored")
            .step(StepBuilder::new("only", StepType::Reporting))
            .build(),
    );

    let journal = StepJournal::new();
    let engine = Engine::builder()
        .registry(ScriptedSteps::new(journal.clone()).into_registry())
        .persistence(persistence.clone())
        .build();

    let id = engine.submit_execution("stored", Params::new()).await.unwrap();
    let exec = common::with_timeout(engine.wait_for(id)).await.unwrap();

    assert_eq!(exec.id(), id);
    assert_eq!(exec.workflow_id(), "stored");
    assert_eq!(exec.trigger(), &ExecutionTrigger::Manual);
    assert_eq!(exec.status(), ExecutionStatus::Completed);
    assert_eq!(
        persistence.execution(id).unwrap().status(),
        ExecutionStatus::Completed
    );

    let missing = engine.submit_execution("nope", Params::new()).await;
    assert!(matches!(missing, Err(FlowgateError::DefinitionNotFound(ref id)) if id == "nope"));
}

#[tokio::test]
async fn missing_step_runtime_is_rejected_at_submission() {
    let def = WorkflowBuilder::new("needs-training")
        .step(StepBuilder::new("train", StepType::Training))
        .build();

    let mut registry = StepRegistry::new();
    registry
        .register_fn(StepType::Ingestion, |_input| async { anyhow::Ok(Params::new()) })
        .unwrap();
    let engine = Engine::builder().registry(registry).build();

    let err = engine
        .submit_definition(common::arc(def), Params::new(), ExecutionTrigger::Manual)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        FlowgateError::MissingStepRuntime(StepType::Training)
    ));
}

#[test]
fn review_steps_take_no_body() {
    let mut registry = StepRegistry::new();
    let err = registry
        .register_fn(StepType::HumanReview, |_input| async { anyhow::Ok(Params::new()) })
        .unwrap_err();
    assert!(matches!(err, FlowgateError::ConfigError(_)));
}

#[tokio::test(start_paused = true)]
async fn overall_timeout_skips_remaining_steps_and_fails() {
    let def = WorkflowBuilder::new("slow")
        .timeout_secs(1)
        .step(StepBuilder::new("slow", StepType::Training))
        .step(StepBuilder::new("after", StepType::Reporting).after("slow"))
        .build();

    let journal = StepJournal::new();
    let steps = ScriptedSteps::new(journal.clone())
        .script("slow", Script::ok().with_delay(Duration::from_secs(2)));
    let (engine, _) = common::scripted_engine(steps);

    let exec = common::with_timeout(engine.run_definition(common::arc(def), Params::new()))
        .await
        .unwrap();

    assert_eq!(exec.status(), ExecutionStatus::Failed);
    // In-flight work is never interrupted.
    assert_eq!(exec.step("slow").unwrap().status(), StepStatus::Completed);
    assert_eq!(exec.step("after").unwrap().status(), StepStatus::Skipped);
    assert_eq!(journal.attempts_of("after"), 0);
    assert_eq!(exec.log_entries(LogKind::ExecutionTimedOut, None).len(), 1);
}

#[tokio::test]
async fn status_reports_running_review_step() {
    let def = WorkflowBuilder::new("gated")
        .step(StepBuilder::new("prepare", StepType::Ingestion))
        .step(StepBuilder::review("approve", "risk-team").name("Risk sign-off").after("prepare"))
        .step(StepBuilder::new("publish", StepType::Notification).after("approve"))
        .build();

    let (engine, _) = common::scripted_engine(ScriptedSteps::new(StepJournal::new()));
    let id = engine
        .submit_definition(common::arc(def), Params::new(), ExecutionTrigger::Manual)
        .await
        .unwrap();

    // The review step shows up as running once its start has been applied.
    common::with_timeout(common::wait_until(|| {
        engine
            .status(id)
            .map(|r| !r.current_steps.is_empty())
            .unwrap_or(false)
    }))
    .await;
    common::with_timeout(common::wait_until(|| !engine.pending_reviews().is_empty())).await;

    let report = engine.status(id).unwrap();
    assert_eq!(report.status, ExecutionStatus::Running);
    assert_eq!(report.completed_steps, 1);
    assert_eq!(report.total_steps, 3);
    assert_eq!(report.current_steps, vec!["Risk sign-off"]);
    assert!(report.errors.is_empty());

    let request = engine.pending_reviews().remove(0);
    engine
        .submit_review_decision(request.id, ReviewSubmission::approve("risk-team"))
        .unwrap();

    let exec = common::with_timeout(engine.wait_for(id)).await.unwrap();
    assert_eq!(exec.status(), ExecutionStatus::Completed);

    let report = engine.status(id).unwrap();
    assert_eq!(report.completed_steps, 3);
    assert!((report.progress_percent - 100.0).abs() < f64::EPSILON);
    assert!(report.current_steps.is_empty());
}

#[tokio::test]
async fn unknown_execution_ids_are_reported() {
    let engine = Engine::builder().build();
    let id = Uuid::now_v7();

    assert!(matches!(
        engine.status(id),
        Err(FlowgateError::ExecutionNotFound(e)) if e == id
    ));
    assert!(matches!(
        engine.wait_for(id).await,
        Err(FlowgateError::ExecutionNotFound(_))
    ));
    assert!(engine.execution(id).is_err());
}
