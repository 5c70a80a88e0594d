// tests/review_gate.rs

mod common;
use crate::common::{ScriptedSteps, StepBuilder, StepJournal, WorkflowBuilder};

use std::sync::Arc;

use chrono::{Duration as ChronoDuration, Utc};
use flowgate::engine::Engine;
use flowgate::errors::FlowgateError;
use flowgate::execution::{ExecutionStatus, ExecutionTrigger, LogKind, StepStatus};
use flowgate::review::{ReviewGate, ReviewStatus, ReviewSubmission};
use flowgate::types::{Params, StepType};
use flowgate_test_utils::fake_drift::RecordingNotifier;
use serde_json::json;
use uuid::Uuid;

fn gated_workflow() -> flowgate::config::WorkflowDefinition {
    WorkflowBuilder::new("gated")
        .max_attempts(3)
        .step(StepBuilder::new("score", StepType::Prediction))
        .step(StepBuilder::review("approve", "risk-team").after("score"))
        .step(StepBuilder::new("notify", StepType::Notification).after("approve"))
        .build()
}

fn engine_with(notifier: Arc<RecordingNotifier>, journal: Arc<StepJournal>) -> Engine {
    Engine::builder()
        .registry(ScriptedSteps::new(journal).into_registry())
        .notifier(notifier)
        .build()
}

async fn wait_for_pending(engine: &Engine) -> flowgate::review::ReviewRequest {
    common::with_timeout(common::wait_until(|| !engine.pending_reviews().is_empty())).await;
    engine.pending_reviews().remove(0)
}

#[tokio::test]
async fn approval_completes_step_with_reviewer_changes() {
    common::init_tracing();

    let notifier = Arc::new(RecordingNotifier::new());
    let journal = StepJournal::new();
    let engine = engine_with(notifier.clone(), journal.clone());

    let id = engine
        .submit_definition(common::arc(gated_workflow()), Params::new(), ExecutionTrigger::Manual)
        .await
        .unwrap();

    let request = wait_for_pending(&engine).await;
    assert_eq!(request.execution_id, id);
    assert_eq!(request.step_id, "approve");
    assert_eq!(request.reviewer, "risk-team");
    assert_eq!(request.status, ReviewStatus::Pending);
    assert_eq!(request.deadline - request.created_at, ChronoDuration::seconds(3600));

    // Nothing downstream runs while the gate is closed.
    assert_eq!(journal.attempts_of("notify"), 0);
    assert_eq!(engine.execution(id).unwrap().status(), ExecutionStatus::Running);

    common::with_timeout(common::wait_until(|| !notifier.notified().is_empty())).await;
    let notified = notifier.notified();
    assert_eq!(notified.len(), 1);
    assert_eq!(notified[0].0, "risk-team");

    let mut changes = Params::new();
    changes.insert("cutoff".into(), json!(0.65));
    let resolved = engine
        .submit_review_decision(
            request.id,
            ReviewSubmission::approve("risk-team")
                .with_comments("ok with tweak")
                .with_changes(changes),
        )
        .unwrap();
    assert_eq!(resolved.status, ReviewStatus::Approved);

    let exec = common::with_timeout(engine.wait_for(id)).await.unwrap();
    assert_eq!(exec.status(), ExecutionStatus::Completed);

    let approve = exec.step("approve").unwrap();
    assert_eq!(approve.status(), StepStatus::Completed);
    assert_eq!(approve.output()["cutoff"], 0.65);
    assert_eq!(journal.input_of("notify").unwrap().upstream["approve"]["cutoff"], 0.65);

    assert_eq!(exec.log_entries(LogKind::ReviewRequested, Some("approve")).len(), 1);
    assert_eq!(exec.log_entries(LogKind::ReviewResolved, Some("approve")).len(), 1);
    assert!(engine.pending_reviews().is_empty());
    assert_eq!(
        engine.review(request.id).unwrap().status,
        ReviewStatus::Approved
    );
}

#[tokio::test]
async fn needs_changes_fails_without_retry() {
    let notifier = Arc::new(RecordingNotifier::new());
    let journal = StepJournal::new();
    let engine = engine_with(notifier, journal.clone());

    let id = engine
        .submit_definition(common::arc(gated_workflow()), Params::new(), ExecutionTrigger::Manual)
        .await
        .unwrap();

    let request = wait_for_pending(&engine).await;
    engine
        .submit_review_decision(
            request.id,
            ReviewSubmission::needs_changes("risk-team").with_comments("recheck inputs"),
        )
        .unwrap();

    let exec = common::with_timeout(engine.wait_for(id)).await.unwrap();
    assert_eq!(exec.status(), ExecutionStatus::Failed);

    let approve = exec.step("approve").unwrap();
    assert_eq!(approve.status(), StepStatus::Failed);
    assert_eq!(approve.attempts(), 1, "review steps are never retried");
    let error = approve.error().unwrap();
    assert!(error.contains("needs_changes"), "{error}");
    assert!(error.contains("recheck inputs"), "{error}");

    assert_eq!(exec.step("notify").unwrap().status(), StepStatus::Skipped);
    assert_eq!(exec.log_entries(LogKind::ReviewRequested, None).len(), 1);
    assert!(exec.log_entries(LogKind::StepRetryScheduled, None).is_empty());
}

#[tokio::test]
async fn rejection_fails_the_execution() {
    let engine = engine_with(Arc::new(RecordingNotifier::new()), StepJournal::new());
    let id = engine
        .submit_definition(common::arc(gated_workflow()), Params::new(), ExecutionTrigger::Manual)
        .await
        .unwrap();

    let request = wait_for_pending(&engine).await;
    engine
        .submit_review_decision(request.id, ReviewSubmission::reject("risk-team"))
        .unwrap();

    let exec = common::with_timeout(engine.wait_for(id)).await.unwrap();
    assert_eq!(exec.status(), ExecutionStatus::Failed);
    assert!(exec.errors()[0].starts_with("approve: review rejected"));
}

#[tokio::test]
async fn notification_failure_does_not_fail_the_step() {
    let notifier = Arc::new(RecordingNotifier::failing());
    let engine = engine_with(notifier.clone(), StepJournal::new());
    let id = engine
        .submit_definition(common::arc(gated_workflow()), Params::new(), ExecutionTrigger::Manual)
        .await
        .unwrap();

    let request = wait_for_pending(&engine).await;
    common::with_timeout(common::wait_until(|| notifier.notified().len() == 1)).await;

    engine
        .submit_review_decision(request.id, ReviewSubmission::approve("risk-team"))
        .unwrap();
    let exec = common::with_timeout(engine.wait_for(id)).await.unwrap();
    assert_eq!(exec.status(), ExecutionStatus::Completed);
}

#[tokio::test]
async fn second_decision_and_unknown_ids_are_rejected() {
    let engine = engine_with(Arc::new(RecordingNotifier::new()), StepJournal::new());
    let id = engine
        .submit_definition(common::arc(gated_workflow()), Params::new(), ExecutionTrigger::Manual)
        .await
        .unwrap();

    let request = wait_for_pending(&engine).await;
    // A different identity is accepted and kept for audit.
    engine
        .submit_review_decision(request.id, ReviewSubmission::approve("bob"))
        .unwrap();

    let again = engine
        .submit_review_decision(request.id, ReviewSubmission::reject("risk-team"))
        .unwrap_err();
    assert!(matches!(again, FlowgateError::ReviewAlreadyResolved(r) if r == request.id));

    let unknown = engine
        .submit_review_decision(Uuid::now_v7(), ReviewSubmission::approve("risk-team"))
        .unwrap_err();
    assert!(matches!(unknown, FlowgateError::ReviewNotFound(_)));

    common::with_timeout(engine.wait_for(id)).await.unwrap();
    assert_eq!(
        engine.review(request.id).unwrap().decided_by.as_deref(),
        Some("bob")
    );
}

#[tokio::test]
async fn overdue_requests_raise_warnings_only() {
    let gate = ReviewGate::new();
    let step = StepBuilder::review("approve", "risk-team")
        .deadline_secs(60)
        .build();
    let execution_id = Uuid::now_v7();
    let opened_at = Utc::now();

    let (request, mut decision) = gate.open(execution_id, &step, opened_at);

    assert!(gate.overdue(opened_at + ChronoDuration::seconds(30)).is_empty());

    let warnings = gate.overdue(opened_at + ChronoDuration::seconds(90));
    assert_eq!(warnings.len(), 1);
    assert_eq!(warnings[0].request_id, request.id);
    assert_eq!(warnings[0].execution_id, execution_id);
    assert_eq!(warnings[0].reviewer, "risk-team");
    assert_eq!(warnings[0].overdue_by, ChronoDuration::seconds(30));

    // Still pending: nothing was resolved automatically.
    assert!(decision.try_recv().is_err());
    assert_eq!(gate.pending_for_execution(execution_id).len(), 1);

    gate.submit_decision(request.id, ReviewSubmission::approve("risk-team"), Utc::now())
        .unwrap();
    let resolved = decision.await.unwrap();
    assert_eq!(resolved.status, ReviewStatus::Approved);
    assert!(gate.overdue(opened_at + ChronoDuration::days(10)).is_empty());
}
