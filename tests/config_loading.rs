// tests/config_loading.rs

mod common;

use std::io::Write;
use std::time::Duration;

use flowgate::config::{
    TriggerDefinition, load_and_validate, load_engine_config, parse_definition,
};
use flowgate::errors::{FlowgateError, GraphError};
use flowgate::types::{BackoffStrategy, StepType};
use tempfile::NamedTempFile;

const RETRAIN_TOML: &str = r#"
[workflow]
id = "retrain-credit-model"
name = "Credit model retraining"
timeout_secs = 3600

[retry]
max_retries = 4
backoff = "linear"
base_delay_ms = 250
max_delay_ms = 2000

[[trigger]]
kind = "drift"
model_id = "credit-v2"

[[trigger]]
kind = "schedule"
cron = "0 3 * * *"

[[step]]
id = "ingest"
type = "ingestion"
inputs = { source = "leads", limit = 500 }

[[step]]
id = "train"
name = "Train model"
type = "training"
depends_on = ["ingest"]

[[step]]
id = "check"
type = "compliance"
depends_on = ["train"]

[[step]]
id = "approve"
type = "human_review"
depends_on = ["check"]
review = { reviewer = "risk-team", deadline_secs = 86400 }
"#;

fn write_temp(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("create temp file");
    file.write_all(contents.as_bytes()).expect("write temp file");
    file
}

#[test]
fn loads_a_full_workflow_file() {
    common::init_tracing();
    let file = write_temp(RETRAIN_TOML);

    let def = load_and_validate(file.path()).expect("valid workflow");

    assert_eq!(def.id(), "retrain-credit-model");
    assert_eq!(def.name(), "Credit model retraining");
    assert_eq!(def.timeout(), Some(Duration::from_secs(3600)));

    let retry = def.retry();
    assert_eq!(retry.max_attempts, 4, "max_retries is an alias");
    assert_eq!(retry.backoff, BackoffStrategy::Linear);
    assert_eq!(retry.base_delay_ms, 250);
    assert_eq!(retry.max_delay_ms, Some(2000));

    assert_eq!(
        def.triggers(),
        &[
            TriggerDefinition::Drift {
                model_id: "credit-v2".into()
            },
            TriggerDefinition::Schedule {
                cron: "0 3 * * *".into()
            },
        ]
    );

    let ids: Vec<&str> = def.steps().iter().map(|s| s.id.as_str()).collect();
    assert_eq!(ids, vec!["ingest", "train", "check", "approve"]);

    let ingest = def.step("ingest").unwrap();
    assert_eq!(ingest.inputs["source"], "leads");
    assert_eq!(ingest.inputs["limit"], 500);
    assert_eq!(ingest.display_name(), "ingest");

    assert_eq!(def.step("train").unwrap().display_name(), "Train model");
    assert_eq!(def.step("check").unwrap().step_type, StepType::Validation);

    let review = def.step("approve").unwrap().review.as_ref().unwrap();
    assert_eq!(review.reviewer, "risk-team");
    assert_eq!(review.deadline_secs, 86400);
}

#[test]
fn retry_defaults_apply_when_section_missing() {
    let def = parse_definition(
        r#"
        [workflow]
        id = "tiny"

        [[step]]
        id = "only"
        type = "reporting"
        "#,
    )
    .unwrap();

    let retry = def.retry();
    assert_eq!(retry.max_attempts, 3);
    assert_eq!(retry.backoff, BackoffStrategy::Exponential);
    assert_eq!(retry.base_delay_ms, 1000);
    assert!(retry.jitter);
    assert_eq!(def.timeout(), None);
}

#[test]
fn rejects_cycles() {
    let err = parse_definition(
        r#"
        [workflow]
        id = "loop"

        [[step]]
        id = "a"
        type = "ingestion"
        depends_on = ["c"]

        [[step]]
        id = "b"
        type = "training"
        depends_on = ["a"]

        [[step]]
        id = "c"
        type = "prediction"
        depends_on = ["b"]
        "#,
    )
    .unwrap_err();

    assert!(
        matches!(err, FlowgateError::Graph(GraphError::Cycle(_))),
        "unexpected error: {err}"
    );
}

#[test]
fn rejects_unknown_and_self_dependencies() {
    let unknown = common::WorkflowBuilder::new("wf")
        .step(common::StepBuilder::new("a", StepType::Ingestion).after("ghost"))
        .try_build()
        .unwrap_err();
    assert!(matches!(
        unknown,
        FlowgateError::Graph(GraphError::UnknownDependency { ref step, ref dependency })
            if step == "a" && dependency == "ghost"
    ));

    let selfish = common::WorkflowBuilder::new("wf")
        .step(common::StepBuilder::new("a", StepType::Ingestion).after("a"))
        .try_build()
        .unwrap_err();
    assert!(matches!(
        selfish,
        FlowgateError::Graph(GraphError::SelfDependency(ref s)) if s == "a"
    ));
}

#[test]
fn rejects_duplicate_step_ids() {
    let err = common::WorkflowBuilder::new("wf")
        .step(common::StepBuilder::new("a", StepType::Ingestion))
        .step(common::StepBuilder::new("a", StepType::Training))
        .try_build()
        .unwrap_err();
    assert!(matches!(
        err,
        FlowgateError::Graph(GraphError::DuplicateStep(ref s)) if s == "a"
    ));
}

#[test]
fn rejects_structural_config_errors() {
    let empty = common::WorkflowBuilder::new("wf").try_build().unwrap_err();
    assert!(matches!(empty, FlowgateError::ConfigError(_)));

    let zero_attempts = common::WorkflowBuilder::new("wf")
        .max_attempts(0)
        .step(common::StepBuilder::new("a", StepType::Ingestion))
        .try_build()
        .unwrap_err();
    assert!(matches!(zero_attempts, FlowgateError::ConfigError(_)));

    let mut review_without_settings = common::StepBuilder::review("r", "alice").build();
    review_without_settings.review = None;
    let mut raw = common::WorkflowBuilder::new("wf").raw();
    raw.steps.push(review_without_settings);
    let err = flowgate::config::WorkflowDefinition::try_from(raw).unwrap_err();
    assert!(matches!(err, FlowgateError::ConfigError(_)));
}

#[test]
fn malformed_toml_is_a_toml_error() {
    let err = parse_definition("[workflow\nid = 1").unwrap_err();
    assert!(matches!(err, FlowgateError::TomlError(_)));
}

#[test]
fn missing_file_is_an_io_error() {
    let err = load_and_validate("/definitely/not/here.toml").unwrap_err();
    assert!(matches!(err, FlowgateError::IoError(_)));
}

#[test]
fn loads_engine_config_with_models() {
    let file = write_temp(
        r#"
        [engine]
        event_channel_capacity = 8

        [[model]]
        model_id = "credit-v2"
        threshold = 0.2
        retraining_workflow = "retrain-credit-model"
        features = ["loan_amount", "income"]
        data_quality_threshold = 0.05
        "#,
    );

    let cfg = load_engine_config(file.path()).unwrap();
    assert_eq!(cfg.engine.event_channel_capacity, 8);
    assert_eq!(cfg.engine.drift_check_interval_secs, 3600);
    assert_eq!(cfg.engine.history_limit, 1024);
    assert_eq!(cfg.models.len(), 1);
    assert_eq!(cfg.models[0].features, vec!["loan_amount", "income"]);
    assert_eq!(cfg.models[0].data_quality_threshold, Some(0.05));
}

#[test]
fn rejects_invalid_engine_config() {
    let duplicate = write_temp(
        r#"
        [[model]]
        model_id = "m"
        threshold = 0.2
        retraining_workflow = "wf"

        [[model]]
        model_id = "m"
        threshold = 0.3
        retraining_workflow = "wf"
        "#,
    );
    assert!(matches!(
        load_engine_config(duplicate.path()).unwrap_err(),
        FlowgateError::ConfigError(_)
    ));

    let no_history = write_temp(
        r#"
        [engine]
        history_limit = 0
        "#,
    );
    assert!(matches!(
        load_engine_config(no_history.path()).unwrap_err(),
        FlowgateError::ConfigError(_)
    ));

    let bad_threshold = write_temp(
        r#"
        [[model]]
        model_id = "m"
        threshold = 0.0
        retraining_workflow = "wf"
        "#,
    );
    assert!(matches!(
        load_engine_config(bad_threshold.path()).unwrap_err(),
        FlowgateError::ConfigError(_)
    ));
}
