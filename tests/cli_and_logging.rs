// tests/cli_and_logging.rs

use std::io::Write;

use clap::Parser;
use flowgate::cli::{CliArgs, Command, LogLevel};
use flowgate::logging::resolve_level;
use flowgate::types::ReviewDecision;
use serde_json::json;
use tempfile::NamedTempFile;

const GATED_TOML: &str = r#"
[workflow]
id = "score-and-approve"

[[step]]
id = "score"
type = "prediction"

[[step]]
id = "approve"
type = "human_review"
depends_on = ["score"]
review = { reviewer = "risk-team" }
"#;

fn write_temp(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("create temp file");
    file.write_all(contents.as_bytes()).expect("write temp file");
    file
}

#[test]
fn level_priority_is_flag_then_env_then_info() {
    assert_eq!(
        resolve_level(Some(LogLevel::Debug), Some("error")),
        tracing::Level::DEBUG
    );
    assert_eq!(resolve_level(None, Some(" Warning ")), tracing::Level::WARN);
    assert_eq!(resolve_level(None, Some("loud")), tracing::Level::INFO);
    assert_eq!(resolve_level(None, None), tracing::Level::INFO);
}

#[test]
fn run_arguments_parse_typed_inputs() {
    let args = CliArgs::try_parse_from([
        "flowgate",
        "run",
        "--workflow",
        "wf.toml",
        "--input",
        "limit=500",
        "--input",
        "region=eu-west",
        "--review-decision",
        "needs-changes",
        "--log-level",
        "trace",
    ])
    .unwrap();

    assert!(matches!(args.log_level, Some(LogLevel::Trace)));
    match args.command {
        Command::Run {
            inputs,
            review_decision,
            reviewer,
            engine_config,
            ..
        } => {
            assert_eq!(
                inputs,
                vec![
                    ("limit".to_string(), json!(500)),
                    ("region".to_string(), json!("eu-west")),
                ]
            );
            assert_eq!(review_decision, ReviewDecision::NeedsChanges);
            assert_eq!(reviewer, "flowgate-cli");
            assert!(engine_config.is_none());
        }
        other => panic!("unexpected command {other:?}"),
    }
}

#[test]
fn malformed_arguments_are_rejected() {
    let no_equals = CliArgs::try_parse_from(["flowgate", "run", "--workflow", "w", "--input", "oops"]);
    assert!(no_equals.is_err());

    let bad_decision = CliArgs::try_parse_from([
        "flowgate",
        "run",
        "--workflow",
        "w",
        "--review-decision",
        "maybe",
    ]);
    assert!(bad_decision.is_err());
}

#[tokio::test]
async fn check_and_run_commands_succeed() {
    let file = write_temp(GATED_TOML);
    let path = file.path().to_str().unwrap();

    let check = CliArgs::try_parse_from(["flowgate", "check", "--workflow", path]).unwrap();
    flowgate::run(check).await.unwrap();

    let run = CliArgs::try_parse_from(["flowgate", "run", "--workflow", path, "--input", "batch=7"])
        .unwrap();
    flowgate_test_utils::with_timeout(flowgate::run(run)).await.unwrap();
}

#[tokio::test]
async fn missing_workflow_file_fails() {
    let args = CliArgs::try_parse_from(["flowgate", "check", "--workflow", "/definitely/not/here.toml"])
        .unwrap();
    assert!(flowgate::run(args).await.is_err());
}
