//! Test: failing steps halt the run unless marked to continue

use crate::helpers::*;
use brick_runtime::bricks::Brick;
use brick_runtime::core::StepState;
use brick_runtime::error::{BrickError, ErrorKind};
use brick_runtime::execution::{ExecutionEvent, RunOptions};
use brick_runtime::ExecutionStatus;
use serde_json::{json, Value};

#[tokio::test]
async fn test_business_error_halts_pipeline() {
    let recorder = Recorder::new();
    let bricks = vec![
        Brick::effect(RecordingEffect::new("@test/before", &recorder)),
        Brick::effect(FailingEffect::new("@test/fail", "x")),
        Brick::effect(RecordingEffect::new("@test/after", &recorder)),
    ];
    let yaml = r#"
- id: "@test/before"
- id: "@test/fail"
  label: Explode
- id: "@test/after"
"#;

    let scenario = run_pipeline_with_bricks(bricks, headless_platform(), yaml, RunOptions::new(Value::Null)).await;
    let error = scenario.error();

    assert_eq!(error.step_index, 1);
    assert_eq!(error.label, "Explode");
    assert_eq!(error.brick_id, "@test/fail");
    assert_eq!(error.source.to_string(), "x");
    assert_eq!(error.kind(), ErrorKind::Business);
    assert_eq!(error.user_message(), "Explode: x");
    assert_eq!(recorder.brick_ids(), vec!["@test/before"]);
    assert!(scenario.events.iter().any(|event| matches!(
        event,
        ExecutionEvent::RunCompleted {
            status: ExecutionStatus::Failed,
            ..
        }
    )));
}

#[tokio::test]
async fn test_on_error_continue_proceeds() {
    let recorder = Recorder::new();
    let bricks = vec![
        Brick::effect(FailingEffect::new("@test/fail", "flaky")),
        Brick::transformer(RecordingTransformer::new("@test/after", &recorder)),
    ];
    let yaml = r#"
- id: "@test/fail"
  onError: continue
  outputKey: failed
- id: "@test/after"
  config:
    failed: "{{ @failed }}"
"#;

    let scenario = run_pipeline_with_bricks(bricks, headless_platform(), yaml, RunOptions::new(Value::Null)).await;
    let outcome = scenario.outcome();

    assert_eq!(outcome.status(), ExecutionStatus::Completed);
    assert_eq!(outcome.state.failed_steps, 1);
    assert!(matches!(
        &outcome.steps[0].state,
        StepState::Failed { kind: ErrorKind::Business, .. }
    ));
    assert_eq!(recorder.args_of("@test/after").unwrap()["failed"], json!(""));
    assert!(scenario.events.iter().any(|event| matches!(
        event,
        ExecutionEvent::StepFailed { continued: true, .. }
    )));
}

#[tokio::test]
async fn test_invalid_argument_is_prop_error() {
    let yaml = r#"
- id: "@pixiebrix/wait/sleep"
  config:
    timeMillis: soon
"#;

    let scenario = run_pipeline_with_bricks(Vec::new(), headless_platform(), yaml, RunOptions::new(Value::Null)).await;
    match &scenario.error().source {
        BrickError::Prop { brick_id, property, .. } => {
            assert_eq!(brick_id, "@pixiebrix/wait/sleep");
            assert_eq!(property, "timeMillis");
        }
        other => panic!("expected a property error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_unknown_brick_is_not_found() {
    let scenario = run_pipeline_with_bricks(
        Vec::new(),
        headless_platform(),
        "- id: \"@acme/missing\"",
        RunOptions::new(Value::Null),
    )
    .await;

    assert_eq!(scenario.error().source, BrickError::NotFound("@acme/missing".to_string()));
    assert_eq!(scenario.error().kind(), ErrorKind::Unexpected);
}
