//! Test: falsy guards skip steps without binding their output

use crate::helpers::*;
use brick_runtime::bricks::Brick;
use brick_runtime::core::StepState;
use brick_runtime::execution::{ExecutionEvent, RunOptions};
use serde_json::{json, Value};

#[tokio::test]
async fn test_falsy_guard_skips_step() {
    let recorder = Recorder::new();
    let bricks = vec![
        Brick::transformer(RecordingTransformer::new("@test/guarded", &recorder).returning(json!("secret"))),
        Brick::transformer(RecordingTransformer::new("@test/after", &recorder)),
    ];
    let yaml = r#"
- id: "@test/guarded"
  if: "{{ @input.enabled }}"
  outputKey: guarded
- id: "@test/after"
  config:
    seen: "{{ @guarded }}"
"#;

    let scenario = run_pipeline_with_bricks(bricks, headless_platform(), yaml, RunOptions::new(json!({"enabled": false}))).await;
    let outcome = scenario.outcome();

    assert_eq!(recorder.count("@test/guarded"), 0);
    assert_eq!(recorder.args_of("@test/after").unwrap()["seen"], json!(""));
    assert!(!outcome.context.contains("guarded"));
    assert_eq!(outcome.state.skipped_steps, 1);
    assert_eq!(outcome.state.completed_steps, 1);
    assert!(matches!(
        &outcome.steps[0].state,
        StepState::Skipped { reason } if reason == "condition"
    ));
    assert!(scenario
        .events
        .iter()
        .any(|event| matches!(event, ExecutionEvent::StepSkipped { index: 0, .. })));
}

#[tokio::test]
async fn test_truthy_guard_runs_step() {
    let recorder = Recorder::new();
    let bricks = vec![Brick::transformer(RecordingTransformer::new("@test/guarded", &recorder))];
    let yaml = r#"
- id: "@test/guarded"
  if: "{{ @input.enabled }}"
"#;

    let scenario = run_pipeline_with_bricks(bricks, headless_platform(), yaml, RunOptions::new(json!({"enabled": true}))).await;
    scenario.outcome();
    assert_eq!(recorder.count("@test/guarded"), 1);
}

#[tokio::test]
async fn test_dry_run_skips_impure_steps_only() {
    let recorder = Recorder::new();
    let bricks = vec![
        Brick::transformer(RecordingTransformer::new("@test/pure", &recorder)),
        Brick::effect(RecordingEffect::new("@test/impure", &recorder)),
    ];
    let yaml = r#"
- id: "@test/impure"
- id: "@test/pure"
"#;

    let scenario = run_pipeline_with_bricks(
        bricks,
        headless_platform(),
        yaml,
        RunOptions::new(Value::Null).with_dry_run(true),
    )
    .await;
    let outcome = scenario.outcome();

    assert_eq!(recorder.brick_ids(), vec!["@test/pure"]);
    assert!(matches!(
        &outcome.steps[0].state,
        StepState::Skipped { reason } if reason == "dry run"
    ));
}
