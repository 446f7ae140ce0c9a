//! Test: cancellation through the run's abort signal

use crate::helpers::*;
use brick_runtime::bricks::Brick;
use brick_runtime::core::StepState;
use brick_runtime::error::BrickError;
use brick_runtime::execution::{AbortSignal, ExecutionEvent, RunOptions};
use brick_runtime::ExecutionStatus;
use serde_json::Value;
use std::time::{Duration, Instant};

#[tokio::test]
async fn test_abort_before_start_runs_nothing() {
    let recorder = Recorder::new();
    let bricks = vec![
        Brick::effect(RecordingEffect::new("@test/first", &recorder)),
        Brick::effect(RecordingEffect::new("@test/second", &recorder)),
    ];
    let signal = AbortSignal::new();
    signal.abort();

    let scenario = run_pipeline_with_bricks(
        bricks,
        headless_platform(),
        "- id: \"@test/first\"\n- id: \"@test/second\"",
        RunOptions::new(Value::Null).with_abort_signal(signal),
    )
    .await;
    let outcome = scenario.outcome();

    assert!(outcome.is_cancelled());
    assert_eq!(outcome.result, None);
    assert!(recorder.calls().is_empty());
    assert!(scenario.started_steps().is_empty());
    assert!(outcome.steps.iter().all(|step| step.state == StepState::Aborted));
    assert!(scenario
        .events
        .iter()
        .any(|event| matches!(event, ExecutionEvent::RunAborted { index: 0, .. })));
}

#[tokio::test]
async fn test_abort_mid_run_lets_in_flight_step_finish() {
    let recorder = Recorder::new();
    let signal = AbortSignal::new();
    let bricks = vec![
        Brick::effect(RecordingEffect::new("@test/first", &recorder)),
        Brick::effect(RecordingEffect::new("@test/cancel", &recorder).aborting(signal.clone())),
        Brick::effect(RecordingEffect::new("@test/never", &recorder)),
    ];
    let yaml = r#"
- id: "@test/first"
- id: "@test/cancel"
- id: "@test/never"
"#;

    let scenario = run_pipeline_with_bricks(
        bricks,
        headless_platform(),
        yaml,
        RunOptions::new(Value::Null).with_abort_signal(signal),
    )
    .await;
    let outcome = scenario.outcome();

    assert_eq!(outcome.status(), ExecutionStatus::Cancelled);
    assert_eq!(recorder.brick_ids(), vec!["@test/first", "@test/cancel"]);
    assert!(matches!(outcome.steps[1].state, StepState::Completed { .. }));
    assert_eq!(outcome.steps[2].state, StepState::Aborted);
    assert_eq!(scenario.started_steps().len(), 2);
}

#[tokio::test]
async fn test_abort_interrupts_sleep() {
    let signal = AbortSignal::new();
    let trigger = signal.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(30)).await;
        trigger.abort();
    });

    let started = Instant::now();
    let scenario = run_pipeline_with_bricks(
        Vec::new(),
        headless_platform(),
        "- id: \"@pixiebrix/wait/sleep\"\n  config:\n    timeMillis: 60000",
        RunOptions::new(Value::Null).with_abort_signal(signal),
    )
    .await;

    assert!(scenario.outcome().is_cancelled());
    assert!(started.elapsed() < Duration::from_secs(5));
}

#[tokio::test]
async fn test_timeout_fails_the_run() {
    let scenario = run_pipeline_with_bricks(
        Vec::new(),
        headless_platform(),
        "- id: \"@pixiebrix/wait/sleep\"\n  config:\n    timeMillis: 60000",
        RunOptions::new(Value::Null).with_timeout(Duration::from_millis(50)),
    )
    .await;

    let error = scenario.error();
    assert_eq!(error.step_index, 0);
    assert_eq!(error.source, BrickError::business("Run did not finish in 50 milliseconds"));
}

#[tokio::test]
async fn test_wait_element_times_out_with_business_error() {
    let page = static_page("https://example.com", "Example");
    let yaml = r#"
- id: "@pixiebrix/wait/element"
  config:
    selector: ".never"
    maxWaitMillis: 50
"#;

    let scenario = run_pipeline_with_bricks(Vec::new(), page_platform(page), yaml, RunOptions::new(Value::Null)).await;
    assert_eq!(
        scenario.error().source,
        BrickError::business("Element .never not available in 50 milliseconds")
    );
}
