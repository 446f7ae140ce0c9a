//! Test: steps run one at a time, in declaration order

use crate::helpers::*;
use brick_runtime::bricks::Brick;
use brick_runtime::execution::RunOptions;
use brick_runtime::ExecutionStatus;
use serde_json::{json, Value};
use std::time::Duration;

#[tokio::test]
async fn test_steps_never_overlap() {
    let recorder = Recorder::new();
    let bricks = ["@test/a", "@test/b", "@test/c", "@test/d"]
        .into_iter()
        .map(|id| Brick::transformer(RecordingTransformer::new(id, &recorder).with_delay(Duration::from_millis(5))))
        .collect();

    let yaml = r#"
- id: "@test/a"
- id: "@test/b"
- id: "@test/c"
- id: "@test/d"
"#;
    let scenario = run_pipeline_with_bricks(bricks, headless_platform(), yaml, RunOptions::new(Value::Null)).await;
    assert_eq!(scenario.outcome().status(), ExecutionStatus::Completed);

    let calls = recorder.calls();
    assert_eq!(recorder.brick_ids(), vec!["@test/a", "@test/b", "@test/c", "@test/d"]);
    for pair in calls.windows(2) {
        assert!(pair[1].started >= pair[0].finished, "steps overlapped");
    }

    let indexes: Vec<usize> = scenario.started_steps().into_iter().map(|(index, _)| index).collect();
    assert_eq!(indexes, vec![0, 1, 2, 3]);
}

/// 0ms sleep is a no-op
#[tokio::test]
async fn test_zero_sleep_completes_immediately() {
    let yaml = r#"
- id: "@pixiebrix/wait/sleep"
  config:
    timeMillis: 0
"#;
    let started = std::time::Instant::now();
    let scenario = run_pipeline_with_bricks(Vec::new(), headless_platform(), yaml, RunOptions::new(Value::Null)).await;

    let outcome = scenario.outcome();
    assert_eq!(outcome.status(), ExecutionStatus::Completed);
    assert_eq!(outcome.result, Some(Value::Null));
    assert!(started.elapsed() < Duration::from_secs(1));
}

#[tokio::test]
async fn test_result_is_output_key_value_when_designated() {
    let recorder = Recorder::new();
    let bricks = vec![
        Brick::transformer(RecordingTransformer::new("@test/first", &recorder).returning(json!("kept"))),
        Brick::transformer(RecordingTransformer::new("@test/second", &recorder).returning(json!("last"))),
    ];
    let yaml = r#"
- id: "@test/first"
  outputKey: first
- id: "@test/second"
"#;

    let scenario = run_pipeline_with_bricks(
        bricks.clone(),
        headless_platform(),
        yaml,
        RunOptions::new(Value::Null).with_output_key("first"),
    )
    .await;
    assert_eq!(scenario.outcome().result, Some(json!("kept")));

    let scenario = run_pipeline_with_bricks(bricks, headless_platform(), yaml, RunOptions::new(Value::Null)).await;
    assert_eq!(scenario.outcome().result, Some(json!("last")));
}

#[tokio::test]
async fn test_run_numbers_increase_per_component() {
    use brick_runtime::bricks::BrickRegistry;
    use brick_runtime::core::BrickPipeline;
    use brick_runtime::execution::PipelineRunner;
    use std::sync::Arc;

    let runner = PipelineRunner::new(Arc::new(BrickRegistry::with_builtins()), headless_platform());
    let pipeline = BrickPipeline::from_yaml("- id: \"@pixiebrix/identity\"").unwrap();
    let options = RunOptions {
        mod_id: Some("@acme/mod".to_string()),
        component_id: Some("main".to_string()),
        ..RunOptions::new(Value::Null)
    };

    let first = runner.run(&pipeline, options.clone()).await.unwrap();
    let second = runner.run(&pipeline, options).await.unwrap();
    assert_eq!(first.run_number, 1);
    assert_eq!(second.run_number, 2);
    assert_ne!(first.run_id(), second.run_id());
}
