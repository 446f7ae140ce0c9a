//! Test: control-flow bricks run sub-pipelines inside the parent run

use crate::helpers::*;
use brick_runtime::bricks::Brick;
use brick_runtime::error::BrickError;
use brick_runtime::execution::{AbortSignal, ExecutionEvent, RunOptions};
use serde_json::{json, Value};

#[tokio::test]
async fn test_for_each_binds_each_element() {
    let recorder = Recorder::new();
    let bricks = vec![Brick::transformer(RecordingTransformer::new("@test/body", &recorder))];
    let yaml = r#"
- id: "@pixiebrix/for-each"
  outputKey: last
  config:
    elements:
      __type__: var
      __value__: "@input.items"
    elementKey: item
    body:
      __type__: pipeline
      __value__:
        - id: "@test/body"
          config:
            value: "{{ @item }}"
"#;

    let scenario = run_pipeline_with_bricks(bricks, headless_platform(), yaml, RunOptions::new(json!({"items": ["a", "b", "c"]}))).await;
    let outcome = scenario.outcome();

    let values: Vec<Value> = recorder.calls().into_iter().map(|call| call.args["value"].clone()).collect();
    assert_eq!(values, vec![json!("a"), json!("b"), json!("c")]);
    assert_eq!(outcome.result, Some(json!({"value": "c"})));

    // nested steps are traced with their own call numbers
    let nested: Vec<u64> = outcome.steps.iter().filter(|step| step.depth == 1).map(|step| step.call).collect();
    assert_eq!(nested.len(), 3);
    assert!(nested.windows(2).all(|pair| pair[0] < pair[1]));
    assert_eq!(outcome.top_level_steps().len(), 1);
    assert!(scenario
        .events
        .iter()
        .any(|event| matches!(event, ExecutionEvent::StepStarted { depth: 1, .. })));
}

#[tokio::test]
async fn test_nested_bindings_do_not_leak() {
    let recorder = Recorder::new();
    let bricks = vec![Brick::transformer(RecordingTransformer::new("@test/after", &recorder))];
    let yaml = r#"
- id: "@pixiebrix/for-each"
  config:
    elements: [1]
    body:
      __type__: pipeline
      __value__:
        - id: "@pixiebrix/identity"
          outputKey: inner
          config:
            value: "{{ @element }}"
- id: "@test/after"
  config:
    inner: "{{ @inner }}"
    element: "{{ @element }}"
"#;

    let scenario = run_pipeline_with_bricks(bricks, headless_platform(), yaml, RunOptions::new(Value::Null)).await;
    scenario.outcome();

    let args = recorder.args_of("@test/after").unwrap();
    assert_eq!(args["inner"], json!(""));
    assert_eq!(args["element"], json!(""));
}

#[tokio::test]
async fn test_if_else_picks_branch() {
    let recorder = Recorder::new();
    let bricks = vec![
        Brick::transformer(RecordingTransformer::new("@test/yes", &recorder).returning(json!("yes"))),
        Brick::transformer(RecordingTransformer::new("@test/no", &recorder).returning(json!("no"))),
    ];
    let yaml = r#"
- id: "@pixiebrix/if-else"
  config:
    condition: "{{ @input.flag }}"
    if:
      __type__: pipeline
      __value__:
        - id: "@test/yes"
    else:
      __type__: pipeline
      __value__:
        - id: "@test/no"
"#;

    let scenario = run_pipeline_with_bricks(bricks.clone(), headless_platform(), yaml, RunOptions::new(json!({"flag": "no"}))).await;
    assert_eq!(scenario.outcome().result, Some(json!("no")));

    let scenario = run_pipeline_with_bricks(bricks, headless_platform(), yaml, RunOptions::new(json!({"flag": true}))).await;
    assert_eq!(scenario.outcome().result, Some(json!("yes")));
    assert_eq!(recorder.brick_ids(), vec!["@test/no", "@test/yes"]);
}

#[tokio::test]
async fn test_try_except_binds_error() {
    let recorder = Recorder::new();
    let bricks = vec![
        Brick::effect(FailingEffect::new("@test/fail", "boom")),
        Brick::transformer(RecordingTransformer::new("@test/recover", &recorder)),
    ];
    let yaml = r#"
- id: "@pixiebrix/try-except"
  config:
    try:
      __type__: pipeline
      __value__:
        - id: "@test/fail"
    except:
      __type__: pipeline
      __value__:
        - id: "@test/recover"
          config:
            message: "{{ @error.message }}"
            name: "{{ @error.name }}"
"#;

    let scenario = run_pipeline_with_bricks(bricks, headless_platform(), yaml, RunOptions::new(Value::Null)).await;
    assert_eq!(
        scenario.outcome().result,
        Some(json!({"message": "boom", "name": "BusinessError"}))
    );
}

#[tokio::test]
async fn test_try_except_does_not_swallow_aborts() {
    let recorder = Recorder::new();
    let signal = AbortSignal::new();
    let bricks = vec![
        Brick::effect(RecordingEffect::new("@test/cancel", &recorder).aborting(signal.clone())),
        Brick::effect(RecordingEffect::new("@test/recover", &recorder)),
    ];
    let yaml = r#"
- id: "@pixiebrix/try-except"
  config:
    try:
      __type__: pipeline
      __value__:
        - id: "@test/cancel"
        - id: "@pixiebrix/identity"
    except:
      __type__: pipeline
      __value__:
        - id: "@test/recover"
"#;

    let scenario = run_pipeline_with_bricks(
        bricks,
        headless_platform(),
        yaml,
        RunOptions::new(Value::Null).with_abort_signal(signal),
    )
    .await;

    assert!(scenario.outcome().is_cancelled());
    assert_eq!(recorder.brick_ids(), vec!["@test/cancel"]);
}

#[tokio::test]
async fn test_repeat_collects_outputs() {
    let yaml = r#"
- id: "@pixiebrix/repeat"
  config:
    count: 3
    body:
      __type__: pipeline
      __value__:
        - id: "@pixiebrix/identity"
          config:
            index:
              __type__: var
              __value__: "@index"
"#;

    let scenario = run_pipeline_with_bricks(Vec::new(), headless_platform(), yaml, RunOptions::new(Value::Null)).await;
    assert_eq!(
        scenario.outcome().result,
        Some(json!([{"index": 0}, {"index": 1}, {"index": 2}]))
    );
}

#[tokio::test]
async fn test_nested_failure_surfaces_from_parent_step() {
    let bricks = vec![Brick::effect(FailingEffect::new("@test/fail", "inner failure"))];
    let yaml = r#"
- id: "@pixiebrix/identity"
- id: "@pixiebrix/for-each"
  config:
    elements: [1, 2]
    body:
      __type__: pipeline
      __value__:
        - id: "@test/fail"
"#;

    let scenario = run_pipeline_with_bricks(bricks, headless_platform(), yaml, RunOptions::new(Value::Null)).await;
    let error = scenario.error();
    assert_eq!(error.step_index, 1);
    assert_eq!(error.brick_id, "@pixiebrix/for-each");
    assert_eq!(error.source, BrickError::business("inner failure"));
}
