//! Test: outputs flow into later steps through the run context

use crate::helpers::*;
use brick_runtime::bricks::Brick;
use brick_runtime::execution::RunOptions;
use brick_runtime::platform::PageAdapter;
use serde_json::{json, Value};

#[tokio::test]
async fn test_output_key_feeds_later_template() {
    let recorder = Recorder::new();
    let bricks = vec![
        Brick::transformer(RecordingTransformer::new("@test/produce", &recorder).returning(json!(5))),
        Brick::transformer(RecordingTransformer::new("@test/consume", &recorder)),
    ];
    let yaml = r#"
- id: "@test/produce"
  outputKey: a
- id: "@test/consume"
  config:
    x: "{{ @a }}"
    exact:
      __type__: var
      __value__: "@a"
"#;

    let scenario = run_pipeline_with_bricks(bricks, headless_platform(), yaml, RunOptions::new(Value::Null)).await;
    scenario.outcome();

    let args = recorder.args_of("@test/consume").unwrap();
    assert_eq!(args["x"], json!("5"));
    assert_eq!(args["exact"], json!(5));
}

#[tokio::test]
async fn test_schema_coerces_rendered_numbers() {
    let recorder = Recorder::new();
    let bricks = vec![
        Brick::transformer(RecordingTransformer::new("@test/produce", &recorder).returning(json!(5))),
        Brick::transformer(
            RecordingTransformer::new("@test/consume", &recorder)
                .with_input_schema(json!({"type": "object", "properties": {"x": {"type": "integer"}}})),
        ),
    ];
    let yaml = r#"
- id: "@test/produce"
  outputKey: a
- id: "@test/consume"
  config:
    x: "{{ @a }}"
"#;

    let scenario = run_pipeline_with_bricks(bricks, headless_platform(), yaml, RunOptions::new(Value::Null)).await;
    scenario.outcome();
    assert_eq!(recorder.args_of("@test/consume").unwrap()["x"], json!(5));
}

#[tokio::test]
async fn test_missing_reference_in_numeric_field_is_absent() {
    let recorder = Recorder::new();
    let bricks = vec![Brick::transformer(
        RecordingTransformer::new("@test/consume", &recorder).with_input_schema(json!({
            "type": "object",
            "properties": {"limit": {"type": "integer"}, "ratio": {"type": "number"}}
        })),
    )];
    let yaml = r#"
- id: "@pixiebrix/wait/sleep"
  config:
    timeMillis: "{{ @input.delay }}"
- id: "@test/consume"
  config:
    limit: "{{ @input.limit }}"
    ratio: "{{ @input.ratio }}"
"#;

    let scenario = run_pipeline_with_bricks(bricks, headless_platform(), yaml, RunOptions::new(json!({}))).await;
    assert_eq!(scenario.outcome().state.completed_steps, 2);
    assert_eq!(recorder.args_of("@test/consume").unwrap(), json!({}));
}

#[tokio::test]
async fn test_input_and_options_are_bound() {
    let recorder = Recorder::new();
    let bricks = vec![Brick::transformer(RecordingTransformer::new("@test/consume", &recorder))];
    let yaml = r#"
- id: "@test/consume"
  config:
    greeting: "{{ @options.greeting }}, {{ @input.name | upper }}"
    counter: "{{ @mod.counter }}"
"#;

    let mut mod_options = serde_json::Map::new();
    mod_options.insert("greeting".to_string(), json!("Hello"));
    let mut variables = serde_json::Map::new();
    variables.insert("counter".to_string(), json!(3));

    let options = RunOptions::new(json!({"name": "ada"}))
        .with_options(mod_options)
        .with_variables(variables);
    let scenario = run_pipeline_with_bricks(bricks, headless_platform(), yaml, options).await;
    scenario.outcome();

    let args = recorder.args_of("@test/consume").unwrap();
    assert_eq!(args["greeting"], json!("Hello, ADA"));
    assert_eq!(args["counter"], json!("3"));
}

/// The context holds a snapshot of the title read at step 1
#[tokio::test]
async fn test_context_is_a_snapshot_of_read_values() {
    let page = static_page("https://example.com/article", "Before");
    let yaml = r#"
- id: "@pixiebrix/document-context"
  outputKey: context
- id: "@pixiebrix/document/set-title"
  config:
    title: After
- id: "@pixiebrix/identity"
  outputKey: title
  config:
    title: "{{ @context.title }}"
"#;

    let scenario = run_pipeline_with_bricks(Vec::new(), page_platform(page.clone()), yaml, RunOptions::new(Value::Null)).await;
    let outcome = scenario.outcome();

    assert_eq!(outcome.result, Some(json!({"title": "Before"})));
    assert_eq!(outcome.context.get("context").unwrap()["url"], json!("https://example.com/article"));
    assert_eq!(page.document().title(), "After");
}
