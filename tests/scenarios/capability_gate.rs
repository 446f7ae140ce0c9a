//! Test: bricks never run where their capabilities are unavailable

use crate::helpers::*;
use brick_runtime::bricks::Brick;
use brick_runtime::error::{BrickError, ErrorKind};
use brick_runtime::execution::RunOptions;
use brick_runtime::platform::PlatformCapability;
use serde_json::Value;

#[tokio::test]
async fn test_unavailable_capability_fails_before_invocation() {
    let recorder = Recorder::new();
    let bricks = vec![Brick::effect(
        RecordingEffect::new("@test/beep", &recorder).requiring(PlatformCapability::Audio),
    )];

    let scenario = run_pipeline_with_bricks(bricks, headless_platform(), "- id: \"@test/beep\"", RunOptions::new(Value::Null)).await;
    let error = scenario.error();

    assert_eq!(recorder.count("@test/beep"), 0);
    assert_eq!(error.step_index, 0);
    assert_eq!(error.kind(), ErrorKind::Capability);
    assert!(matches!(
        error.source,
        BrickError::CapabilityNotAvailable {
            capability: PlatformCapability::Audio,
            ..
        }
    ));
}

#[tokio::test]
async fn test_dom_reader_requires_a_page() {
    let scenario = run_pipeline_with_bricks(
        Vec::new(),
        headless_platform(),
        "- id: \"@pixiebrix/document-context\"",
        RunOptions::new(Value::Null),
    )
    .await;

    assert!(matches!(
        scenario.error().source,
        BrickError::CapabilityNotAvailable {
            capability: PlatformCapability::Dom,
            ..
        }
    ));
}

#[tokio::test]
async fn test_element_root_mode_resolves_selector() {
    use brick_runtime::platform::{ElementData, PageAdapter};
    use serde_json::json;

    let page = static_page("https://example.com", "Example");
    page.document().insert(".price", ElementData::with_text("$10"));
    let yaml = r#"
- id: "@pixiebrix/element-text"
  rootMode: element
  root: ".price"
"#;

    let scenario = run_pipeline_with_bricks(Vec::new(), page_platform(page.clone()), yaml, RunOptions::new(Value::Null)).await;
    assert_eq!(scenario.outcome().result, Some(json!({"text": "$10"})));

    let missing = r#"
- id: "@pixiebrix/element-text"
  rootMode: element
  root: ".missing"
"#;
    let scenario = run_pipeline_with_bricks(Vec::new(), page_platform(page), missing, RunOptions::new(Value::Null)).await;
    assert_eq!(scenario.error().source, BrickError::business("No element found for selector: .missing"));
}
