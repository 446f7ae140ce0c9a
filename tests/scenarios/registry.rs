//! Test: registry lookups and brick contract defaults

use crate::helpers::*;
use brick_runtime::bricks::{Brick, BrickFactory, BrickRegistry};
use brick_runtime::error::BrickError;
use brick_runtime::execution::RunOptions;
use serde_json::{json, Value};

#[tokio::test]
async fn test_lookup_returns_registered_instance() {
    let recorder = Recorder::new();
    let brick = Brick::effect(RecordingEffect::new("@test/x", &recorder));
    let registry = BrickRegistry::new();
    registry.register([brick.clone()]);

    let found = registry.lookup("@test/x").unwrap();
    assert!(found.same_instance(&brick));
    assert_eq!(
        registry.lookup("nonexistent").unwrap_err(),
        BrickError::NotFound("nonexistent".to_string())
    );
}

#[tokio::test]
async fn test_purity_defaults_by_kind() {
    let recorder = Recorder::new();
    let effect = Brick::effect(RecordingEffect::new("@test/effect", &recorder));
    assert!(!effect.is_pure().await);

    let registry = BrickRegistry::with_builtins();
    let reader = registry.lookup("@pixiebrix/document-context").unwrap();
    assert!(reader.is_pure().await);
}

#[tokio::test]
async fn test_external_reader_runs_in_pipeline() {
    use brick_runtime::platform::{ElementData, PageAdapter};

    let factory = BrickFactory::new();
    let reader = factory
        .from_yaml(
            r#"
kind: reader
metadata:
  id: "@acme/price"
  name: Price
definition:
  isAvailable:
    matchPatterns: ["https://shop.example.com/*"]
  reader:
    type: selector
    selectors:
      price: ".price"
      name: ".name"
"#,
        )
        .unwrap();

    let page = static_page("https://shop.example.com/item/1", "Item");
    page.document().insert(".price", ElementData::with_text("$10"));

    let scenario = run_pipeline_with_bricks(
        vec![reader.clone()],
        page_platform(page),
        "- id: \"@acme/price\"",
        RunOptions::new(Value::Null),
    )
    .await;
    assert_eq!(scenario.outcome().result, Some(json!({"price": "$10", "name": null})));

    let elsewhere = static_page("https://other.example.com/", "Other");
    let scenario = run_pipeline_with_bricks(
        vec![reader],
        page_platform(elsewhere),
        "- id: \"@acme/price\"",
        RunOptions::new(Value::Null),
    )
    .await;
    assert_eq!(scenario.error().source, BrickError::business("Price is not available on this page"));
}

#[tokio::test]
async fn test_configured_service_reaches_http_brick() {
    use brick_runtime::bricks::Package;
    use brick_runtime::core::RuntimeConfig;
    use brick_runtime::platform::{
        local_platform, ExecutionContext, FnHandler, HandlerTable, PlatformCapability, PlatformRequest,
    };
    use std::collections::BTreeMap;
    use std::sync::{Arc, Mutex};

    let registry = BrickRegistry::new();
    let package = BrickFactory::new()
        .load_yaml(
            r#"
kind: service
metadata:
  id: "@acme/api"
  name: Acme API
inputSchema:
  type: object
  properties:
    apiKey: {type: string}
  required: [apiKey]
authentication:
  baseURL: https://api.acme.com/v1
  headers:
    Authorization: "Bearer {{ apiKey }}"
"#,
        )
        .unwrap();
    assert!(matches!(package, Package::Service(_)));
    registry.register_package(package);

    let bindings = BTreeMap::from([("acme".to_string(), "@acme/api".to_string())]);
    let configs = BTreeMap::from([("@acme/api".to_string(), json!({"apiKey": "k-42"}))]);
    let services = registry.configure_services(&bindings, &configs).unwrap();

    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    let background = HandlerTable::new(ExecutionContext::Background).with(
        PlatformCapability::Http,
        Arc::new(FnHandler::new(move |request| {
            sink.lock().unwrap().push(request);
            Ok(json!({"status": 200, "headers": {}, "data": {"ok": true}}))
        })),
    );
    let platform = local_platform(None, &RuntimeConfig::default(), background);

    let yaml = r#"
- id: "@pixiebrix/http/get"
  config:
    url: /status
    service:
      __type__: var
      __value__: "@acme"
"#;
    let scenario =
        run_pipeline_with_bricks(Vec::new(), platform, yaml, RunOptions::new(Value::Null).with_services(services)).await;
    assert_eq!(scenario.outcome().result.as_ref().unwrap()["data"], json!({"ok": true}));

    let requests = seen.lock().unwrap();
    let PlatformRequest::Http(request) = &requests[0] else {
        panic!("expected an HTTP request, got {:?}", requests[0]);
    };
    assert_eq!(request.url, "https://api.acme.com/v1/status");
    assert_eq!(request.headers.get("Authorization").map(String::as_str), Some("Bearer k-42"));
}
