//! Templating and variable resolution
//!
//! Brick arguments are rendered against the run context before each
//! invocation. Text templates are collected from the whole argument tree and
//! sent to the sandbox in a single batch; `var` references are resolved
//! locally since they never execute template code.

pub mod coerce;
pub mod engine;
pub mod sandbox;

pub use engine::{render, resolve_path, TemplateError};

use crate::bricks::BrickArgs;
use crate::core::condition::is_truthy;
use crate::core::context::RunContext;
use crate::core::expression::ConfigTree;
use crate::error::BrickError;
use crate::execution::AbortSignal;
use crate::platform::Platform;
use serde_json::{Map, Value};

impl From<TemplateError> for BrickError {
    fn from(error: TemplateError) -> Self {
        BrickError::Template(error.to_string())
    }
}

fn collect_templates(tree: &ConfigTree, templates: &mut Vec<String>) {
    match tree {
        ConfigTree::Template(template) => templates.push(template.clone()),
        ConfigTree::Object(properties) => {
            for value in properties.values() {
                collect_templates(value, templates);
            }
        }
        ConfigTree::Array(items) => {
            for item in items {
                collect_templates(item, templates);
            }
        }
        ConfigTree::Literal(_) | ConfigTree::Var(_) | ConfigTree::Pipeline(_) | ConfigTree::Defer(_) => {}
    }
}

fn assemble(
    tree: &ConfigTree,
    rendered: &mut std::vec::IntoIter<String>,
    context: &Map<String, Value>,
) -> Result<Value, BrickError> {
    match tree {
        ConfigTree::Literal(value) => Ok(value.clone()),
        ConfigTree::Template(_) => rendered
            .next()
            .map(Value::String)
            .ok_or_else(|| BrickError::unexpected("Sandbox returned too few rendered templates")),
        ConfigTree::Var(path) => Ok(resolve_path(path, context)?.unwrap_or(Value::Null)),
        ConfigTree::Object(properties) => {
            let mut map = Map::new();
            for (key, value) in properties {
                map.insert(key.clone(), assemble(value, rendered, context)?);
            }
            Ok(Value::Object(map))
        }
        ConfigTree::Array(items) => items
            .iter()
            .map(|item| assemble(item, rendered, context))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
        ConfigTree::Pipeline(_) | ConfigTree::Defer(_) => Err(BrickError::Template(
            "pipeline and defer expressions cannot be rendered as values".to_string(),
        )),
    }
}

/// Render a tree to a value against the context
pub async fn render_value(
    tree: &ConfigTree,
    ctxt: &RunContext,
    platform: &Platform,
    abort: &AbortSignal,
) -> Result<Value, BrickError> {
    if let ConfigTree::Literal(value) = tree {
        return Ok(value.clone());
    }

    let context = ctxt.snapshot();
    let mut templates = Vec::new();
    collect_templates(tree, &mut templates);
    let rendered = if templates.is_empty() {
        Vec::new()
    } else {
        platform
            .templates()
            .render_all(templates, Value::Object(context.clone()), abort)
            .await?
    };

    assemble(tree, &mut rendered.into_iter(), &context)
}

/// Render a step's arguments
///
/// Top-level `pipeline` and `defer` expressions are handed to the brick
/// unevaluated; everything else is rendered.
pub async fn render_args(
    config: &ConfigTree,
    ctxt: &RunContext,
    platform: &Platform,
    abort: &AbortSignal,
) -> Result<BrickArgs, BrickError> {
    let mut args = BrickArgs::default();

    let properties = match config {
        ConfigTree::Object(properties) => properties,
        ConfigTree::Literal(Value::Null) => return Ok(args),
        other => {
            return match render_value(other, ctxt, platform, abort).await? {
                Value::Object(values) => Ok(BrickArgs::from_values(values)),
                Value::Null => Ok(args),
                _ => Err(BrickError::Template(
                    "brick configuration must render to an object".to_string(),
                )),
            };
        }
    };

    let mut renderable = std::collections::BTreeMap::new();
    for (key, tree) in properties {
        match tree {
            ConfigTree::Pipeline(expression) => args.insert_pipeline(key, expression.clone()),
            ConfigTree::Defer(inner) => args.insert_deferred(key, (**inner).clone()),
            other => {
                renderable.insert(key.clone(), other.clone());
            }
        }
    }

    if let Value::Object(values) =
        render_value(&ConfigTree::Object(renderable), ctxt, platform, abort).await?
    {
        args.set_values(values);
    }
    Ok(args)
}

/// Evaluate an `if` guard
pub async fn evaluate_condition(
    condition: &ConfigTree,
    ctxt: &RunContext,
    platform: &Platform,
    abort: &AbortSignal,
) -> Result<bool, BrickError> {
    let value = render_value(condition, ctxt, platform, abort).await?;
    Ok(is_truthy(&value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::RuntimeConfig;
    use crate::platform::{local_platform, ExecutionContext, HandlerTable};
    use serde_json::json;

    fn platform() -> Platform {
        local_platform(
            None,
            &RuntimeConfig::default(),
            HandlerTable::new(ExecutionContext::Background),
        )
    }

    fn ctxt() -> RunContext {
        RunContext::with_input(json!({"name": "Ada", "items": [1, 2, 3]})).bind("count", json!(5))
    }

    #[tokio::test]
    async fn test_render_args_walks_tree() {
        let config = ConfigTree::parse_config(&json!({
            "greeting": "Hello {{ @input.name }}",
            "nested": {"list": ["{{ @count }}", 7]},
            "raw": {"__type__": "var", "__value__": "@input.items"},
            "missing": {"__type__": "var", "__value__": "@nothing"},
            "literal": true,
        }))
        .unwrap();

        let args = render_args(&config, &ctxt(), &platform(), &AbortSignal::new())
            .await
            .unwrap();
        assert_eq!(args.get("greeting"), Some(&json!("Hello Ada")));
        assert_eq!(args.get("nested"), Some(&json!({"list": ["5", 7]})));
        assert_eq!(args.get("raw"), Some(&json!([1, 2, 3])));
        assert_eq!(args.get("missing"), Some(&Value::Null));
        assert_eq!(args.get("literal"), Some(&json!(true)));
    }

    #[tokio::test]
    async fn test_pipeline_and_defer_are_not_rendered() {
        let config = ConfigTree::parse_config(&json!({
            "body": {"__type__": "pipeline", "__value__": [{"id": "@pixiebrix/identity"}]},
            "later": {"__type__": "defer", "__value__": "{{ @element }}"},
        }))
        .unwrap();

        let args = render_args(&config, &ctxt(), &platform(), &AbortSignal::new())
            .await
            .unwrap();
        assert!(args.pipeline("body").is_some());
        assert_eq!(
            args.deferred("later"),
            Some(&ConfigTree::Template("{{ @element }}".to_string()))
        );
        assert!(args.get("body").is_none());
    }

    #[tokio::test]
    async fn test_condition_truthiness() {
        let platform = platform();
        let abort = AbortSignal::new();
        let ctxt = ctxt();

        let truthy = ConfigTree::parse(&json!("{{ @count }}")).unwrap();
        assert!(evaluate_condition(&truthy, &ctxt, &platform, &abort).await.unwrap());

        let falsy = ConfigTree::parse(&json!("{{ @missing }}")).unwrap();
        assert!(!evaluate_condition(&falsy, &ctxt, &platform, &abort).await.unwrap());

        let literal = ConfigTree::parse(&json!(false)).unwrap();
        assert!(!evaluate_condition(&literal, &ctxt, &platform, &abort).await.unwrap());
    }

    #[tokio::test]
    async fn test_template_errors_surface_as_business_errors() {
        let config = ConfigTree::parse_config(&json!({"x": "{{ @input | bogus }}"})).unwrap();
        let error = render_args(&config, &ctxt(), &platform(), &AbortSignal::new())
            .await
            .unwrap_err();
        assert!(matches!(error, BrickError::Template(_)));
        assert_eq!(error.kind(), crate::error::ErrorKind::Business);
    }

    #[tokio::test]
    async fn test_aborted_render_fails_fast() {
        let config = ConfigTree::parse_config(&json!({"x": "{{ @count }}"})).unwrap();
        let abort = AbortSignal::new();
        abort.abort();
        let error = render_args(&config, &ctxt(), &platform(), &abort).await.unwrap_err();
        assert!(error.is_abort());
    }
}
