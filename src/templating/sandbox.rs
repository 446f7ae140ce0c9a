//! Isolated template evaluation host
//!
//! The sandbox sees only the context snapshot sent with each request. It has
//! no page, no network and no platform handle, so templates cannot reach the
//! DOM.

use crate::platform::protocol::{PlatformError, PlatformRequest};
use crate::platform::rpc::{CapabilityHandler, HandlerTable};
use crate::platform::{ExecutionContext, PlatformCapability};
use crate::templating::engine;
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Renders template batches
pub struct TemplateSandbox;

impl TemplateSandbox {
    fn render_batch(templates: &[String], context: &Map<String, Value>) -> Result<Vec<String>, PlatformError> {
        templates
            .iter()
            .map(|template| {
                engine::render(template, context).map_err(|e| PlatformError::Template(e.to_string()))
            })
            .collect()
    }
}

#[async_trait]
impl CapabilityHandler for TemplateSandbox {
    async fn handle(
        &self,
        request: PlatformRequest,
        cancel: CancellationToken,
    ) -> Result<Value, PlatformError> {
        let PlatformRequest::RenderTemplates { templates, context } = request else {
            return Err(PlatformError::Remote("sandbox only renders templates".to_string()));
        };
        if cancel.is_cancelled() {
            return Err(PlatformError::Aborted);
        }

        let context = match context {
            Value::Object(map) => map,
            Value::Null => Map::new(),
            _ => return Err(PlatformError::Template("template context must be an object".to_string())),
        };

        debug!("Rendering {} template(s) in sandbox", templates.len());
        let rendered = Self::render_batch(&templates, &context)?;
        Ok(Value::from(rendered))
    }
}

/// Handler table served by the sandbox context
pub fn sandbox_handlers() -> HandlerTable {
    HandlerTable::new(ExecutionContext::Sandbox).with(PlatformCapability::Sandbox, Arc::new(TemplateSandbox))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_renders_batch_in_order() {
        let result = TemplateSandbox
            .handle(
                PlatformRequest::RenderTemplates {
                    templates: vec!["{{ @a }}".to_string(), "x{{ @b }}x".to_string()],
                    context: json!({"@a": 1, "@b": "y"}),
                },
                CancellationToken::new(),
            )
            .await
            .unwrap();
        assert_eq!(result, json!(["1", "xyx"]));
    }

    #[tokio::test]
    async fn test_render_errors_are_template_errors() {
        let result = TemplateSandbox
            .handle(
                PlatformRequest::RenderTemplates {
                    templates: vec!["{{ @a | nope }}".to_string()],
                    context: json!({}),
                },
                CancellationToken::new(),
            )
            .await;
        assert!(matches!(result, Err(PlatformError::Template(message)) if message.contains("nope")));
    }

    #[tokio::test]
    async fn test_rejects_other_requests() {
        let result = TemplateSandbox
            .handle(
                PlatformRequest::OpenTab {
                    url: "https://example.com".to_string(),
                },
                CancellationToken::new(),
            )
            .await;
        assert!(matches!(result, Err(PlatformError::Remote(_))));
    }
}
