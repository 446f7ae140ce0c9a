use crate::bricks::{BrickArgs, BrickMetadata, BrickOptions, RenderResult, Renderer};
use crate::error::BrickError;
use async_trait::async_trait;
use serde_json::{json, Value};

/// `@pixiebrix/html`: render HTML markup
///
/// A deferred `itemTemplate` is rendered once per entry of `items`, with the
/// entry bound to `@item`, and appended to `html`.
pub struct HtmlRenderer {
    metadata: BrickMetadata,
}

impl HtmlRenderer {
    pub const ID: &'static str = "@pixiebrix/html";

    pub fn new() -> Self {
        Self {
            metadata: BrickMetadata::new(Self::ID, "HTML Renderer")
                .with_description("Render HTML")
                .with_input_schema(json!({
                    "type": "object",
                    "properties": {
                        "html": {"type": "string", "format": "html"},
                        "items": {"type": "array"}
                    },
                    "required": ["html"]
                }))
                .with_ui_schema(json!({"html": {"ui:widget": "textarea"}})),
        }
    }
}

#[async_trait]
impl Renderer for HtmlRenderer {
    fn metadata(&self) -> &BrickMetadata {
        &self.metadata
    }

    async fn render(&self, args: &BrickArgs, options: &BrickOptions) -> Result<RenderResult, BrickError> {
        let mut html = args.require_str(Self::ID, "html")?.to_string();
        let Some(template) = args.deferred("itemTemplate") else {
            return Ok(RenderResult::Html(html));
        };
        let items = match args.get("items") {
            Some(Value::Array(items)) => items.clone(),
            Some(Value::Null) | None => Vec::new(),
            Some(_) => return Err(BrickError::prop(Self::ID, "items", "expected an array")),
        };
        for item in items {
            match options.render_deferred(template, [("item", item)]).await? {
                Value::String(text) => html.push_str(&text),
                other => html.push_str(&other.to_string()),
            }
        }
        Ok(RenderResult::Html(html))
    }
}
