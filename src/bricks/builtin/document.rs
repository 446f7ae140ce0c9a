//! Page readers and page effects

use crate::bricks::{BrickArgs, BrickMetadata, BrickOptions, Effect, Reader};
use crate::error::BrickError;
use crate::platform::{ElementRef, PlatformCapability};
use async_trait::async_trait;
use chrono::Utc;
use serde_json::{json, Value};

/// `@pixiebrix/document-context`: url, title, timestamp and frame flag
pub struct DocumentContextReader {
    metadata: BrickMetadata,
}

impl DocumentContextReader {
    pub const ID: &'static str = "@pixiebrix/document-context";

    pub fn new() -> Self {
        Self {
            metadata: BrickMetadata::new(Self::ID, "Context reader")
                .with_description("Read metadata about the document")
                .with_output_schema(json!({
                    "type": "object",
                    "properties": {
                        "url": {"type": "string", "format": "uri"},
                        "title": {"type": "string"},
                        "timestamp": {"type": "string", "format": "date-time"},
                        "isFrame": {"type": "boolean"}
                    }
                })),
        }
    }
}

#[async_trait]
impl Reader for DocumentContextReader {
    fn metadata(&self) -> &BrickMetadata {
        &self.metadata
    }

    async fn is_root_aware(&self) -> bool {
        false
    }

    async fn read(&self, _root: &ElementRef, options: &BrickOptions) -> Result<Value, BrickError> {
        let document = options.platform.dom()?.document();
        Ok(json!({
            "url": document.url(),
            "title": document.title(),
            "timestamp": Utc::now().to_rfc3339(),
            "isFrame": document.is_frame(),
        }))
    }
}

/// `@pixiebrix/element-text`: text content of the root element
pub struct ElementTextReader {
    metadata: BrickMetadata,
}

impl ElementTextReader {
    pub const ID: &'static str = "@pixiebrix/element-text";

    pub fn new() -> Self {
        Self {
            metadata: BrickMetadata::new(Self::ID, "Element text")
                .with_description("Read the text of the root element")
                .with_output_schema(json!({
                    "type": "object",
                    "properties": {"text": {"type": "string"}}
                })),
        }
    }
}

#[async_trait]
impl Reader for ElementTextReader {
    fn metadata(&self) -> &BrickMetadata {
        &self.metadata
    }

    async fn read(&self, root: &ElementRef, options: &BrickOptions) -> Result<Value, BrickError> {
        let document = options.platform.dom()?.document();
        match document.text(root) {
            Some(text) => Ok(json!({ "text": text })),
            None => Err(BrickError::business("Element not found")),
        }
    }
}

/// `@pixiebrix/document/set-title`
pub struct SetTitleEffect {
    metadata: BrickMetadata,
}

impl SetTitleEffect {
    pub const ID: &'static str = "@pixiebrix/document/set-title";

    pub fn new() -> Self {
        Self {
            metadata: BrickMetadata::new(Self::ID, "Set title")
                .with_description("Set the document title")
                .with_input_schema(json!({
                    "type": "object",
                    "properties": {"title": {"type": "string"}},
                    "required": ["title"]
                })),
        }
    }
}

#[async_trait]
impl Effect for SetTitleEffect {
    fn metadata(&self) -> &BrickMetadata {
        &self.metadata
    }

    async fn required_capabilities(&self, _args: &BrickArgs) -> Vec<PlatformCapability> {
        vec![PlatformCapability::Dom]
    }

    async fn effect(&self, args: &BrickArgs, options: &BrickOptions) -> Result<(), BrickError> {
        let title = args.require_str(Self::ID, "title")?;
        options.platform.dom()?.document().set_title(title);
        Ok(())
    }
}
