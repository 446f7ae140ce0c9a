//! Clipboard and tab effects

use crate::bricks::{BrickArgs, BrickMetadata, BrickOptions, Effect};
use crate::error::BrickError;
use crate::platform::PlatformCapability;
use async_trait::async_trait;
use serde_json::{json, Value};

/// `@pixiebrix/clipboard/copy`
pub struct CopyToClipboardEffect {
    metadata: BrickMetadata,
}

impl CopyToClipboardEffect {
    pub const ID: &'static str = "@pixiebrix/clipboard/copy";

    pub fn new() -> Self {
        Self {
            metadata: BrickMetadata::new(Self::ID, "Copy to clipboard")
                .with_description("Copy text to your clipboard")
                .with_input_schema(json!({
                    "type": "object",
                    "properties": {"text": {"type": ["string", "number", "boolean"]}},
                    "required": ["text"]
                })),
        }
    }
}

#[async_trait]
impl Effect for CopyToClipboardEffect {
    fn metadata(&self) -> &BrickMetadata {
        &self.metadata
    }

    async fn required_capabilities(&self, _args: &BrickArgs) -> Vec<PlatformCapability> {
        vec![PlatformCapability::ClipboardWrite]
    }

    async fn effect(&self, args: &BrickArgs, options: &BrickOptions) -> Result<(), BrickError> {
        let text = match args.get("text") {
            Some(Value::String(text)) => text.clone(),
            Some(Value::Null) | None => return Err(BrickError::prop(Self::ID, "text", "is required")),
            Some(other) => other.to_string(),
        };
        options.platform.clipboard().write(&text).await
    }
}

/// `@pixiebrix/browser/open-tab`
pub struct OpenTabEffect {
    metadata: BrickMetadata,
}

impl OpenTabEffect {
    pub const ID: &'static str = "@pixiebrix/browser/open-tab";

    pub fn new() -> Self {
        Self {
            metadata: BrickMetadata::new(Self::ID, "Open a tab")
                .with_description("Open a URL in a new tab")
                .with_input_schema(json!({
                    "type": "object",
                    "properties": {"url": {"type": "string"}},
                    "required": ["url"]
                })),
        }
    }
}

#[async_trait]
impl Effect for OpenTabEffect {
    fn metadata(&self) -> &BrickMetadata {
        &self.metadata
    }

    async fn required_capabilities(&self, _args: &BrickArgs) -> Vec<PlatformCapability> {
        vec![PlatformCapability::Tabs]
    }

    async fn effect(&self, args: &BrickArgs, options: &BrickOptions) -> Result<(), BrickError> {
        let url = args.require_str(Self::ID, "url")?;
        options.platform.open(url, &options.abort_signal).await
    }
}
