//! Waiting bricks

use crate::bricks::{BrickArgs, BrickMetadata, BrickOptions, Effect};
use crate::error::BrickError;
use crate::execution::AbortSignal;
use crate::platform::{ElementRef, PlatformCapability};
use async_trait::async_trait;
use serde_json::json;
use std::time::Duration;

/// `@pixiebrix/wait/sleep`
pub struct SleepEffect {
    metadata: BrickMetadata,
}

impl SleepEffect {
    pub const ID: &'static str = "@pixiebrix/wait/sleep";

    pub fn new() -> Self {
        Self {
            metadata: BrickMetadata::new(Self::ID, "Sleep")
                .with_description("Wait a number of milliseconds")
                .with_input_schema(json!({
                    "type": "object",
                    "properties": {
                        "timeMillis": {
                            "type": "integer",
                            "minimum": 0,
                            "default": 0,
                            "description": "Milliseconds to wait"
                        }
                    }
                })),
        }
    }
}

#[async_trait]
impl Effect for SleepEffect {
    fn metadata(&self) -> &BrickMetadata {
        &self.metadata
    }

    async fn effect(&self, args: &BrickArgs, options: &BrickOptions) -> Result<(), BrickError> {
        let millis = args.get_u64("timeMillis").unwrap_or(0);
        if millis == 0 {
            return Ok(());
        }
        tokio::select! {
            _ = options.abort_signal.aborted() => Err(BrickError::Aborted),
            _ = tokio::time::sleep(Duration::from_millis(millis)) => Ok(()),
        }
    }
}

/// `@pixiebrix/wait/element`
pub struct WaitElementEffect {
    metadata: BrickMetadata,
}

impl WaitElementEffect {
    pub const ID: &'static str = "@pixiebrix/wait/element";

    pub fn new() -> Self {
        Self {
            metadata: BrickMetadata::new(Self::ID, "Wait for Element")
                .with_description("Wait until an element matching a selector is on the page")
                .with_input_schema(json!({
                    "type": "object",
                    "properties": {
                        "selector": {"type": "string"},
                        "maxWaitMillis": {
                            "type": "integer",
                            "minimum": 0,
                            "default": 0,
                            "description": "Maximum time to wait; 0 waits indefinitely"
                        }
                    },
                    "required": ["selector"]
                })),
        }
    }
}

#[async_trait]
impl Effect for WaitElementEffect {
    fn metadata(&self) -> &BrickMetadata {
        &self.metadata
    }

    async fn is_root_aware(&self) -> bool {
        true
    }

    async fn required_capabilities(&self, _args: &BrickArgs) -> Vec<PlatformCapability> {
        vec![PlatformCapability::Dom]
    }

    async fn effect(&self, args: &BrickArgs, options: &BrickOptions) -> Result<(), BrickError> {
        let selector = args.require_str(Self::ID, "selector")?;
        let max_wait = args.get_u64("maxWaitMillis").unwrap_or(0);
        let document = options.platform.dom()?.document();
        let root = options.root.clone().unwrap_or(ElementRef::Document);

        let signal = if max_wait > 0 {
            AbortSignal::merge(&[
                options.abort_signal.clone(),
                AbortSignal::timeout(Duration::from_millis(max_wait)),
            ])
        } else {
            options.abort_signal.clone()
        };

        match document.wait_for(&root, selector, &signal).await {
            Ok(_) => Ok(()),
            Err(BrickError::Aborted) if !options.abort_signal.is_aborted() => Err(BrickError::business(format!(
                "Element {} not available in {} milliseconds",
                selector, max_wait
            ))),
            Err(error) => Err(error),
        }
    }
}
