//! Value transformers

use crate::bricks::{BrickArgs, BrickMetadata, BrickOptions, Transformer};
use crate::error::BrickError;
use async_trait::async_trait;
use serde_json::{json, Value};

/// `@pixiebrix/identity`: returns its arguments
pub struct IdentityTransformer {
    metadata: BrickMetadata,
}

impl IdentityTransformer {
    pub const ID: &'static str = "@pixiebrix/identity";

    pub fn new() -> Self {
        Self {
            metadata: BrickMetadata::new(Self::ID, "Identity function")
                .with_description("Returns the object passed into it")
                .with_input_schema(json!({"type": "object", "additionalProperties": true})),
        }
    }
}

#[async_trait]
impl Transformer for IdentityTransformer {
    fn metadata(&self) -> &BrickMetadata {
        &self.metadata
    }

    async fn is_pure(&self) -> bool {
        true
    }

    async fn transform(&self, args: &BrickArgs, _options: &BrickOptions) -> Result<Value, BrickError> {
        Ok(args.to_value())
    }
}
