//! Control-flow bricks
//!
//! Each takes one or more `pipeline` arguments and runs them through
//! [`BrickOptions::run_pipeline`], binding loop variables in a nested
//! context.

use crate::bricks::{BrickArgs, BrickMetadata, BrickOptions, Transformer};
use crate::core::condition::is_truthy;
use crate::error::BrickError;
use async_trait::async_trait;
use serde_json::{json, Value};

/// `@pixiebrix/for-each`: run `body` once per element
pub struct ForEach {
    metadata: BrickMetadata,
}

impl ForEach {
    pub const ID: &'static str = "@pixiebrix/for-each";

    pub fn new() -> Self {
        Self {
            metadata: BrickMetadata::new(Self::ID, "For-Each Loop")
                .with_description("Loop over elements in a list, returning the output of the last iteration")
                .with_input_schema(json!({
                    "type": "object",
                    "properties": {
                        "elements": {"type": "array"},
                        "elementKey": {"type": "string", "default": "element"}
                    },
                    "required": ["elements"]
                })),
        }
    }
}

#[async_trait]
impl Transformer for ForEach {
    fn metadata(&self) -> &BrickMetadata {
        &self.metadata
    }

    async fn transform(&self, args: &BrickArgs, options: &BrickOptions) -> Result<Value, BrickError> {
        let elements = match args.get("elements") {
            Some(Value::Array(elements)) => elements.clone(),
            Some(Value::Null) | None => Vec::new(),
            Some(_) => return Err(BrickError::prop(Self::ID, "elements", "expected an array")),
        };
        let key = args.get_str("elementKey").unwrap_or("element").to_string();
        let body = args.pipeline_or_empty("body");

        let mut last = Value::Null;
        for element in elements {
            last = options.run_pipeline(&body, [(key.as_str(), element)]).await?;
        }
        Ok(last)
    }
}

/// `@pixiebrix/repeat`: run `body` a fixed number of times
pub struct Repeat {
    metadata: BrickMetadata,
}

impl Repeat {
    pub const ID: &'static str = "@pixiebrix/repeat";

    pub fn new() -> Self {
        Self {
            metadata: BrickMetadata::new(Self::ID, "Repeat")
                .with_description("Run a pipeline a number of times, returning each iteration's output")
                .with_input_schema(json!({
                    "type": "object",
                    "properties": {
                        "count": {"type": "integer", "minimum": 0}
                    },
                    "required": ["count"]
                })),
        }
    }
}

#[async_trait]
impl Transformer for Repeat {
    fn metadata(&self) -> &BrickMetadata {
        &self.metadata
    }

    async fn transform(&self, args: &BrickArgs, options: &BrickOptions) -> Result<Value, BrickError> {
        let count = args.get_u64("count").unwrap_or(0);
        let body = args.pipeline_or_empty("body");

        let mut outputs = Vec::new();
        for index in 0..count {
            outputs.push(options.run_pipeline(&body, [("index", json!(index))]).await?);
        }
        Ok(Value::Array(outputs))
    }
}

/// `@pixiebrix/if-else`
pub struct IfElse {
    metadata: BrickMetadata,
}

impl IfElse {
    pub const ID: &'static str = "@pixiebrix/if-else";

    pub fn new() -> Self {
        Self {
            metadata: BrickMetadata::new(Self::ID, "If-Else")
                .with_description("Run one of two pipelines depending on a condition")
                .with_input_schema(json!({
                    "type": "object",
                    "properties": {
                        "condition": {}
                    }
                })),
        }
    }
}

#[async_trait]
impl Transformer for IfElse {
    fn metadata(&self) -> &BrickMetadata {
        &self.metadata
    }

    async fn transform(&self, args: &BrickArgs, options: &BrickOptions) -> Result<Value, BrickError> {
        let condition = args.get("condition").map(is_truthy).unwrap_or(false);
        let branch = if condition { "if" } else { "else" };
        match args.pipeline(branch) {
            Some(pipeline) => options.run_pipeline(pipeline, Vec::<(&str, Value)>::new()).await,
            None => Ok(Value::Null),
        }
    }
}

/// `@pixiebrix/try-except`
pub struct TryExcept {
    metadata: BrickMetadata,
}

impl TryExcept {
    pub const ID: &'static str = "@pixiebrix/try-except";

    pub fn new() -> Self {
        Self {
            metadata: BrickMetadata::new(Self::ID, "Try-Except")
                .with_description("Run a pipeline, falling back to another pipeline if it fails")
                .with_input_schema(json!({
                    "type": "object",
                    "properties": {
                        "errorKey": {"type": "string", "default": "error"}
                    }
                })),
        }
    }
}

#[async_trait]
impl Transformer for TryExcept {
    fn metadata(&self) -> &BrickMetadata {
        &self.metadata
    }

    async fn transform(&self, args: &BrickArgs, options: &BrickOptions) -> Result<Value, BrickError> {
        let body = args.require_pipeline(Self::ID, "try")?;
        match options.run_pipeline(body, Vec::<(&str, Value)>::new()).await {
            Ok(value) => Ok(value),
            Err(error) if error.is_abort() => Err(error),
            Err(error) => {
                options
                    .logger
                    .warn(format!("Caught error in try branch: {}", error));
                let key = args.get_str("errorKey").unwrap_or("error").to_string();
                match args.pipeline("except") {
                    Some(handler) => options.run_pipeline(handler, [(key.as_str(), error.to_json())]).await,
                    None => Ok(Value::Null),
                }
            }
        }
    }
}
