use crate::bricks::{BrickArgs, BrickMetadata, BrickOptions, Effect};
use crate::error::BrickError;
use crate::logging::LogLevel;
use async_trait::async_trait;
use serde_json::json;

/// `@pixiebrix/log`: write a message to the run's logger
pub struct LogEffect {
    metadata: BrickMetadata,
}

impl LogEffect {
    pub const ID: &'static str = "@pixiebrix/log";

    pub fn new() -> Self {
        Self {
            metadata: BrickMetadata::new(Self::ID, "Log To Console")
                .with_description("Log a message")
                .with_input_schema(json!({
                    "type": "object",
                    "properties": {
                        "message": {"type": "string"},
                        "level": {
                            "type": "string",
                            "enum": ["debug", "info", "warn", "error"],
                            "default": "info"
                        },
                        "data": {}
                    }
                })),
        }
    }
}

#[async_trait]
impl Effect for LogEffect {
    fn metadata(&self) -> &BrickMetadata {
        &self.metadata
    }

    async fn effect(&self, args: &BrickArgs, options: &BrickOptions) -> Result<(), BrickError> {
        let level = match args.get_str("level").unwrap_or("info") {
            "debug" => LogLevel::Debug,
            "warn" => LogLevel::Warn,
            "error" => LogLevel::Error,
            _ => LogLevel::Info,
        };
        let message = args.get_str("message").unwrap_or_default().to_string();
        let data = args.get("data").filter(|data| !data.is_null()).cloned();
        options.logger.log(level, message, data);
        Ok(())
    }
}
