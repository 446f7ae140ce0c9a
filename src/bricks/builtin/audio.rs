use crate::bricks::{BrickArgs, BrickMetadata, BrickOptions, Effect};
use crate::error::BrickError;
use crate::platform::PlatformCapability;
use async_trait::async_trait;
use serde_json::json;

/// `@pixiebrix/audio/play`
pub struct PlaySoundEffect {
    metadata: BrickMetadata,
}

impl PlaySoundEffect {
    pub const ID: &'static str = "@pixiebrix/audio/play";

    pub fn new() -> Self {
        Self {
            metadata: BrickMetadata::new(Self::ID, "Play sound effect")
                .with_description("Play a sound effect")
                .with_input_schema(json!({
                    "type": "object",
                    "properties": {
                        "sound": {"type": "string", "default": "ding"}
                    }
                })),
        }
    }
}

#[async_trait]
impl Effect for PlaySoundEffect {
    fn metadata(&self) -> &BrickMetadata {
        &self.metadata
    }

    async fn required_capabilities(&self, _args: &BrickArgs) -> Vec<PlatformCapability> {
        vec![PlatformCapability::Audio]
    }

    async fn effect(&self, args: &BrickArgs, options: &BrickOptions) -> Result<(), BrickError> {
        let sound = args.get_str("sound").unwrap_or("ding");
        options.platform.audio().play(sound, &options.abort_signal).await
    }
}

/// `@pixiebrix/audio/capture`: start or stop recording tab audio
pub struct AudioCaptureEffect {
    metadata: BrickMetadata,
}

impl AudioCaptureEffect {
    pub const ID: &'static str = "@pixiebrix/audio/capture";

    pub fn new() -> Self {
        Self {
            metadata: BrickMetadata::new(Self::ID, "Capture audio")
                .with_description("Start or stop capturing tab audio")
                .with_input_schema(json!({
                    "type": "object",
                    "properties": {
                        "action": {"type": "string", "enum": ["start", "stop"]}
                    },
                    "required": ["action"]
                })),
        }
    }
}

#[async_trait]
impl Effect for AudioCaptureEffect {
    fn metadata(&self) -> &BrickMetadata {
        &self.metadata
    }

    async fn required_capabilities(&self, _args: &BrickArgs) -> Vec<PlatformCapability> {
        vec![PlatformCapability::Capture]
    }

    async fn effect(&self, args: &BrickArgs, options: &BrickOptions) -> Result<(), BrickError> {
        let capture = options.platform.capture();
        match args.require_str(Self::ID, "action")? {
            "start" => capture.start_audio_capture(&options.abort_signal).await,
            "stop" => capture.stop_audio_capture(&options.abort_signal).await,
            other => Err(BrickError::prop(
                Self::ID,
                "action",
                format!("unknown action '{}'", other),
            )),
        }
    }
}
