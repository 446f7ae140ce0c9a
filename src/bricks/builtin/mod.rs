//! Builtin bricks

pub mod audio;
pub mod browser;
pub mod control;
pub mod document;
pub mod html;
pub mod http;
pub mod log;
pub mod transform;
pub mod wait;

use super::Brick;

/// Every builtin brick, in registration order
pub fn all() -> Vec<Brick> {
    vec![
        Brick::effect(wait::SleepEffect::new()),
        Brick::effect(wait::WaitElementEffect::new()),
        Brick::reader(document::DocumentContextReader::new()),
        Brick::reader(document::ElementTextReader::new()),
        Brick::effect(document::SetTitleEffect::new()),
        Brick::transformer(transform::IdentityTransformer::new()),
        Brick::effect(log::LogEffect::new()),
        Brick::effect(browser::CopyToClipboardEffect::new()),
        Brick::effect(browser::OpenTabEffect::new()),
        Brick::transformer(http::HttpGetTransformer::new()),
        Brick::effect(audio::PlaySoundEffect::new()),
        Brick::effect(audio::AudioCaptureEffect::new()),
        Brick::renderer(html::HtmlRenderer::new()),
        Brick::transformer(control::ForEach::new()),
        Brick::transformer(control::Repeat::new()),
        Brick::transformer(control::IfElse::new()),
        Brick::transformer(control::TryExcept::new()),
    ]
}

#[cfg(test)]
pub(crate) mod testing {
    use crate::bricks::{BrickOptions, PipelineInvoker, RunMeta};
    use crate::core::config::RuntimeConfig;
    use crate::core::context::RunContext;
    use crate::core::pipeline::BrickPipeline;
    use crate::error::BrickError;
    use crate::execution::AbortSignal;
    use crate::platform::{local_platform, Document, ExecutionContext, HandlerTable, PageAdapter, Platform, StaticPage};
    use async_trait::async_trait;
    use serde_json::Value;
    use std::sync::Arc;
    use uuid::Uuid;

    struct NoNesting;

    #[async_trait]
    impl PipelineInvoker for NoNesting {
        async fn run_nested(&self, _pipeline: &BrickPipeline, _options: &BrickOptions) -> Result<Value, BrickError> {
            Err(BrickError::unexpected("nested pipelines are not available here"))
        }
    }

    pub fn headless_platform() -> Platform {
        platform_with_background(HandlerTable::new(ExecutionContext::Background))
    }

    pub fn platform_with_background(background: HandlerTable) -> Platform {
        local_platform(None, &RuntimeConfig::default(), background)
    }

    pub fn page_platform(document: Document) -> Platform {
        page_platform_with(Arc::new(StaticPage::new(document)))
    }

    pub fn page_platform_with(page: Arc<dyn PageAdapter>) -> Platform {
        local_platform(
            Some(page),
            &RuntimeConfig::default(),
            HandlerTable::new(ExecutionContext::Background),
        )
    }

    pub fn options(platform: Platform) -> BrickOptions {
        BrickOptions::new(
            RunContext::new(),
            platform,
            AbortSignal::new(),
            RunMeta::new(Uuid::new_v4(), 1),
            Arc::new(NoNesting),
        )
    }
}
