//! Platform capabilities and cross-context dispatch
//!
//! Bricks never talk to an execution context directly. They receive a
//! [`Platform`] handle whose members are grouped by capability
//! (`request`, `audio`, `capture`, `open`, `clipboard`, `templates`). Each
//! member either runs in-process or hops to the owning context through the
//! [`CapabilityRouter`].

pub mod capability;
pub mod dom;
pub mod handlers;
pub mod protocol;
pub mod router;
pub mod rpc;

pub use capability::{ExecutionContext, PlatformCapability};
pub use dom::{Document, ElementData, ElementRef, PageAdapter, PageFixture, StaticPage};
pub use protocol::{HttpMethod, HttpRequest, HttpResponse, PlatformError, PlatformRequest};
pub use router::{target_context, CapabilityRouter, Route};
pub use rpc::{CapabilityHandler, ContextHost, FnHandler, HandlerTable, RpcClient};

use crate::core::config::RuntimeConfig;
use crate::error::BrickError;
use crate::execution::AbortSignal;
use crate::templating::sandbox::sandbox_handlers;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Capability-routing handle injected into every brick invocation
#[derive(Clone)]
pub struct Platform {
    name: Arc<str>,
    router: Arc<CapabilityRouter>,
    page: Option<Arc<dyn PageAdapter>>,
}

impl Platform {
    pub fn builder(name: impl Into<String>, context: ExecutionContext) -> PlatformBuilder {
        PlatformBuilder {
            name: name.into(),
            router: CapabilityRouter::new(context),
            page: None,
        }
    }

    /// Platform name reported in capability errors
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Execution context this platform runs bricks in
    pub fn context(&self) -> ExecutionContext {
        self.router.local()
    }

    pub fn router(&self) -> &CapabilityRouter {
        &self.router
    }

    pub fn page(&self) -> Option<&Arc<dyn PageAdapter>> {
        self.page.as_ref()
    }

    /// Same routing, different page (used for frame targeting)
    pub fn with_page(&self, page: Arc<dyn PageAdapter>) -> Platform {
        Platform {
            name: self.name.clone(),
            router: self.router.clone(),
            page: Some(page),
        }
    }

    /// Whether this platform can satisfy a capability
    pub fn supports(&self, capability: PlatformCapability) -> bool {
        if self.router.is_disabled(capability) {
            return false;
        }
        match capability {
            PlatformCapability::Dom | PlatformCapability::ClipboardWrite => {
                self.context() == ExecutionContext::ContentScript && self.page.is_some()
            }
            // No user interface to show forms or panels in
            PlatformCapability::Form | PlatformCapability::Panel => false,
            _ => self.router.can_dispatch(capability),
        }
    }

    /// Fail with the first capability this platform cannot satisfy
    pub fn check_capabilities(&self, capabilities: &[PlatformCapability]) -> Result<(), BrickError> {
        match capabilities.iter().find(|capability| !self.supports(**capability)) {
            Some(capability) => Err(BrickError::CapabilityNotAvailable {
                platform: self.name.to_string(),
                capability: *capability,
            }),
            None => Ok(()),
        }
    }

    fn require(&self, capability: PlatformCapability) -> Result<(), BrickError> {
        self.check_capabilities(&[capability])
    }

    /// Document of the page the platform is attached to
    pub fn dom(&self) -> Result<Arc<dyn PageAdapter>, BrickError> {
        self.require(PlatformCapability::Dom)?;
        self.page
            .clone()
            .ok_or_else(|| BrickError::CapabilityNotAvailable {
                platform: self.name.to_string(),
                capability: PlatformCapability::Dom,
            })
    }

    /// Perform an HTTP request from the background context
    pub async fn request(
        &self,
        request: HttpRequest,
        abort: &AbortSignal,
    ) -> Result<HttpResponse, BrickError> {
        let value = self.dispatch(PlatformRequest::Http(request), abort).await?;
        serde_json::from_value(value).map_err(|e| BrickError::unexpected(format!("Malformed HTTP response: {}", e)))
    }

    /// Open a url in a new tab
    pub async fn open(&self, url: &str, abort: &AbortSignal) -> Result<(), BrickError> {
        self.dispatch(
            PlatformRequest::OpenTab {
                url: url.to_string(),
            },
            abort,
        )
        .await
        .map(|_| ())
    }

    pub fn audio(&self) -> AudioApi<'_> {
        AudioApi { platform: self }
    }

    pub fn capture(&self) -> CaptureApi<'_> {
        CaptureApi { platform: self }
    }

    pub fn clipboard(&self) -> ClipboardApi<'_> {
        ClipboardApi { platform: self }
    }

    pub fn templates(&self) -> TemplateApi<'_> {
        TemplateApi { platform: self }
    }

    async fn dispatch(&self, request: PlatformRequest, abort: &AbortSignal) -> Result<Value, BrickError> {
        let capability = request.capability();
        if self.router.is_disabled(capability) {
            return Err(BrickError::CapabilityNotAvailable {
                platform: self.name.to_string(),
                capability,
            });
        }
        self.router.dispatch(request, abort).await.map_err(|error| match error {
            BrickError::CapabilityNotAvailable { capability, .. } => {
                BrickError::CapabilityNotAvailable {
                    platform: self.name.to_string(),
                    capability,
                }
            }
            other => other,
        })
    }
}

impl fmt::Debug for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Platform")
            .field("name", &self.name)
            .field("context", &self.context())
            .field("has_page", &self.page.is_some())
            .finish()
    }
}

/// `platform.audio`
pub struct AudioApi<'a> {
    platform: &'a Platform,
}

impl AudioApi<'_> {
    pub async fn play(&self, sound: &str, abort: &AbortSignal) -> Result<(), BrickError> {
        self.platform
            .dispatch(
                PlatformRequest::PlayAudio {
                    sound: sound.to_string(),
                },
                abort,
            )
            .await
            .map(|_| ())
    }
}

/// `platform.capture`
pub struct CaptureApi<'a> {
    platform: &'a Platform,
}

impl CaptureApi<'_> {
    pub async fn start_audio_capture(&self, abort: &AbortSignal) -> Result<(), BrickError> {
        self.platform
            .dispatch(PlatformRequest::StartAudioCapture, abort)
            .await
            .map(|_| ())
    }

    pub async fn stop_audio_capture(&self, abort: &AbortSignal) -> Result<(), BrickError> {
        self.platform
            .dispatch(PlatformRequest::StopAudioCapture, abort)
            .await
            .map(|_| ())
    }
}

/// `platform.clipboard`
pub struct ClipboardApi<'a> {
    platform: &'a Platform,
}

impl ClipboardApi<'_> {
    pub async fn write(&self, text: &str) -> Result<(), BrickError> {
        self.platform.require(PlatformCapability::ClipboardWrite)?;
        match &self.platform.page {
            Some(page) => page.write_clipboard(text).await,
            None => Err(BrickError::CapabilityNotAvailable {
                platform: self.platform.name.to_string(),
                capability: PlatformCapability::ClipboardWrite,
            }),
        }
    }
}

/// `platform.templates`: rendering in the isolated sandbox
pub struct TemplateApi<'a> {
    platform: &'a Platform,
}

impl TemplateApi<'_> {
    /// Render a batch of templates against one context snapshot
    pub async fn render_all(
        &self,
        templates: Vec<String>,
        context: Value,
        abort: &AbortSignal,
    ) -> Result<Vec<String>, BrickError> {
        if templates.is_empty() {
            return Ok(Vec::new());
        }
        let expected = templates.len();
        let value = self
            .platform
            .dispatch(PlatformRequest::RenderTemplates { templates, context }, abort)
            .await?;
        let rendered: Vec<String> = serde_json::from_value(value)
            .map_err(|e| BrickError::unexpected(format!("Malformed sandbox response: {}", e)))?;
        if rendered.len() != expected {
            return Err(BrickError::unexpected(format!(
                "Sandbox rendered {} of {} templates",
                rendered.len(),
                expected
            )));
        }
        Ok(rendered)
    }
}

/// Builder for [`Platform`]
pub struct PlatformBuilder {
    name: String,
    router: CapabilityRouter,
    page: Option<Arc<dyn PageAdapter>>,
}

impl PlatformBuilder {
    pub fn page(mut self, page: Arc<dyn PageAdapter>) -> Self {
        self.page = Some(page);
        self
    }

    pub fn local_handlers(mut self, handlers: HandlerTable) -> Self {
        self.router = self.router.with_local_handlers(handlers);
        self
    }

    pub fn endpoint(mut self, client: RpcClient) -> Self {
        self.router = self.router.with_endpoint(client);
        self
    }

    pub fn disable(mut self, capability: PlatformCapability) -> Self {
        self.router = self.router.disable(capability);
        self
    }

    pub fn rpc_timeout(mut self, timeout: Duration) -> Self {
        self.router = self.router.with_rpc_timeout(timeout);
        self
    }

    pub fn template_timeout(mut self, timeout: Duration) -> Self {
        self.router = self.router.with_template_timeout(timeout);
        self
    }

    pub fn build(self) -> Platform {
        Platform {
            name: Arc::from(self.name),
            router: Arc::new(self.router),
            page: self.page,
        }
    }
}

/// Content-script platform wired to freshly spawned background and sandbox hosts
///
/// Must be called from within a tokio runtime.
pub fn local_platform(
    page: Option<Arc<dyn PageAdapter>>,
    config: &RuntimeConfig,
    background: HandlerTable,
) -> Platform {
    let mut builder = Platform::builder(config.platform_name.clone(), config.context)
        .endpoint(ContextHost::new(background).spawn())
        .endpoint(ContextHost::new(sandbox_handlers()).spawn())
        .rpc_timeout(Duration::from_millis(config.rpc_timeout_ms))
        .template_timeout(Duration::from_millis(config.template_timeout_ms));

    for capability in &config.disabled_capabilities {
        builder = builder.disable(*capability);
    }
    if let Some(page) = page {
        builder = builder.page(page);
    }
    builder.build()
}
