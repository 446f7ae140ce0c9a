//! Platform capabilities and execution contexts

use serde::{Deserialize, Serialize};
use std::fmt;

/// A requirement a brick declares before it can run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PlatformCapability {
    /// Access to the document of the page the mod runs on
    Dom,
    /// Outbound HTTP requests
    Http,
    /// Audio playback
    Audio,
    /// Tab audio/video capture
    Capture,
    /// Writing to the system clipboard
    ClipboardWrite,
    /// Showing forms to the user
    Form,
    /// Showing a side panel
    Panel,
    /// Template evaluation in the isolated sandbox
    Sandbox,
    /// Opening and focusing tabs
    Tabs,
}

impl PlatformCapability {
    /// All capabilities, in declaration order
    pub const ALL: [PlatformCapability; 9] = [
        PlatformCapability::Dom,
        PlatformCapability::Http,
        PlatformCapability::Audio,
        PlatformCapability::Capture,
        PlatformCapability::ClipboardWrite,
        PlatformCapability::Form,
        PlatformCapability::Panel,
        PlatformCapability::Sandbox,
        PlatformCapability::Tabs,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PlatformCapability::Dom => "dom",
            PlatformCapability::Http => "http",
            PlatformCapability::Audio => "audio",
            PlatformCapability::Capture => "capture",
            PlatformCapability::ClipboardWrite => "clipboardWrite",
            PlatformCapability::Form => "form",
            PlatformCapability::Panel => "panel",
            PlatformCapability::Sandbox => "sandbox",
            PlatformCapability::Tabs => "tabs",
        }
    }
}

impl fmt::Display for PlatformCapability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A process the runtime can execute code in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub enum ExecutionContext {
    /// Attached to the target page; owns the DOM
    #[default]
    ContentScript,
    /// Background/service worker; owns network, audio and capture
    Background,
    /// DOM-less isolated frame used for template evaluation
    Sandbox,
}

impl fmt::Display for ExecutionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ExecutionContext::ContentScript => "contentScript",
            ExecutionContext::Background => "background",
            ExecutionContext::Sandbox => "sandbox",
        };
        f.write_str(name)
    }
}
