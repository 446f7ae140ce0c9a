//! Typed request/response protocol for cross-context capability calls

use crate::error::BrickError;
use crate::platform::{ExecutionContext, PlatformCapability};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use thiserror::Error;

/// HTTP method for [`HttpRequest`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    #[default]
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

/// Outbound HTTP request executed by the background context
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HttpRequest {
    pub url: String,

    #[serde(default)]
    pub method: HttpMethod,

    #[serde(default)]
    pub params: BTreeMap<String, String>,

    #[serde(default)]
    pub headers: BTreeMap<String, String>,

    #[serde(default)]
    pub data: Option<Value>,
}

impl HttpRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            method: HttpMethod::Get,
            params: BTreeMap::new(),
            headers: BTreeMap::new(),
            data: None,
        }
    }
}

/// Response to an [`HttpRequest`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HttpResponse {
    pub status: u16,

    #[serde(default)]
    pub headers: BTreeMap<String, String>,

    /// Parsed JSON body, or the body text when it is not JSON
    pub data: Value,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// A capability-scoped operation dispatched to an execution context
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum PlatformRequest {
    Http(HttpRequest),
    PlayAudio { sound: String },
    StartAudioCapture,
    StopAudioCapture,
    OpenTab { url: String },
    /// Render a batch of templates against one context snapshot
    RenderTemplates { templates: Vec<String>, context: Value },
}

impl PlatformRequest {
    /// The capability whose handler serves this request
    pub fn capability(&self) -> PlatformCapability {
        match self {
            PlatformRequest::Http(_) => PlatformCapability::Http,
            PlatformRequest::PlayAudio { .. } => PlatformCapability::Audio,
            PlatformRequest::StartAudioCapture | PlatformRequest::StopAudioCapture => {
                PlatformCapability::Capture
            }
            PlatformRequest::OpenTab { .. } => PlatformCapability::Tabs,
            PlatformRequest::RenderTemplates { .. } => PlatformCapability::Sandbox,
        }
    }
}

/// Errors produced by the messaging layer and by remote handlers
#[derive(Debug, Clone, Error, PartialEq)]
pub enum PlatformError {
    #[error("{context} is unreachable: {reason}")]
    Unreachable {
        context: ExecutionContext,
        reason: String,
    },

    #[error("No response from {context} within {timeout_ms}ms")]
    Timeout {
        context: ExecutionContext,
        timeout_ms: u64,
    },

    #[error("Request aborted")]
    Aborted,

    #[error("{context} has no handler for capability '{capability}'")]
    Unsupported {
        context: ExecutionContext,
        capability: PlatformCapability,
    },

    /// User-correctable failure reported by the handler
    #[error("{0}")]
    Business(String),

    /// Template failure reported by the sandbox
    #[error("{0}")]
    Template(String),

    /// Any other handler failure
    #[error("{0}")]
    Remote(String),
}

impl From<PlatformError> for BrickError {
    fn from(error: PlatformError) -> Self {
        match error {
            PlatformError::Unreachable { context, reason } => {
                BrickError::ContextUnreachable { context, reason }
            }
            PlatformError::Timeout {
                context,
                timeout_ms,
            } => BrickError::ContextUnreachable {
                context,
                reason: format!("no response within {}ms", timeout_ms),
            },
            PlatformError::Aborted => BrickError::Aborted,
            PlatformError::Unsupported {
                context,
                capability,
            } => BrickError::CapabilityNotAvailable {
                platform: context.to_string(),
                capability,
            },
            PlatformError::Business(message) => BrickError::business(message),
            PlatformError::Template(message) => BrickError::Template(message),
            PlatformError::Remote(message) => BrickError::Unexpected(message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_capability_table() {
        assert_eq!(
            PlatformRequest::Http(HttpRequest::get("https://example.com")).capability(),
            PlatformCapability::Http
        );
        assert_eq!(
            PlatformRequest::StopAudioCapture.capability(),
            PlatformCapability::Capture
        );
        assert_eq!(
            PlatformRequest::RenderTemplates {
                templates: vec![],
                context: json!({}),
            }
            .capability(),
            PlatformCapability::Sandbox
        );
    }

    #[test]
    fn test_request_wire_shape() {
        let request = PlatformRequest::OpenTab {
            url: "https://example.com".to_string(),
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value, json!({"type": "openTab", "url": "https://example.com"}));
    }

    #[test]
    fn test_messaging_errors_become_recognizable_kinds() {
        let error: BrickError = PlatformError::Timeout {
            context: ExecutionContext::Background,
            timeout_ms: 500,
        }
        .into();
        assert!(matches!(
            error,
            BrickError::ContextUnreachable {
                context: ExecutionContext::Background,
                ..
            }
        ));

        let error: BrickError = PlatformError::Aborted.into();
        assert!(error.is_abort());

        let error: BrickError = PlatformError::Business("Not found".to_string()).into();
        assert_eq!(error.user_message(), "Not found");
    }
}
