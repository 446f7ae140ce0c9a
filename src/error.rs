//! Error taxonomy for brick execution
//!
//! Every failure a brick, the template sandbox, or the capability router can
//! produce is expressed as a [`BrickError`]. The interpreter classifies errors
//! with [`BrickError::kind`] to decide how they surface to the end user.

use crate::platform::{ExecutionContext, PlatformCapability};
use thiserror::Error;

/// Message shown to end users for errors that are not user-correctable
pub const GENERIC_ERROR_MESSAGE: &str = "An error occurred";

/// Classification of an error for user-facing surfaces
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum ErrorKind {
    /// User-correctable condition raised deliberately by a brick
    Business,
    /// The current execution context cannot satisfy a declared capability
    Capability,
    /// Terminal cancellation state
    Abort,
    /// Defect in a brick or in the runtime itself
    Unexpected,
}

/// Errors raised while executing bricks
#[derive(Debug, Clone, Error, PartialEq)]
pub enum BrickError {
    /// User-correctable condition (e.g., "element not found")
    #[error("{message}")]
    Business { message: String },

    /// A specific input property was invalid
    #[error("Invalid value for property '{property}' of {brick_id}: {message}")]
    Prop {
        brick_id: String,
        property: String,
        message: String,
    },

    /// The current context cannot satisfy a declared capability
    #[error("Capability '{capability}' is not available on platform '{platform}'")]
    CapabilityNotAvailable {
        platform: String,
        capability: PlatformCapability,
    },

    /// No brick is registered under the id
    #[error("Brick not found: {0}")]
    NotFound(String),

    /// Template could not be parsed or rendered
    #[error("Template error: {0}")]
    Template(String),

    /// A cross-context call could not reach its target
    #[error("The {context} context is unreachable: {reason}")]
    ContextUnreachable {
        context: ExecutionContext,
        reason: String,
    },

    /// Execution was cancelled through the abort signal
    #[error("Run aborted")]
    Aborted,

    /// Anything else
    #[error("{0}")]
    Unexpected(String),
}

impl BrickError {
    /// Create a business error
    pub fn business(message: impl Into<String>) -> Self {
        BrickError::Business {
            message: message.into(),
        }
    }

    /// Create a property error for a brick input
    pub fn prop(
        brick_id: impl Into<String>,
        property: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        BrickError::Prop {
            brick_id: brick_id.into(),
            property: property.into(),
            message: message.into(),
        }
    }

    /// Create an unexpected error from anything displayable
    pub fn unexpected(error: impl std::fmt::Display) -> Self {
        BrickError::Unexpected(error.to_string())
    }

    /// Classify the error
    pub fn kind(&self) -> ErrorKind {
        match self {
            BrickError::Business { .. } | BrickError::Prop { .. } | BrickError::Template(_) => {
                ErrorKind::Business
            }
            BrickError::CapabilityNotAvailable { .. } => ErrorKind::Capability,
            BrickError::Aborted => ErrorKind::Abort,
            BrickError::NotFound(_)
            | BrickError::ContextUnreachable { .. }
            | BrickError::Unexpected(_) => ErrorKind::Unexpected,
        }
    }

    pub fn is_abort(&self) -> bool {
        matches!(self, BrickError::Aborted)
    }

    /// Message to show the end user
    ///
    /// Business and capability errors are shown verbatim; defects are shown
    /// in degraded form.
    pub fn user_message(&self) -> String {
        match self.kind() {
            ErrorKind::Business | ErrorKind::Capability => self.to_string(),
            ErrorKind::Abort => "Cancelled".to_string(),
            ErrorKind::Unexpected => GENERIC_ERROR_MESSAGE.to_string(),
        }
    }

    /// Short name used in traces and in `@error` bindings
    pub fn name(&self) -> &'static str {
        match self {
            BrickError::Business { .. } => "BusinessError",
            BrickError::Prop { .. } => "PropError",
            BrickError::CapabilityNotAvailable { .. } => "PlatformCapabilityNotAvailableError",
            BrickError::NotFound(_) => "NotFoundError",
            BrickError::Template(_) => "TemplateRenderError",
            BrickError::ContextUnreachable { .. } => "ContextUnreachableError",
            BrickError::Aborted => "AbortError",
            BrickError::Unexpected(_) => "Error",
        }
    }

    /// Serialize the error for a template context
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "name": self.name(),
            "message": self.to_string(),
        })
    }
}

/// A pipeline halted at a failing step
#[derive(Debug, Clone, Error)]
#[error("Step {step_index} ({label}) failed: {source}")]
pub struct PipelineError {
    /// Zero-based index of the failing step within its pipeline
    pub step_index: usize,

    /// Label shown to the user for the failing step
    pub label: String,

    /// Registry id of the failing brick
    pub brick_id: String,

    /// Mod the pipeline belongs to, if known
    pub mod_id: Option<String>,

    #[source]
    pub source: BrickError,
}

impl PipelineError {
    pub fn kind(&self) -> ErrorKind {
        self.source.kind()
    }

    /// Message for end-user surfaces, including the step label
    pub fn user_message(&self) -> String {
        format!("{}: {}", self.label, self.source.user_message())
    }
}
