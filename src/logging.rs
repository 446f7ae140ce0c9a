//! Structured logger handed to bricks
//!
//! A [`BrickLogger`] is bound to a [`MessageContext`] identifying the mod,
//! component, brick and run that produced a message. Messages are emitted as
//! `tracing` events carrying those fields and, when a [`LogBuffer`] is
//! attached, recorded for later inspection.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use uuid::Uuid;

/// Identifiers attached to every log message
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageContext {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mod_id: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub mod_component_id: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub brick_id: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub run_id: Option<Uuid>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub step_index: Option<usize>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

impl MessageContext {
    /// Fields of `other` that are set override ours
    pub fn merge(&self, other: &MessageContext) -> MessageContext {
        MessageContext {
            mod_id: other.mod_id.clone().or_else(|| self.mod_id.clone()),
            mod_component_id: other
                .mod_component_id
                .clone()
                .or_else(|| self.mod_component_id.clone()),
            brick_id: other.brick_id.clone().or_else(|| self.brick_id.clone()),
            run_id: other.run_id.or(self.run_id),
            step_index: other.step_index.or(self.step_index),
            label: other.label.clone().or_else(|| self.label.clone()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        };
        f.write_str(name)
    }
}

/// A recorded log message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub level: LogLevel,
    pub message: String,
    pub context: MessageContext,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

/// Shared, append-only record of log entries
#[derive(Debug, Clone, Default)]
pub struct LogBuffer {
    entries: Arc<Mutex<Vec<LogEntry>>>,
}

impl LogBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&self, entry: LogEntry) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(entry);
    }

    pub fn entries(&self) -> Vec<LogEntry> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Entries at or above `level`
    pub fn at_least(&self, level: LogLevel) -> Vec<LogEntry> {
        self.entries()
            .into_iter()
            .filter(|entry| entry.level >= level)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Logger bound to a message context
#[derive(Debug, Clone, Default)]
pub struct BrickLogger {
    context: MessageContext,
    buffer: Option<LogBuffer>,
}

impl BrickLogger {
    pub fn new(context: MessageContext) -> Self {
        Self {
            context,
            buffer: None,
        }
    }

    pub fn with_buffer(mut self, buffer: LogBuffer) -> Self {
        self.buffer = Some(buffer);
        self
    }

    pub fn context(&self) -> &MessageContext {
        &self.context
    }

    /// Logger with extra context; the parent is left untouched
    pub fn child(&self, context: MessageContext) -> BrickLogger {
        BrickLogger {
            context: self.context.merge(&context),
            buffer: self.buffer.clone(),
        }
    }

    pub fn debug(&self, message: impl Into<String>) {
        self.log(LogLevel::Debug, message.into(), None);
    }

    pub fn info(&self, message: impl Into<String>) {
        self.log(LogLevel::Info, message.into(), None);
    }

    pub fn warn(&self, message: impl Into<String>) {
        self.log(LogLevel::Warn, message.into(), None);
    }

    pub fn error(&self, message: impl Into<String>) {
        self.log(LogLevel::Error, message.into(), None);
    }

    /// Log with a structured payload
    pub fn log(&self, level: LogLevel, message: String, data: Option<Value>) {
        let ctx = &self.context;
        let mod_id = ctx.mod_id.as_deref().unwrap_or_default();
        let component = ctx.mod_component_id.as_deref().unwrap_or_default();
        let brick_id = ctx.brick_id.as_deref().unwrap_or_default();
        let run_id = ctx.run_id.map(|id| id.to_string()).unwrap_or_default();
        let run_id = run_id.as_str();
        let step = ctx.step_index.map(|index| index as i64).unwrap_or(-1);

        match level {
            LogLevel::Debug => tracing::debug!(mod_id, component, brick_id, run_id, step, "{}", message),
            LogLevel::Info => tracing::info!(mod_id, component, brick_id, run_id, step, "{}", message),
            LogLevel::Warn => tracing::warn!(mod_id, component, brick_id, run_id, step, "{}", message),
            LogLevel::Error => tracing::error!(mod_id, component, brick_id, run_id, step, "{}", message),
        }

        if let Some(buffer) = &self.buffer {
            buffer.push(LogEntry {
                timestamp: Utc::now(),
                level,
                message,
                context: self.context.clone(),
                data,
            });
        }
    }
}
