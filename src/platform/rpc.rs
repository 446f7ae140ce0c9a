//! Async RPC between execution contexts
//!
//! Each context that serves capabilities runs a [`ContextHost`]: a task that
//! owns a [`HandlerTable`] (capability → handler) and answers requests sent
//! over an mpsc channel. Callers hold an [`RpcClient`] and await a oneshot
//! reply. Aborts are forwarded to the host as a cancelled token, but the
//! caller never waits for the host to acknowledge them.

use crate::execution::AbortSignal;
use crate::platform::protocol::{PlatformError, PlatformRequest};
use crate::platform::{ExecutionContext, PlatformCapability};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Serves requests for one capability
#[async_trait]
pub trait CapabilityHandler: Send + Sync {
    /// Handle a request. `cancel` fires when the caller aborted.
    async fn handle(
        &self,
        request: PlatformRequest,
        cancel: CancellationToken,
    ) -> Result<Value, PlatformError>;
}

/// Handler backed by a plain function, mostly for tests and simple hosts
pub struct FnHandler<F> {
    handler: F,
}

impl<F> FnHandler<F>
where
    F: Fn(PlatformRequest) -> Result<Value, PlatformError> + Send + Sync,
{
    pub fn new(handler: F) -> Self {
        Self { handler }
    }
}

#[async_trait]
impl<F> CapabilityHandler for FnHandler<F>
where
    F: Fn(PlatformRequest) -> Result<Value, PlatformError> + Send + Sync,
{
    async fn handle(
        &self,
        request: PlatformRequest,
        _cancel: CancellationToken,
    ) -> Result<Value, PlatformError> {
        (self.handler)(request)
    }
}

/// Capability → handler table for one execution context
#[derive(Clone)]
pub struct HandlerTable {
    context: ExecutionContext,
    handlers: HashMap<PlatformCapability, Arc<dyn CapabilityHandler>>,
}

impl HandlerTable {
    pub fn new(context: ExecutionContext) -> Self {
        Self {
            context,
            handlers: HashMap::new(),
        }
    }

    /// Builder-style registration
    pub fn with(mut self, capability: PlatformCapability, handler: Arc<dyn CapabilityHandler>) -> Self {
        self.insert(capability, handler);
        self
    }

    pub fn insert(&mut self, capability: PlatformCapability, handler: Arc<dyn CapabilityHandler>) {
        self.handlers.insert(capability, handler);
    }

    pub fn context(&self) -> ExecutionContext {
        self.context
    }

    pub fn supports(&self, capability: PlatformCapability) -> bool {
        self.handlers.contains_key(&capability)
    }

    pub fn capabilities(&self) -> HashSet<PlatformCapability> {
        self.handlers.keys().copied().collect()
    }

    /// Dispatch a request to the handler registered for its capability
    pub async fn handle(
        &self,
        request: PlatformRequest,
        cancel: CancellationToken,
    ) -> Result<Value, PlatformError> {
        let capability = request.capability();
        let handler = self
            .handlers
            .get(&capability)
            .cloned()
            .ok_or(PlatformError::Unsupported {
                context: self.context,
                capability,
            })?;

        tokio::select! {
            result = handler.handle(request, cancel.clone()) => result,
            _ = cancel.cancelled() => Err(PlatformError::Aborted),
        }
    }
}

impl fmt::Debug for HandlerTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut capabilities: Vec<_> = self.handlers.keys().collect();
        capabilities.sort();
        f.debug_struct("HandlerTable")
            .field("context", &self.context)
            .field("capabilities", &capabilities)
            .finish()
    }
}

struct Envelope {
    request: PlatformRequest,
    cancel: CancellationToken,
    reply: oneshot::Sender<Result<Value, PlatformError>>,
}

/// Task serving a [`HandlerTable`] over a message channel
pub struct ContextHost {
    table: HandlerTable,
    buffer: usize,
}

impl ContextHost {
    pub fn new(table: HandlerTable) -> Self {
        Self { table, buffer: 64 }
    }

    /// Spawn the host on the current tokio runtime and return a client
    ///
    /// The host stops once every client has been dropped.
    pub fn spawn(self) -> RpcClient {
        let (sender, mut receiver) = mpsc::channel::<Envelope>(self.buffer);
        let context = self.table.context();
        let capabilities = Arc::new(self.table.capabilities());
        let table = Arc::new(self.table);

        tokio::spawn(async move {
            debug!(context = %context, "context host started");
            while let Some(envelope) = receiver.recv().await {
                let table = table.clone();
                tokio::spawn(async move {
                    let Envelope {
                        request,
                        cancel,
                        reply,
                    } = envelope;
                    let result = table.handle(request, cancel).await;
                    // The caller may have given up already
                    let _ = reply.send(result);
                });
            }
            debug!(context = %context, "context host stopped");
        });

        RpcClient {
            context,
            sender,
            capabilities,
        }
    }
}

/// Caller side of a connection to a [`ContextHost`]
#[derive(Clone)]
pub struct RpcClient {
    context: ExecutionContext,
    sender: mpsc::Sender<Envelope>,
    capabilities: Arc<HashSet<PlatformCapability>>,
}

impl RpcClient {
    /// Context served by the host on the other end
    pub fn context(&self) -> ExecutionContext {
        self.context
    }

    /// Whether the host registered a handler for the capability
    pub fn supports(&self, capability: PlatformCapability) -> bool {
        self.capabilities.contains(&capability)
    }

    /// Whether the host is still running
    pub fn is_connected(&self) -> bool {
        !self.sender.is_closed()
    }

    /// Send a request and await the reply
    ///
    /// Resolves as soon as the reply arrives, `abort` fires, or `timeout`
    /// elapses. On abort/timeout the host is told to cancel, best effort.
    pub async fn call(
        &self,
        request: PlatformRequest,
        abort: &AbortSignal,
        timeout: Duration,
    ) -> Result<Value, PlatformError> {
        if abort.is_aborted() {
            return Err(PlatformError::Aborted);
        }

        let cancel = CancellationToken::new();
        let (reply, response) = oneshot::channel();
        let envelope = Envelope {
            request,
            cancel: cancel.clone(),
            reply,
        };

        self.sender
            .send(envelope)
            .await
            .map_err(|_| PlatformError::Unreachable {
                context: self.context,
                reason: "message channel closed".to_string(),
            })?;

        tokio::select! {
            result = response => match result {
                Ok(result) => result,
                Err(_) => {
                    warn!(context = %self.context, "context dropped request without replying");
                    Err(PlatformError::Unreachable {
                        context: self.context,
                        reason: "response channel closed".to_string(),
                    })
                }
            },
            _ = abort.aborted() => {
                cancel.cancel();
                Err(PlatformError::Aborted)
            }
            _ = tokio::time::sleep(timeout) => {
                cancel.cancel();
                Err(PlatformError::Timeout {
                    context: self.context,
                    timeout_ms: timeout.as_millis() as u64,
                })
            }
        }
    }
}

impl fmt::Debug for RpcClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RpcClient")
            .field("context", &self.context)
            .field("connected", &self.is_connected())
            .finish()
    }
}
