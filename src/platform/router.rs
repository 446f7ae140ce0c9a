//! Capability → execution context routing

use crate::error::BrickError;
use crate::execution::AbortSignal;
use crate::platform::protocol::PlatformRequest;
use crate::platform::rpc::{HandlerTable, RpcClient};
use crate::platform::{ExecutionContext, PlatformCapability};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::time::Duration;
use tracing::debug;

/// Context that owns each capability
///
/// The table is static: routing never depends on the individual call.
pub fn target_context(capability: PlatformCapability) -> ExecutionContext {
    match capability {
        PlatformCapability::Dom
        | PlatformCapability::ClipboardWrite
        | PlatformCapability::Form
        | PlatformCapability::Panel => ExecutionContext::ContentScript,
        PlatformCapability::Http
        | PlatformCapability::Audio
        | PlatformCapability::Capture
        | PlatformCapability::Tabs => ExecutionContext::Background,
        PlatformCapability::Sandbox => ExecutionContext::Sandbox,
    }
}

/// Where a request for a capability is served from the router's point of view
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// Served by a handler in this process
    InProcess,
    /// Forwarded to another context over RPC
    Remote(ExecutionContext),
    /// No viable target
    Unavailable,
}

/// Dispatches capability-scoped requests to the context that owns them
#[derive(Debug, Clone)]
pub struct CapabilityRouter {
    local: ExecutionContext,
    local_handlers: HandlerTable,
    endpoints: HashMap<ExecutionContext, RpcClient>,
    disabled: HashSet<PlatformCapability>,
    rpc_timeout: Duration,
    template_timeout: Duration,
}

impl CapabilityRouter {
    pub fn new(local: ExecutionContext) -> Self {
        Self {
            local,
            local_handlers: HandlerTable::new(local),
            endpoints: HashMap::new(),
            disabled: HashSet::new(),
            rpc_timeout: Duration::from_secs(30),
            template_timeout: Duration::from_secs(5),
        }
    }

    pub fn with_local_handlers(mut self, handlers: HandlerTable) -> Self {
        self.local_handlers = handlers;
        self
    }

    pub fn with_endpoint(mut self, client: RpcClient) -> Self {
        self.endpoints.insert(client.context(), client);
        self
    }

    pub fn disable(mut self, capability: PlatformCapability) -> Self {
        self.disabled.insert(capability);
        self
    }

    pub fn with_rpc_timeout(mut self, timeout: Duration) -> Self {
        self.rpc_timeout = timeout;
        self
    }

    pub fn with_template_timeout(mut self, timeout: Duration) -> Self {
        self.template_timeout = timeout;
        self
    }

    /// Context this router runs in
    pub fn local(&self) -> ExecutionContext {
        self.local
    }

    pub fn is_disabled(&self, capability: PlatformCapability) -> bool {
        self.disabled.contains(&capability)
    }

    /// Resolve the route for a capability
    pub fn route(&self, capability: PlatformCapability) -> Route {
        if self.is_disabled(capability) {
            return Route::Unavailable;
        }

        let target = target_context(capability);
        if target == self.local {
            if self.local_handlers.supports(capability) {
                Route::InProcess
            } else {
                Route::Unavailable
            }
        } else {
            match self.endpoints.get(&target) {
                Some(client) if client.supports(capability) => Route::Remote(target),
                _ => Route::Unavailable,
            }
        }
    }

    /// Whether a request for the capability has somewhere to go
    pub fn can_dispatch(&self, capability: PlatformCapability) -> bool {
        self.route(capability) != Route::Unavailable
    }

    /// Dispatch a request and convert every failure into a [`BrickError`]
    pub async fn dispatch(
        &self,
        request: PlatformRequest,
        abort: &AbortSignal,
    ) -> Result<Value, BrickError> {
        let capability = request.capability();
        let timeout = match capability {
            PlatformCapability::Sandbox => self.template_timeout,
            _ => self.rpc_timeout,
        };

        match self.route(capability) {
            Route::InProcess => {
                debug!(capability = %capability, "dispatching in-process");
                let cancel = abort.token().child_token();
                let result = tokio::time::timeout(
                    timeout,
                    self.local_handlers.handle(request, cancel.clone()),
                )
                .await;
                match result {
                    Ok(result) => result.map_err(BrickError::from),
                    Err(_) => {
                        cancel.cancel();
                        Err(BrickError::ContextUnreachable {
                            context: self.local,
                            reason: format!("no response within {}ms", timeout.as_millis()),
                        })
                    }
                }
            }
            Route::Remote(target) => {
                debug!(capability = %capability, target = %target, "dispatching over rpc");
                let client = self.endpoints.get(&target).ok_or_else(|| {
                    BrickError::ContextUnreachable {
                        context: target,
                        reason: "no connection".to_string(),
                    }
                })?;
                client
                    .call(request, abort, timeout)
                    .await
                    .map_err(BrickError::from)
            }
            Route::Unavailable => Err(BrickError::CapabilityNotAvailable {
                platform: self.local.to_string(),
                capability,
            }),
        }
    }
}
