//! Capability handlers served by the background context

use crate::platform::protocol::{HttpMethod, HttpRequest, HttpResponse, PlatformError, PlatformRequest};
use crate::platform::rpc::{CapabilityHandler, HandlerTable};
use crate::platform::{ExecutionContext, PlatformCapability};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Performs [`HttpRequest`]s with reqwest
pub struct HttpRequestHandler {
    client: Client,
}

impl HttpRequestHandler {
    pub fn new(timeout: Duration) -> Result<Self, PlatformError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("brick-runtime/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| PlatformError::Remote(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self { client })
    }

    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, PlatformError> {
        let url = reqwest::Url::parse(&request.url)
            .map_err(|e| PlatformError::Business(format!("Invalid URL '{}': {}", request.url, e)))?;

        let method = match request.method {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Post => reqwest::Method::POST,
            HttpMethod::Put => reqwest::Method::PUT,
            HttpMethod::Patch => reqwest::Method::PATCH,
            HttpMethod::Delete => reqwest::Method::DELETE,
        };

        let mut builder = self.client.request(method, url);
        if !request.params.is_empty() {
            builder = builder.query(&request.params);
        }
        for (name, value) in &request.headers {
            builder = builder.header(name, value);
        }
        if let Some(data) = &request.data {
            builder = builder.json(data);
        }

        debug!("Sending {:?} {}", request.method, request.url);
        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                PlatformError::Business(format!("Request to {} timed out", request.url))
            } else {
                PlatformError::Business(format!("Request to {} failed: {}", request.url, e))
            }
        })?;

        let status = response.status().as_u16();
        let headers: BTreeMap<String, String> = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|value| (name.to_string(), value.to_string()))
            })
            .collect();
        let body = response
            .text()
            .await
            .map_err(|e| PlatformError::Remote(format!("Failed to read response body: {}", e)))?;
        let data = serde_json::from_str(&body).unwrap_or(Value::String(body));

        Ok(HttpResponse {
            status,
            headers,
            data,
        })
    }
}

#[async_trait]
impl CapabilityHandler for HttpRequestHandler {
    async fn handle(
        &self,
        request: PlatformRequest,
        cancel: CancellationToken,
    ) -> Result<Value, PlatformError> {
        let PlatformRequest::Http(request) = request else {
            return Err(PlatformError::Remote("expected an http request".to_string()));
        };

        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(PlatformError::Aborted),
            response = self.send(request) => {
                let response = response?;
                serde_json::to_value(response).map_err(|e| PlatformError::Remote(e.to_string()))
            }
        }
    }
}

/// Serves `OpenTab` by logging the url; there is no browser to open it in
pub struct TabOpenHandler;

#[async_trait]
impl CapabilityHandler for TabOpenHandler {
    async fn handle(
        &self,
        request: PlatformRequest,
        _cancel: CancellationToken,
    ) -> Result<Value, PlatformError> {
        match request {
            PlatformRequest::OpenTab { url } => {
                info!("Opening tab: {}", url);
                Ok(Value::Null)
            }
            _ => Err(PlatformError::Remote("expected an openTab request".to_string())),
        }
    }
}

/// Default handler table for the background context
pub fn background_handlers(http_timeout: Duration) -> Result<HandlerTable, PlatformError> {
    Ok(HandlerTable::new(ExecutionContext::Background)
        .with(
            PlatformCapability::Http,
            Arc::new(HttpRequestHandler::new(http_timeout)?),
        )
        .with(PlatformCapability::Tabs, Arc::new(TabOpenHandler)))
}
