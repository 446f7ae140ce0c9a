use crate::bricks::service::SERVICE_MARKER;
use crate::bricks::{BrickArgs, BrickMetadata, BrickOptions, Transformer};
use crate::error::BrickError;
use crate::platform::{HttpRequest, PlatformCapability};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::BTreeMap;

/// `@pixiebrix/http/get`: fetch a URL from the background context
///
/// With a configured `service`, a relative `url` is resolved against the
/// service's base URL and its headers and params are sent too; explicit
/// `headers` and `params` win.
pub struct HttpGetTransformer {
    metadata: BrickMetadata,
}

impl HttpGetTransformer {
    pub const ID: &'static str = "@pixiebrix/http/get";

    pub fn new() -> Self {
        Self {
            metadata: BrickMetadata::new(Self::ID, "HTTP GET")
                .with_description("Fetch data with an HTTP GET request")
                .with_input_schema(json!({
                    "type": "object",
                    "properties": {
                        "url": {"type": "string"},
                        "service": {"type": "object", "required": [SERVICE_MARKER]},
                        "params": {"type": "object", "additionalProperties": {"type": "string"}},
                        "headers": {"type": "object", "additionalProperties": {"type": "string"}}
                    },
                    "required": ["url"]
                })),
        }
    }
}

fn string_map(value: Option<&Value>) -> BTreeMap<String, String> {
    value
        .and_then(Value::as_object)
        .map(|map| {
            map.iter()
                .map(|(key, value)| {
                    let text = match value {
                        Value::String(text) => text.clone(),
                        other => other.to_string(),
                    };
                    (key.clone(), text)
                })
                .collect()
        })
        .unwrap_or_default()
}

/// Join a relative url onto the service's base URL
fn resolve_url(service: &Value, url: &str) -> String {
    let base = service.get("baseURL").and_then(Value::as_str).unwrap_or_default();
    if base.is_empty() || url.contains("://") {
        return url.to_string();
    }
    format!("{}/{}", base.trim_end_matches('/'), url.trim_start_matches('/'))
}

#[async_trait]
impl Transformer for HttpGetTransformer {
    fn metadata(&self) -> &BrickMetadata {
        &self.metadata
    }

    async fn required_capabilities(&self, _args: &BrickArgs) -> Vec<PlatformCapability> {
        vec![PlatformCapability::Http]
    }

    async fn transform(&self, args: &BrickArgs, options: &BrickOptions) -> Result<Value, BrickError> {
        let url = args.require_str(Self::ID, "url")?;
        let mut request = match args.get("service") {
            Some(service) => {
                let mut request = HttpRequest::get(resolve_url(service, url));
                request.params = string_map(service.get("params"));
                request.headers = string_map(service.get("headers"));
                request
            }
            None => HttpRequest::get(url),
        };
        request.params.extend(string_map(args.get("params")));
        request.headers.extend(string_map(args.get("headers")));

        let response = options.platform.request(request, &options.abort_signal).await?;
        if !response.is_success() {
            return Err(BrickError::business(format!(
                "Request failed with status code {}",
                response.status
            )));
        }
        Ok(json!({
            "status": response.status,
            "headers": response.headers,
            "data": response.data,
        }))
    }
}
