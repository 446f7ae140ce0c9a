//! Service definitions
//!
//! A service describes an external API: the configuration a user supplies
//! (`inputSchema`) and how requests authenticate with it. Templates in
//! `authentication` reference configuration fields by name:
//!
//! ```yaml
//! kind: service
//! metadata:
//!   id: "@acme/api"
//!   name: Acme API
//! inputSchema:
//!   type: object
//!   properties:
//!     apiKey: {type: string}
//!   required: [apiKey]
//! authentication:
//!   baseURL: https://api.acme.com/v1
//!   headers:
//!     Authorization: "Bearer {{ apiKey }}"
//! ```
//!
//! Configuring a service renders its authentication into a value bricks
//! receive through the run context; the raw configuration is not exposed.

use super::schema::validate_args;
use crate::core::context::normalize_key;
use crate::error::BrickError;
use crate::templating::engine::render;
use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Marker key identifying a configured service value
pub const SERVICE_MARKER: &str = "__service";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ServiceMetadata {
    id: String,
    name: String,
    #[serde(default)]
    description: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ServiceDocument {
    metadata: ServiceMetadata,
    input_schema: Value,
    #[serde(default)]
    authentication: ServiceAuthentication,
}

/// How requests to the service authenticate; values are templates
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServiceAuthentication {
    #[serde(default, rename = "baseURL", skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    #[serde(default)]
    pub headers: BTreeMap<String, String>,

    #[serde(default)]
    pub params: BTreeMap<String, String>,
}

/// An external API bricks can be bound to
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceDefinition {
    pub id: String,
    pub name: String,
    pub description: String,

    /// JSON Schema of the user-supplied configuration
    pub input_schema: Value,

    pub authentication: ServiceAuthentication,
}

impl ServiceDefinition {
    /// Build from a `kind: service` document
    pub fn from_value(document: Value) -> Result<Self> {
        let document: ServiceDocument = serde_json::from_value(document)?;
        let id = document.metadata.id.trim().to_string();
        if id.is_empty() {
            bail!("Service definition is missing metadata.id");
        }
        Ok(Self {
            id,
            name: document.metadata.name,
            description: document.metadata.description,
            input_schema: document.input_schema,
            authentication: document.authentication,
        })
    }

    /// Validate `config` and render the authentication it implies
    ///
    /// The result is the value bound in the run context.
    pub fn configure(&self, config: Value) -> Result<Value, BrickError> {
        let config = validate_args(&self.id, &self.input_schema, config)?;
        let context: Map<String, Value> = match config {
            Value::Object(map) => map
                .into_iter()
                .map(|(key, value)| (normalize_key(&key), value))
                .collect(),
            _ => Map::new(),
        };
        let render_field = |template: &str| {
            render(template, &context)
                .map_err(|e| BrickError::Template(format!("Service {}: {}", self.id, e)))
        };

        let base_url = match &self.authentication.base_url {
            Some(template) => Value::String(render_field(template)?),
            None => Value::Null,
        };
        let mut headers = Map::new();
        for (name, template) in &self.authentication.headers {
            headers.insert(name.clone(), Value::String(render_field(template)?));
        }
        let mut params = Map::new();
        for (name, template) in &self.authentication.params {
            params.insert(name.clone(), Value::String(render_field(template)?));
        }

        let mut value = Map::new();
        value.insert(SERVICE_MARKER.to_string(), Value::String(self.id.clone()));
        value.insert("baseURL".to_string(), base_url);
        value.insert("headers".to_string(), Value::Object(headers));
        value.insert("params".to_string(), Value::Object(params));
        Ok(Value::Object(value))
    }
}
