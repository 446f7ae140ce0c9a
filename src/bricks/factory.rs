//! Bricks and services defined in YAML documents
//!
//! Every document is checked against a package schema first. An external
//! reader definition names a read function by `type` and carries that
//! function's configuration:
//!
//! ```yaml
//! kind: reader
//! metadata:
//!   id: "@acme/headline"
//!   name: Headline
//! definition:
//!   isAvailable:
//!     matchPatterns: ["https://example.com/*"]
//!   reader:
//!     type: selector
//!     selectors:
//!       headline: h1
//! ```
//!
//! `kind: service` documents load as [`ServiceDefinition`]s.

use super::schema::compile_schema;
use super::service::ServiceDefinition;
use super::{Brick, BrickMetadata, BrickOptions, Reader};
use crate::error::BrickError;
use crate::platform::{Document, ElementRef, Platform};
use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use dashmap::DashMap;
use jsonschema::JSONSchema;
use regex::Regex;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::path::Path;
use std::sync::{Arc, OnceLock};

/// Reads data from a document given the definition's reader config
pub type ReadFunction =
    Arc<dyn Fn(&Value, &Document, &ElementRef) -> Result<Value, BrickError> + Send + Sync>;

/// Shape every external definition must have
fn package_schema() -> Value {
    json!({
        "type": "object",
        "required": ["kind", "metadata"],
        "properties": {
            "kind": {"enum": ["reader", "service"]},
            "metadata": {
                "type": "object",
                "required": ["id", "name"],
                "properties": {
                    "id": {"type": "string", "pattern": "^\\S+$"},
                    "name": {"type": "string", "minLength": 1},
                    "description": {"type": "string"}
                }
            },
            "outputSchema": {"type": "object"}
        },
        "allOf": [
            {
                "if": {"properties": {"kind": {"const": "reader"}}},
                "then": {
                    "required": ["definition"],
                    "properties": {
                        "definition": {
                            "type": "object",
                            "required": ["reader"],
                            "properties": {
                                "reader": {
                                    "type": "object",
                                    "required": ["type"],
                                    "properties": {"type": {"type": "string"}}
                                },
                                "isAvailable": {
                                    "type": "object",
                                    "properties": {
                                        "matchPatterns": {"type": "array", "items": {"type": "string"}}
                                    }
                                }
                            }
                        }
                    }
                }
            },
            {
                "if": {"properties": {"kind": {"const": "service"}}},
                "then": {
                    "required": ["inputSchema"],
                    "properties": {
                        "inputSchema": {"type": "object"},
                        "authentication": {
                            "type": "object",
                            "properties": {
                                "baseURL": {"type": "string"},
                                "headers": {"type": "object", "additionalProperties": {"type": "string"}},
                                "params": {"type": "object", "additionalProperties": {"type": "string"}}
                            }
                        }
                    }
                }
            }
        ]
    })
}

fn compiled_package_schema() -> Result<&'static JSONSchema> {
    static SCHEMA: OnceLock<Result<JSONSchema, String>> = OnceLock::new();
    SCHEMA
        .get_or_init(|| compile_schema("package", &package_schema()).map_err(|e| e.to_string()))
        .as_ref()
        .map_err(|e| anyhow!("{}", e))
}

/// Check a document against the package schema, reporting every violation
fn validate_package(document: &Value) -> Result<()> {
    let schema = compiled_package_schema()?;
    if let Err(errors) = schema.validate(document) {
        let problems: Vec<String> = errors
            .map(|error| {
                let path = error.instance_path.to_string();
                if path.is_empty() {
                    error.to_string()
                } else {
                    format!("{}: {}", path, error)
                }
            })
            .collect();
        bail!("Invalid brick definition: {}", problems.join("; "));
    }
    Ok(())
}

/// A loaded external definition
#[derive(Debug)]
pub enum Package {
    Brick(Brick),
    Service(ServiceDefinition),
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DefinitionMetadata {
    id: String,
    name: String,
    #[serde(default)]
    description: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Availability {
    #[serde(default)]
    match_patterns: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReaderDefinition {
    #[serde(default)]
    is_available: Availability,
    reader: Value,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ExternalDefinition {
    metadata: DefinitionMetadata,
    definition: ReaderDefinition,
    #[serde(default)]
    output_schema: Option<Value>,
}

/// Builds reader bricks from external definitions
pub struct BrickFactory {
    read_functions: DashMap<String, ReadFunction>,
}

impl BrickFactory {
    /// Factory with the `selector` read function registered
    pub fn new() -> Self {
        let factory = Self {
            read_functions: DashMap::new(),
        };
        factory.register_factory("selector", Arc::new(read_selectors));
        factory
    }

    /// Register a read function under a `type` name
    pub fn register_factory(&self, kind: impl Into<String>, read: ReadFunction) {
        self.read_functions.insert(kind.into(), read);
    }

    /// Load a brick or service definition from a YAML file
    pub fn load_file<P: AsRef<Path>>(&self, path: P) -> Result<Package> {
        let content = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read brick definition: {}", path.as_ref().display()))?;
        self.load_yaml(&content)
    }

    /// Load a brick or service definition from YAML
    pub fn load_yaml(&self, yaml: &str) -> Result<Package> {
        let document: Value = serde_yaml::from_str(yaml)?;
        validate_package(&document)?;
        match document.get("kind").and_then(Value::as_str) {
            Some("service") => Ok(Package::Service(ServiceDefinition::from_value(document)?)),
            Some("reader") => {
                let definition: ExternalDefinition = serde_json::from_value(document)?;
                Ok(Package::Brick(self.from_definition(definition)?))
            }
            other => bail!("Unsupported brick definition kind: {:?}", other),
        }
    }

    pub fn from_file<P: AsRef<Path>>(&self, path: P) -> Result<Brick> {
        let content = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read brick definition: {}", path.as_ref().display()))?;
        self.from_yaml(&content)
    }

    /// Build a brick from a YAML definition
    pub fn from_yaml(&self, yaml: &str) -> Result<Brick> {
        match self.load_yaml(yaml)? {
            Package::Brick(brick) => Ok(brick),
            Package::Service(service) => bail!("{} is a service definition, not a brick", service.id),
        }
    }

    fn from_definition(&self, definition: ExternalDefinition) -> Result<Brick> {

        let id = definition.metadata.id.trim().to_string();
        if id.is_empty() {
            bail!("Brick definition is missing metadata.id");
        }

        let Some(kind) = definition.definition.reader.get("type").and_then(Value::as_str) else {
            bail!("Reader definition {} is missing reader.type", id);
        };
        let read = self
            .read_functions
            .get(kind)
            .map(|entry| entry.value().clone())
            .with_context(|| format!("No read function registered for type '{}'", kind))?;

        let patterns = definition
            .definition
            .is_available
            .match_patterns
            .iter()
            .map(|pattern| match_pattern(pattern))
            .collect::<Result<Vec<_>>>()?;

        let mut metadata = BrickMetadata::new(id, definition.metadata.name)
            .with_description(definition.metadata.description);
        if let Some(schema) = definition.output_schema {
            metadata = metadata.with_output_schema(schema);
        }

        Ok(Brick::reader(ExternalReader {
            metadata,
            config: definition.definition.reader,
            patterns,
            read,
        }))
    }
}

impl Default for BrickFactory {
    fn default() -> Self {
        Self::new()
    }
}

/// Compile a URL match pattern where `*` matches any run of characters
fn match_pattern(pattern: &str) -> Result<Regex> {
    let escaped = regex::escape(pattern).replace(r"\*", ".*");
    Regex::new(&format!("^{}$", escaped)).with_context(|| format!("Invalid match pattern: {}", pattern))
}

/// Text of the first element matching each configured selector
fn read_selectors(config: &Value, document: &Document, root: &ElementRef) -> Result<Value, BrickError> {
    let selectors = config
        .get("selectors")
        .and_then(Value::as_object)
        .ok_or_else(|| BrickError::business("selector reader requires a 'selectors' map"))?;

    let mut result = Map::new();
    for (key, selector) in selectors {
        let selector = selector
            .as_str()
            .ok_or_else(|| BrickError::business(format!("selector for '{}' must be a string", key)))?;
        let text = document
            .query(root, selector)
            .into_iter()
            .next()
            .map(|element| Value::String(element.text))
            .unwrap_or(Value::Null);
        result.insert(key.clone(), text);
    }
    Ok(Value::Object(result))
}

struct ExternalReader {
    metadata: BrickMetadata,
    config: Value,
    patterns: Vec<Regex>,
    read: ReadFunction,
}

#[async_trait]
impl Reader for ExternalReader {
    fn metadata(&self) -> &BrickMetadata {
        &self.metadata
    }

    async fn is_available(&self, platform: &Platform) -> bool {
        if self.patterns.is_empty() {
            return true;
        }
        match platform.page() {
            Some(page) => {
                let document = page.document();
                self.patterns.iter().any(|pattern| pattern.is_match(document.url()))
            }
            None => false,
        }
    }

    async fn read(&self, root: &ElementRef, options: &BrickOptions) -> Result<Value, BrickError> {
        let page = options.platform.dom()?;
        let document = page.document();
        let value = (self.read)(&self.config, document.as_ref(), root)?;
        Ok(if value.is_null() { json!({}) } else { value })
    }
}
