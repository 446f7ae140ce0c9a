//! Typed brick configuration tree
//!
//! Raw step `config` values are parsed once into a [`ConfigTree`] so the
//! interpreter never has to guess whether a string is a template or whether
//! an object is an expression.

use crate::core::pipeline::{BrickPipeline, PipelineExpression};
use anyhow::{bail, Result};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Key marking an explicit expression object
pub const EXPRESSION_TYPE_KEY: &str = "__type__";

/// Key holding an explicit expression's payload
pub const EXPRESSION_VALUE_KEY: &str = "__value__";

/// A brick argument, before rendering
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigTree {
    /// Passed through unchanged
    Literal(Value),
    /// Text template, rendered in the sandbox
    Template(String),
    /// Reference to a context value, resolved type-preserving
    Var(String),
    /// Unevaluated sub-pipeline for higher-order bricks
    Pipeline(PipelineExpression),
    /// Subtree left unrendered for the brick to render later
    Defer(Box<ConfigTree>),
    Object(BTreeMap<String, ConfigTree>),
    Array(Vec<ConfigTree>),
}

impl Default for ConfigTree {
    fn default() -> Self {
        ConfigTree::Object(BTreeMap::new())
    }
}

impl ConfigTree {
    /// Parse a step's `config` object
    ///
    /// `pipeline` and `defer` expressions are only allowed as direct
    /// properties of the config object.
    pub fn parse_config(value: &Value) -> Result<Self> {
        match value {
            Value::Null => Ok(ConfigTree::default()),
            Value::Object(map) if !is_expression(map) => {
                let mut properties = BTreeMap::new();
                for (key, value) in map {
                    let tree = Self::parse_node(value, true)
                        .map_err(|e| anyhow::anyhow!("Invalid value for '{}': {}", key, e))?;
                    properties.insert(key.clone(), tree);
                }
                Ok(ConfigTree::Object(properties))
            }
            other => Self::parse(other),
        }
    }

    /// Parse an arbitrary value; nested pipeline/defer expressions are rejected
    pub fn parse(value: &Value) -> Result<Self> {
        Self::parse_node(value, false)
    }

    fn parse_node(value: &Value, allow_deferred: bool) -> Result<Self> {
        match value {
            Value::String(text) if text.contains("{{") => Ok(ConfigTree::Template(text.clone())),
            Value::Object(map) if is_expression(map) => Self::parse_expression(map, allow_deferred),
            Value::Object(map) => {
                let mut properties = BTreeMap::new();
                for (key, value) in map {
                    properties.insert(key.clone(), Self::parse_node(value, false)?);
                }
                Ok(ConfigTree::Object(properties))
            }
            Value::Array(items) => Ok(ConfigTree::Array(
                items
                    .iter()
                    .map(|item| Self::parse_node(item, false))
                    .collect::<Result<_>>()?,
            )),
            other => Ok(ConfigTree::Literal(other.clone())),
        }
    }

    fn parse_expression(map: &Map<String, Value>, allow_deferred: bool) -> Result<Self> {
        let kind = map
            .get(EXPRESSION_TYPE_KEY)
            .and_then(Value::as_str)
            .unwrap_or_default();
        let payload = map.get(EXPRESSION_VALUE_KEY).cloned().unwrap_or(Value::Null);

        match kind {
            "nunjucks" | "mustache" => match payload {
                Value::String(template) => Ok(ConfigTree::Template(template)),
                _ => bail!("{} expression must be a string", kind),
            },
            "var" => match payload {
                Value::String(path) => Ok(ConfigTree::Var(path.trim().to_string())),
                _ => bail!("var expression must be a string"),
            },
            "pipeline" => {
                if !allow_deferred {
                    bail!("pipeline expressions are only supported as top-level brick arguments");
                }
                let pipeline = match payload {
                    Value::Null => BrickPipeline::default(),
                    other => BrickPipeline::from_value(other)?,
                };
                Ok(ConfigTree::Pipeline(PipelineExpression::new(pipeline)))
            }
            "defer" => {
                if !allow_deferred {
                    bail!("defer expressions are only supported as top-level brick arguments");
                }
                Ok(ConfigTree::Defer(Box::new(Self::parse(&payload)?)))
            }
            other => bail!("Unknown expression type: '{}'", other),
        }
    }

    /// Whether rendering this tree needs a context at all
    pub fn is_static(&self) -> bool {
        match self {
            ConfigTree::Literal(_) => true,
            ConfigTree::Template(_) | ConfigTree::Var(_) => false,
            ConfigTree::Pipeline(_) | ConfigTree::Defer(_) => true,
            ConfigTree::Object(properties) => properties.values().all(ConfigTree::is_static),
            ConfigTree::Array(items) => items.iter().all(ConfigTree::is_static),
        }
    }

    /// Number of templates in this tree (excluding deferred subtrees)
    pub fn template_count(&self) -> usize {
        match self {
            ConfigTree::Template(_) => 1,
            ConfigTree::Object(properties) => properties.values().map(ConfigTree::template_count).sum(),
            ConfigTree::Array(items) => items.iter().map(ConfigTree::template_count).sum(),
            _ => 0,
        }
    }
}

fn is_expression(map: &Map<String, Value>) -> bool {
    map.get(EXPRESSION_TYPE_KEY).is_some_and(Value::is_string)
}
