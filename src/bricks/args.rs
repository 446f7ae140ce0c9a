//! Rendered brick arguments

use crate::core::expression::ConfigTree;
use crate::core::pipeline::PipelineExpression;
use crate::error::BrickError;
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Arguments of one brick invocation after templating
///
/// Rendered values live in `values`; `pipeline` and `defer` arguments are
/// kept aside, unevaluated.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BrickArgs {
    values: Map<String, Value>,
    pipelines: BTreeMap<String, PipelineExpression>,
    deferred: BTreeMap<String, ConfigTree>,
}

impl BrickArgs {
    pub fn from_values(values: Map<String, Value>) -> Self {
        Self {
            values,
            ..Default::default()
        }
    }

    /// Build from a JSON object; other values give empty arguments
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Object(values) => Self::from_values(values),
            _ => Self::default(),
        }
    }

    pub fn values(&self) -> &Map<String, Value> {
        &self.values
    }

    pub fn set_values(&mut self, values: Map<String, Value>) {
        self.values = values;
    }

    /// Rendered values as a JSON object
    pub fn to_value(&self) -> Value {
        Value::Object(self.values.clone())
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: Value) {
        self.values.insert(key.into(), value);
    }

    pub fn insert_pipeline(&mut self, key: impl Into<String>, expression: PipelineExpression) {
        self.pipelines.insert(key.into(), expression);
    }

    pub fn insert_deferred(&mut self, key: impl Into<String>, tree: ConfigTree) {
        self.deferred.insert(key.into(), tree);
    }

    pub fn pipeline(&self, key: &str) -> Option<&PipelineExpression> {
        self.pipelines.get(key)
    }

    pub fn deferred(&self, key: &str) -> Option<&ConfigTree> {
        self.deferred.get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.values.get(key).and_then(Value::as_str)
    }

    pub fn get_u64(&self, key: &str) -> Option<u64> {
        self.values.get(key).and_then(Value::as_u64)
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.values.get(key).and_then(Value::as_bool)
    }

    /// Required string argument
    pub fn require_str(&self, brick_id: &str, key: &str) -> Result<&str, BrickError> {
        match self.values.get(key) {
            Some(Value::String(text)) => Ok(text),
            Some(_) => Err(BrickError::prop(brick_id, key, "expected a string")),
            None => Err(BrickError::prop(brick_id, key, "is required")),
        }
    }

    /// Required sub-pipeline argument; an empty pipeline when absent
    pub fn pipeline_or_empty(&self, key: &str) -> PipelineExpression {
        self.pipelines.get(key).cloned().unwrap_or_default()
    }

    /// Required sub-pipeline argument
    pub fn require_pipeline(&self, brick_id: &str, key: &str) -> Result<&PipelineExpression, BrickError> {
        self.pipelines
            .get(key)
            .ok_or_else(|| BrickError::prop(brick_id, key, "expected a pipeline expression"))
    }
}
