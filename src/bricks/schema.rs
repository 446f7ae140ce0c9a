//! Input validation against a brick's JSON Schema

use crate::error::BrickError;
use crate::templating::coerce::coerce_value;
use dashmap::DashMap;
use jsonschema::{Draft, JSONSchema};
use serde_json::Value;
use std::sync::Arc;

/// Compile a schema as Draft 7
pub fn compile_schema(owner: &str, schema: &Value) -> Result<JSONSchema, BrickError> {
    JSONSchema::options()
        .with_draft(Draft::Draft7)
        .compile(schema)
        .map_err(|e| BrickError::unexpected(format!("Invalid input schema for {}: {}", owner, e)))
}

/// Coerce rendered arguments to their declared types, then validate them
///
/// The first violation is reported as a property error naming the top-level
/// argument at fault.
pub fn validate_args(brick_id: &str, schema: &Value, args: Value) -> Result<Value, BrickError> {
    let compiled = compile_schema(brick_id, schema)?;
    validate_compiled(brick_id, schema, &compiled, args)
}

/// [`validate_args`] against an already compiled schema
pub fn validate_compiled(
    brick_id: &str,
    schema: &Value,
    compiled: &JSONSchema,
    args: Value,
) -> Result<Value, BrickError> {
    let args = coerce_value(args, schema);

    if let Err(errors) = compiled.validate(&args) {
        let Some(error) = errors.into_iter().next() else {
            return Err(BrickError::prop(brick_id, "config", "schema validation failed"));
        };
        let path = error.instance_path.to_string();
        let property = path
            .trim_start_matches('/')
            .split('/')
            .next()
            .filter(|segment| !segment.is_empty())
            .unwrap_or("config")
            .to_string();
        return Err(BrickError::prop(brick_id, property, error.to_string()));
    }
    Ok(args)
}

/// Compiled input schemas keyed by brick id
#[derive(Default)]
pub struct SchemaCache {
    compiled: DashMap<String, Arc<JSONSchema>>,
}

impl SchemaCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compiled schema for `brick_id`, compiling on first use
    pub fn compiled(&self, brick_id: &str, schema: &Value) -> Result<Arc<JSONSchema>, BrickError> {
        if let Some(entry) = self.compiled.get(brick_id) {
            return Ok(entry.value().clone());
        }
        let compiled = Arc::new(compile_schema(brick_id, schema)?);
        self.compiled.insert(brick_id.to_string(), compiled.clone());
        Ok(compiled)
    }

    /// Forget the schema compiled for `brick_id`
    pub fn evict(&self, brick_id: &str) {
        self.compiled.remove(brick_id);
    }

    pub fn len(&self) -> usize {
        self.compiled.len()
    }

    pub fn is_empty(&self) -> bool {
        self.compiled.is_empty()
    }
}
