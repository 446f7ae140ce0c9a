//! Schema-directed coercion of rendered arguments
//!
//! Templates always render to text. When a brick's input schema declares a
//! property as a number, integer, boolean, array or object, the rendered
//! text is converted back before validation. Blank text in a numeric field
//! (a missing reference rendered loosely) means the value is absent.

use serde_json::{Map, Number, Value};

/// Primary JSON type declared by a schema (ignoring `null` in type unions)
fn declared_type(schema: &Value) -> Option<&str> {
    match schema.get("type")? {
        Value::String(kind) => Some(kind.as_str()),
        Value::Array(kinds) => kinds
            .iter()
            .filter_map(Value::as_str)
            .find(|kind| *kind != "null"),
        _ => None,
    }
}

/// Coerce a rendered value to the type its schema declares
///
/// Values that cannot be converted are returned unchanged so schema
/// validation reports them against the right property.
pub fn coerce_value(value: Value, schema: &Value) -> Value {
    match (declared_type(schema), value) {
        (Some("number" | "integer"), Value::String(text)) if text.trim().is_empty() => Value::Null,
        (Some("number"), Value::String(text)) => parse_number(&text).unwrap_or(Value::String(text)),
        (Some("integer"), Value::String(text)) => parse_integer(&text).unwrap_or(Value::String(text)),
        (Some("boolean"), Value::String(text)) => parse_boolean(&text).unwrap_or(Value::String(text)),
        (Some("array"), Value::String(text)) => match serde_json::from_str::<Value>(&text) {
            Ok(parsed @ Value::Array(_)) => parsed,
            _ => Value::String(text),
        },
        (Some("object"), Value::String(text)) if !text.trim().is_empty() => {
            match serde_json::from_str::<Value>(&text) {
                Ok(Value::Object(map)) => coerce_object(map, schema),
                _ => Value::String(text),
            }
        }
        (Some("object"), Value::Object(map)) => coerce_object(map, schema),
        (Some("array"), Value::Array(items)) => match schema.get("items") {
            Some(item_schema) => Value::Array(
                items
                    .into_iter()
                    .map(|item| coerce_value(item, item_schema))
                    .collect(),
            ),
            None => Value::Array(items),
        },
        (None, Value::Object(map)) if schema.get("properties").is_some() => coerce_object(map, schema),
        (_, value) => value,
    }
}

fn coerce_object(map: Map<String, Value>, schema: &Value) -> Value {
    let Some(properties) = schema.get("properties").and_then(Value::as_object) else {
        return Value::Object(map);
    };
    let required: Vec<&str> = schema
        .get("required")
        .and_then(Value::as_array)
        .map(|keys| keys.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default();
    Value::Object(
        map.into_iter()
            .filter_map(|(key, value)| {
                let Some(property_schema) = properties.get(&key) else {
                    return Some((key, value));
                };
                let blank = matches!(&value, Value::String(text) if text.trim().is_empty());
                let value = coerce_value(value, property_schema);
                // Optional numeric arguments that rendered blank are left out
                if blank && value.is_null() && !required.contains(&key.as_str()) {
                    return None;
                }
                Some((key, value))
            })
            .collect(),
    )
}

fn parse_number(text: &str) -> Option<Value> {
    let text = text.trim();
    if let Ok(integer) = text.parse::<i64>() {
        return Some(Value::from(integer));
    }
    text.parse::<f64>()
        .ok()
        .and_then(Number::from_f64)
        .map(Value::Number)
}

fn parse_integer(text: &str) -> Option<Value> {
    let text = text.trim();
    if let Ok(integer) = text.parse::<i64>() {
        return Some(Value::from(integer));
    }
    // "5.0" is an integer; "5.5" is not
    let float = text.parse::<f64>().ok()?;
    if float.fract() == 0.0 && float.abs() < i64::MAX as f64 {
        Some(Value::from(float as i64))
    } else {
        None
    }
}

fn parse_boolean(text: &str) -> Option<Value> {
    match text.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(Value::Bool(true)),
        "false" | "0" | "no" | "off" | "" => Some(Value::Bool(false)),
        _ => None,
    }
}
