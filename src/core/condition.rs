//! Truthiness of rendered `if` guards

use serde_json::Value;

/// Strings treated as false once a guard has been rendered to text
const FALSY_STRINGS: [&str; 7] = ["", "false", "0", "no", "off", "null", "undefined"];

/// Whether a rendered guard value lets the step run
///
/// Templates render to strings, so the textual spellings of false values
/// count as falsy in addition to `null`, `false` and `0`.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(flag) => *flag,
        Value::Number(number) => number.as_f64().is_some_and(|n| n != 0.0 && !n.is_nan()),
        Value::String(text) => {
            let text = text.trim().to_ascii_lowercase();
            !FALSY_STRINGS.contains(&text.as_str())
        }
        Value::Array(_) | Value::Object(_) => true,
    }
}
