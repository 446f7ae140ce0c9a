//! `{{ }}` template engine
//!
//! Templates interpolate context references into text:
//!
//! ```text
//! Hello {{ @input.user.name | upper }}, you have {{ @items | length }} items
//! ```
//!
//! A reference is `@name` followed by `.key`, `[index]` or `["key"]`
//! segments. Missing references render as the empty string.

use crate::core::context::normalize_key;
use regex::Regex;
use serde_json::{Map, Value};
use std::sync::OnceLock;
use thiserror::Error;

/// Template failures
#[derive(Debug, Clone, Error, PartialEq)]
pub enum TemplateError {
    #[error("Invalid template syntax: {0}")]
    Syntax(String),

    #[error("Unknown filter '{0}'")]
    UnknownFilter(String),

    #[error("Invalid variable reference '{0}'")]
    InvalidPath(String),
}

fn tag_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"(?s)\{\{(.*?)\}\}").ok())
        .as_ref()
}

/// One segment of a variable path
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathSegment {
    Key(String),
    Index(usize),
}

/// A parsed reference such as `@data.items[0]["first name"]`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariablePath {
    /// Context key, including the `@`
    pub root: String,
    pub segments: Vec<PathSegment>,
}

impl VariablePath {
    pub fn parse(path: &str) -> Result<Self, TemplateError> {
        let invalid = || TemplateError::InvalidPath(path.to_string());
        let chars: Vec<char> = path.trim().chars().collect();
        let mut position = 0;

        let root_start = position;
        if chars.first() == Some(&'@') {
            position += 1;
        }
        while position < chars.len() && is_identifier_char(chars[position]) {
            position += 1;
        }
        let root: String = chars[root_start..position].iter().collect();
        if root.trim_start_matches('@').is_empty() {
            return Err(invalid());
        }

        let mut segments = Vec::new();
        while position < chars.len() {
            match chars[position] {
                '.' => {
                    position += 1;
                    let start = position;
                    while position < chars.len() && is_identifier_char(chars[position]) {
                        position += 1;
                    }
                    if start == position {
                        return Err(invalid());
                    }
                    segments.push(PathSegment::Key(chars[start..position].iter().collect()));
                }
                '[' => {
                    position += 1;
                    match chars.get(position) {
                        Some(quote @ ('"' | '\'')) => {
                            let quote = *quote;
                            position += 1;
                            let start = position;
                            while position < chars.len() && chars[position] != quote {
                                position += 1;
                            }
                            if position >= chars.len() {
                                return Err(invalid());
                            }
                            segments.push(PathSegment::Key(chars[start..position].iter().collect()));
                            position += 1;
                        }
                        _ => {
                            let start = position;
                            while position < chars.len() && chars[position].is_ascii_digit() {
                                position += 1;
                            }
                            let digits: String = chars[start..position].iter().collect();
                            let index = digits.parse::<usize>().map_err(|_| invalid())?;
                            segments.push(PathSegment::Index(index));
                        }
                    }
                    if chars.get(position) != Some(&']') {
                        return Err(invalid());
                    }
                    position += 1;
                }
                _ => return Err(invalid()),
            }
        }

        Ok(Self {
            root: normalize_key(&root),
            segments,
        })
    }

    /// Look the path up in a flattened context; `None` when any segment is missing
    pub fn resolve<'a>(&self, context: &'a Map<String, Value>) -> Option<&'a Value> {
        let mut current = context.get(&self.root)?;
        for segment in &self.segments {
            current = match (segment, current) {
                (PathSegment::Key(key), Value::Object(map)) => map.get(key)?,
                (PathSegment::Key(key), Value::Array(items)) => items.get(key.parse::<usize>().ok()?)?,
                (PathSegment::Index(index), Value::Array(items)) => items.get(*index)?,
                (PathSegment::Index(index), Value::Object(map)) => map.get(&index.to_string())?,
                _ => return None,
            };
        }
        Some(current)
    }
}

fn is_identifier_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$' || c == '-'
}

/// Resolve a variable path against a flattened context
pub fn resolve_path(path: &str, context: &Map<String, Value>) -> Result<Option<Value>, TemplateError> {
    let path = VariablePath::parse(path)?;
    Ok(path.resolve(context).cloned())
}

/// Filter applied to an expression's value
#[derive(Debug, Clone, PartialEq)]
enum Filter {
    Upper,
    Lower,
    Trim,
    Length,
    Json,
    Default(String),
}

impl Filter {
    fn parse(source: &str) -> Result<Self, TemplateError> {
        let source = source.trim();
        let (name, argument) = match source.find('(') {
            Some(open) => {
                if !source.ends_with(')') {
                    return Err(TemplateError::Syntax(format!("unclosed filter call '{}'", source)));
                }
                let argument = source[open + 1..source.len() - 1].trim();
                (source[..open].trim(), Some(unquote(argument)))
            }
            None => (source, None),
        };

        match (name, argument) {
            ("upper", None) => Ok(Filter::Upper),
            ("lower", None) => Ok(Filter::Lower),
            ("trim", None) => Ok(Filter::Trim),
            ("length", None) => Ok(Filter::Length),
            ("json" | "dump", None) => Ok(Filter::Json),
            ("default", Some(argument)) => Ok(Filter::Default(argument)),
            ("default", None) => Ok(Filter::Default(String::new())),
            (name, _) => Err(TemplateError::UnknownFilter(name.to_string())),
        }
    }

    fn apply(&self, value: Option<Value>) -> Option<Value> {
        match self {
            Filter::Upper => Some(Value::String(stringify(value.as_ref()).to_uppercase())),
            Filter::Lower => Some(Value::String(stringify(value.as_ref()).to_lowercase())),
            Filter::Trim => Some(Value::String(stringify(value.as_ref()).trim().to_string())),
            Filter::Length => {
                let length = match &value {
                    Some(Value::String(text)) => text.chars().count(),
                    Some(Value::Array(items)) => items.len(),
                    Some(Value::Object(map)) => map.len(),
                    _ => 0,
                };
                Some(Value::from(length))
            }
            Filter::Json => Some(Value::String(
                serde_json::to_string(value.as_ref().unwrap_or(&Value::Null)).unwrap_or_default(),
            )),
            Filter::Default(fallback) => match value {
                None | Some(Value::Null) => Some(Value::String(fallback.clone())),
                Some(Value::String(text)) if text.is_empty() => Some(Value::String(fallback.clone())),
                other => other,
            },
        }
    }
}

fn unquote(text: &str) -> String {
    let bytes = text.as_bytes();
    if bytes.len() >= 2
        && ((bytes[0] == b'"' && bytes[bytes.len() - 1] == b'"')
            || (bytes[0] == b'\'' && bytes[bytes.len() - 1] == b'\''))
    {
        text[1..text.len() - 1].to_string()
    } else {
        text.to_string()
    }
}

/// Split on `|` outside of quotes
fn split_filters(expression: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut quote: Option<char> = None;
    let mut start = 0;
    for (index, c) in expression.char_indices() {
        match (quote, c) {
            (None, '"' | '\'') => quote = Some(c),
            (Some(open), c) if c == open => quote = None,
            (None, '|') => {
                parts.push(&expression[start..index]);
                start = index + 1;
            }
            _ => {}
        }
    }
    parts.push(&expression[start..]);
    parts
}

/// Evaluate the inside of one `{{ }}` tag
pub fn evaluate_expression(
    expression: &str,
    context: &Map<String, Value>,
) -> Result<Option<Value>, TemplateError> {
    let parts = split_filters(expression);
    let head = parts[0].trim();
    if head.is_empty() {
        return Err(TemplateError::Syntax("empty expression".to_string()));
    }

    let mut value = if head.starts_with('"') || head.starts_with('\'') {
        Some(Value::String(unquote(head)))
    } else {
        resolve_path(head, context)?
    };

    for filter in &parts[1..] {
        value = Filter::parse(filter)?.apply(value);
    }
    Ok(value)
}

/// String form of a value as it appears in rendered text
pub fn stringify(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(text)) => text.clone(),
        Some(Value::Bool(flag)) => flag.to_string(),
        Some(Value::Number(number)) => number.to_string(),
        Some(other) => other.to_string(),
    }
}

/// Render a template against a flattened context
pub fn render(template: &str, context: &Map<String, Value>) -> Result<String, TemplateError> {
    let Some(pattern) = tag_pattern() else {
        return Err(TemplateError::Syntax("template pattern unavailable".to_string()));
    };

    let mut output = String::with_capacity(template.len());
    let mut last = 0;
    for captures in pattern.captures_iter(template) {
        let (Some(tag), Some(expression)) = (captures.get(0), captures.get(1)) else {
            continue;
        };
        let literal = &template[last..tag.start()];
        check_literal(literal)?;
        output.push_str(literal);

        let value = evaluate_expression(expression.as_str(), context)?;
        output.push_str(&stringify(value.as_ref()));
        last = tag.end();
    }

    let rest = &template[last..];
    check_literal(rest)?;
    output.push_str(rest);
    Ok(output)
}

fn check_literal(text: &str) -> Result<(), TemplateError> {
    if text.contains("{{") {
        return Err(TemplateError::Syntax("unclosed '{{' tag".to_string()));
    }
    Ok(())
}
