//! Brick step domain model

use crate::core::config::StepConfig;
use crate::core::expression::ConfigTree;
use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Context keys a step may not bind its output to
pub const RESERVED_OUTPUT_KEYS: [&str; 3] = ["input", "options", "mod"];

/// How a step picks the root element passed to root-aware bricks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RootMode {
    /// Use the caller's root
    #[default]
    Inherit,
    /// Use the document
    Document,
    /// Resolve the step's `root` selector
    Element,
}

/// Which frame a step runs in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WindowTarget {
    /// The frame the pipeline runs in
    #[default]
    #[serde(rename = "self")]
    Current,
    /// The top-level frame
    Top,
    /// Every reachable frame; the output is an array
    Broadcast,
}

/// What happens to the pipeline when a step fails
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OnError {
    /// Halt the pipeline
    #[default]
    Throw,
    /// Mark the step failed and keep going
    Continue,
}

/// A single brick invocation in a pipeline
#[derive(Debug, Clone, PartialEq)]
pub struct BrickConfig {
    /// Registry id of the brick to run
    pub id: String,

    /// Label shown to users; defaults to the brick id
    pub label: String,

    /// Stable id of this step within the mod, if assigned
    pub instance_id: Option<String>,

    /// Arguments, possibly templated
    pub config: ConfigTree,

    /// Guard; the step is skipped when it renders falsy
    pub condition: Option<ConfigTree>,

    /// Context key (without `@`) the output is bound to
    pub output_key: Option<String>,

    pub root_mode: RootMode,

    /// Selector for `rootMode: element`
    pub root: Option<String>,

    pub window: WindowTarget,

    pub on_error: OnError,
}

fn is_identifier(key: &str) -> bool {
    let mut chars = key.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    }
}

/// Normalize and validate an output key
pub fn parse_output_key(raw: &str) -> Result<String> {
    let key = raw.trim().trim_start_matches('@');
    if !is_identifier(key) {
        bail!("Invalid output key '{}': expected an identifier", raw);
    }
    if RESERVED_OUTPUT_KEYS.contains(&key) {
        bail!("Output key '@{}' is reserved", key);
    }
    Ok(key.to_string())
}

impl BrickConfig {
    /// Step that runs `id` with no arguments
    pub fn new(id: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            label: id.clone(),
            id,
            instance_id: None,
            config: ConfigTree::default(),
            condition: None,
            output_key: None,
            root_mode: RootMode::Inherit,
            root: None,
            window: WindowTarget::Current,
            on_error: OnError::Throw,
        }
    }

    /// Create a step from its serialized form
    pub fn from_config(config: &StepConfig) -> Result<Self> {
        let id = config.id.trim();
        if id.is_empty() {
            bail!("Step is missing a brick id");
        }

        let brick_config = ConfigTree::parse_config(&config.config)
            .map_err(|e| anyhow::anyhow!("Step '{}': {}", id, e))?;

        let condition = match &config.condition {
            None => None,
            Some(value) => Some(
                ConfigTree::parse(value).map_err(|e| anyhow::anyhow!("Step '{}' condition: {}", id, e))?,
            ),
        };

        let output_key = config
            .output_key
            .as_deref()
            .filter(|key| !key.trim().is_empty())
            .map(parse_output_key)
            .transpose()?;

        let root = config.root.clone().filter(|root| !root.trim().is_empty());
        if config.root_mode == RootMode::Element && root.is_none() {
            bail!("Step '{}' uses rootMode 'element' without a root selector", id);
        }

        Ok(BrickConfig {
            id: id.to_string(),
            label: config.label.clone().unwrap_or_else(|| id.to_string()),
            instance_id: config.instance_id.clone(),
            config: brick_config,
            condition,
            output_key,
            root_mode: config.root_mode,
            root,
            window: config.window,
            on_error: config.on_error,
        })
    }

    /// Parse a step from a JSON value
    pub fn from_value(value: Value) -> Result<Self> {
        let config: StepConfig = serde_json::from_value(value)?;
        Self::from_config(&config)
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn with_config(mut self, config: ConfigTree) -> Self {
        self.config = config;
        self
    }

    pub fn with_output_key(mut self, key: impl Into<String>) -> Self {
        let key: String = key.into();
        self.output_key = Some(key.trim_start_matches('@').to_string());
        self
    }

    pub fn with_condition(mut self, condition: ConfigTree) -> Self {
        self.condition = Some(condition);
        self
    }

    pub fn with_on_error(mut self, on_error: OnError) -> Self {
        self.on_error = on_error;
        self
    }

    /// Context key the output is bound under, with the `@` prefix
    pub fn output_binding(&self) -> Option<String> {
        self.output_key.as_ref().map(|key| format!("@{}", key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_value_defaults() {
        let step = BrickConfig::from_value(json!({"id": "@pixiebrix/identity"})).unwrap();
        assert_eq!(step.label, "@pixiebrix/identity");
        assert_eq!(step.root_mode, RootMode::Inherit);
        assert_eq!(step.window, WindowTarget::Current);
        assert_eq!(step.on_error, OnError::Throw);
        assert!(step.output_key.is_none());
        assert_eq!(step.config, ConfigTree::default());
    }

    #[test]
    fn test_output_key_is_normalized() {
        let step = BrickConfig::from_value(json!({
            "id": "@pixiebrix/document-context",
            "outputKey": "@context",
        }))
        .unwrap();
        assert_eq!(step.output_key.as_deref(), Some("context"));
        assert_eq!(step.output_binding().as_deref(), Some("@context"));
    }

    #[test]
    fn test_invalid_output_keys() {
        assert!(parse_output_key("my-key").is_err());
        assert!(parse_output_key("1abc").is_err());
        assert!(parse_output_key("@input").is_err());
        assert_eq!(parse_output_key("  result_1 ").unwrap(), "result_1");
    }

    #[test]
    fn test_element_root_mode_requires_selector() {
        let result = BrickConfig::from_value(json!({
            "id": "@pixiebrix/element-text",
            "rootMode": "element",
        }));
        assert!(result.is_err());

        let step = BrickConfig::from_value(json!({
            "id": "@pixiebrix/element-text",
            "rootMode": "element",
            "root": "#main",
            "window": "broadcast",
            "onError": "continue",
        }))
        .unwrap();
        assert_eq!(step.root.as_deref(), Some("#main"));
        assert_eq!(step.window, WindowTarget::Broadcast);
        assert_eq!(step.on_error, OnError::Continue);
    }

    #[test]
    fn test_condition_is_parsed() {
        let step = BrickConfig::from_value(json!({
            "id": "@pixiebrix/identity",
            "if": "{{ @input.enabled }}",
        }))
        .unwrap();
        assert_eq!(
            step.condition,
            Some(ConfigTree::Template("{{ @input.enabled }}".to_string()))
        );
    }

    #[test]
    fn test_builders() {
        let step = BrickConfig::from_value(json!({"id": "@pixiebrix/identity"}))
            .unwrap()
            .with_label("Echo")
            .with_config(ConfigTree::Literal(json!({"value": 1})))
            .with_output_key("@echo")
            .with_condition(ConfigTree::Literal(json!(true)))
            .with_on_error(OnError::Continue);
        assert_eq!(step.label, "Echo");
        assert_eq!(step.config, ConfigTree::Literal(json!({"value": 1})));
        assert_eq!(step.output_binding().as_deref(), Some("@echo"));
        assert_eq!(step.condition, Some(ConfigTree::Literal(json!(true))));
        assert_eq!(step.on_error, OnError::Continue);
    }

    #[test]
    fn test_missing_id_is_rejected() {
        assert!(BrickConfig::from_value(json!({"id": "  "})).is_err());
    }
}
