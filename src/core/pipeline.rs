//! Brick pipeline domain model

use crate::core::config::StepConfig;
use crate::core::step::BrickConfig;
use anyhow::Result;
use serde_json::Value;
use std::collections::HashMap;

/// An ordered sequence of brick invocations
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BrickPipeline {
    pub steps: Vec<BrickConfig>,
}

impl BrickPipeline {
    pub fn new(steps: Vec<BrickConfig>) -> Self {
        Self { steps }
    }

    /// Create a pipeline from serialized steps
    pub fn from_config(steps: &[StepConfig]) -> Result<Self> {
        let steps = steps
            .iter()
            .enumerate()
            .map(|(index, step)| {
                BrickConfig::from_config(step).map_err(|e| anyhow::anyhow!("Step {}: {}", index, e))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { steps })
    }

    /// Parse a pipeline from a JSON array of steps
    pub fn from_value(value: Value) -> Result<Self> {
        let steps: Vec<StepConfig> = serde_json::from_value(value)?;
        Self::from_config(&steps)
    }

    /// Parse a pipeline from a YAML list of steps
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let steps: Vec<StepConfig> = serde_yaml::from_str(yaml)?;
        Self::from_config(&steps)
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &BrickConfig> {
        self.steps.iter()
    }

    /// Output keys bound by more than one step
    ///
    /// Later bindings shadow earlier ones at run time; this is reported as a
    /// warning, not an error.
    pub fn duplicate_output_keys(&self) -> Vec<String> {
        let mut counts: HashMap<&str, usize> = HashMap::new();
        for step in &self.steps {
            if let Some(key) = &step.output_key {
                *counts.entry(key.as_str()).or_default() += 1;
            }
        }

        let mut duplicates: Vec<String> = counts
            .into_iter()
            .filter(|(_, count)| *count > 1)
            .map(|(key, _)| key.to_string())
            .collect();
        duplicates.sort();
        duplicates
    }

    /// Brick ids used by this pipeline and any sub-pipelines, in order of first use
    pub fn brick_ids(&self) -> Vec<String> {
        let mut ids = Vec::new();
        self.collect_brick_ids(&mut ids);
        ids
    }

    fn collect_brick_ids(&self, ids: &mut Vec<String>) {
        use crate::core::expression::ConfigTree;

        for step in &self.steps {
            if !ids.contains(&step.id) {
                ids.push(step.id.clone());
            }
            if let ConfigTree::Object(properties) = &step.config {
                for tree in properties.values() {
                    if let ConfigTree::Pipeline(expression) = tree {
                        expression.pipeline.collect_brick_ids(ids);
                    }
                }
            }
        }
    }
}

impl From<Vec<BrickConfig>> for BrickPipeline {
    fn from(steps: Vec<BrickConfig>) -> Self {
        Self::new(steps)
    }
}

/// An unevaluated sub-pipeline passed as a brick argument
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PipelineExpression {
    pub pipeline: BrickPipeline,
}

impl PipelineExpression {
    pub fn new(pipeline: BrickPipeline) -> Self {
        Self { pipeline }
    }
}
