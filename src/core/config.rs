//! Mod definitions and runtime configuration from YAML

use crate::core::pipeline::BrickPipeline;
use crate::core::step::{parse_output_key, OnError, RootMode, WindowTarget};
use crate::platform::{ExecutionContext, PlatformCapability};
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

/// Step configuration as authored in a mod definition
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepConfig {
    /// Registry id of the brick
    pub id: String,

    /// Label shown to users
    #[serde(default)]
    pub label: Option<String>,

    /// Stable step id within the mod
    #[serde(default)]
    pub instance_id: Option<String>,

    /// Brick arguments, possibly templated
    #[serde(default)]
    pub config: Value,

    /// Guard expression
    #[serde(default, rename = "if")]
    pub condition: Option<Value>,

    #[serde(default)]
    pub output_key: Option<String>,

    #[serde(default)]
    pub root_mode: RootMode,

    #[serde(default)]
    pub root: Option<String>,

    #[serde(default)]
    pub window: WindowTarget,

    #[serde(default)]
    pub on_error: OnError,
}

/// Descriptive metadata of a mod
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModMetadata {
    pub id: String,

    #[serde(default)]
    pub name: Option<String>,

    #[serde(default)]
    pub version: Option<String>,

    #[serde(default)]
    pub description: Option<String>,
}

/// One automation in a mod
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentConfig {
    pub id: String,

    #[serde(default)]
    pub label: Option<String>,

    /// Steps of the component's pipeline
    #[serde(default)]
    pub pipeline: Vec<StepConfig>,

    /// Output key whose value is the component's result
    #[serde(default)]
    pub output: Option<String>,
}

/// Top-level mod definition loaded from YAML
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModDefinition {
    pub metadata: ModMetadata,

    /// Mod options, exposed to templates as `@options`
    #[serde(default)]
    pub options: Map<String, Value>,

    /// Mod variables, exposed to templates as `@mod`
    #[serde(default)]
    pub variables: Map<String, Value>,

    /// Default pipeline input, exposed as `@input`
    #[serde(default)]
    pub input: Value,

    /// Services the mod uses: context key to service id (`acme: "@acme/api"` binds `@acme`)
    #[serde(default)]
    pub services: BTreeMap<String, String>,

    pub components: Vec<ComponentConfig>,
}

/// A component ready to run
#[derive(Debug, Clone)]
pub struct ModComponent {
    pub mod_id: String,
    pub id: String,
    pub label: String,
    pub pipeline: BrickPipeline,
    pub output: Option<String>,
}

impl ModDefinition {
    /// Load a mod definition from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read mod definition {}", path.display()))?;
        Self::from_yaml(&content)
    }

    /// Parse a mod definition from a YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let definition: ModDefinition = serde_yaml::from_str(yaml)?;
        definition.validate()?;
        Ok(definition)
    }

    /// Validate the mod definition
    pub fn validate(&self) -> Result<()> {
        if self.metadata.id.trim().is_empty() {
            bail!("Mod is missing metadata.id");
        }
        if self.components.is_empty() {
            bail!("Mod '{}' has no components", self.metadata.id);
        }

        for (key, id) in &self.services {
            let parsed = parse_output_key(key).with_context(|| format!("Service binding for {}", id))?;
            if parsed != key.as_str() {
                bail!("Service key '{}' must be written without '@'", key);
            }
            if id.trim().is_empty() {
                bail!("Service binding '{}' has no service id", key);
            }
        }

        let mut seen_ids = HashSet::new();
        for component in &self.components {
            if !seen_ids.insert(component.id.as_str()) {
                bail!("Duplicate component ID: {}", component.id);
            }

            let pipeline = BrickPipeline::from_config(&component.pipeline)
                .with_context(|| format!("Component '{}'", component.id))?;

            if let Some(output) = &component.output {
                let key = output.trim_start_matches('@');
                if !pipeline.iter().any(|step| step.output_key.as_deref() == Some(key)) {
                    bail!(
                        "Component '{}' output '{}' is not bound by any step",
                        component.id,
                        output
                    );
                }
            }
        }

        Ok(())
    }

    /// Non-fatal problems: output keys bound more than once
    pub fn warnings(&self) -> Vec<String> {
        let mut warnings = Vec::new();
        for component in &self.components {
            if let Ok(pipeline) = BrickPipeline::from_config(&component.pipeline) {
                for key in pipeline.duplicate_output_keys() {
                    warnings.push(format!(
                        "Component '{}' binds output key '@{}' more than once; later steps shadow earlier ones",
                        component.id, key
                    ));
                }
            }
        }
        warnings
    }

    /// Ids of all components, in definition order
    pub fn component_ids(&self) -> Vec<&str> {
        self.components.iter().map(|c| c.id.as_str()).collect()
    }

    /// Build a runnable component; the first one when `id` is `None`
    pub fn component(&self, id: Option<&str>) -> Result<ModComponent> {
        let config = match id {
            Some(id) => self
                .components
                .iter()
                .find(|c| c.id == id)
                .with_context(|| format!("Component '{}' not found in mod '{}'", id, self.metadata.id))?,
            None => self
                .components
                .first()
                .with_context(|| format!("Mod '{}' has no components", self.metadata.id))?,
        };

        Ok(ModComponent {
            mod_id: self.metadata.id.clone(),
            id: config.id.clone(),
            label: config.label.clone().unwrap_or_else(|| config.id.clone()),
            pipeline: BrickPipeline::from_config(&config.pipeline)?,
            output: config
                .output
                .as_ref()
                .map(|output| output.trim_start_matches('@').to_string()),
        })
    }
}

fn default_platform_name() -> String {
    "cli".to_string()
}

fn default_template_timeout_ms() -> u64 {
    5_000
}

fn default_rpc_timeout_ms() -> u64 {
    30_000
}

fn default_http_timeout_ms() -> u64 {
    30_000
}

/// Runtime settings, loaded from `runtime.yaml`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct RuntimeConfig {
    /// Platform name reported in capability errors
    #[serde(default = "default_platform_name")]
    pub platform_name: String,

    /// Execution context bricks run in
    #[serde(default)]
    pub context: ExecutionContext,

    /// Capabilities treated as unavailable
    #[serde(default)]
    pub disabled_capabilities: Vec<PlatformCapability>,

    /// Deadline for a batch of templates in the sandbox
    #[serde(default = "default_template_timeout_ms")]
    pub template_timeout_ms: u64,

    /// Deadline for cross-context capability calls
    #[serde(default = "default_rpc_timeout_ms")]
    pub rpc_timeout_ms: u64,

    /// Per-request HTTP timeout in the background context
    #[serde(default = "default_http_timeout_ms")]
    pub http_timeout_ms: u64,

    /// Service configuration keyed by service id
    #[serde(default)]
    pub services: BTreeMap<String, Value>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            platform_name: default_platform_name(),
            context: ExecutionContext::ContentScript,
            disabled_capabilities: Vec::new(),
            template_timeout_ms: default_template_timeout_ms(),
            rpc_timeout_ms: default_rpc_timeout_ms(),
            http_timeout_ms: default_http_timeout_ms(),
            services: BTreeMap::new(),
        }
    }
}

impl RuntimeConfig {
    /// Default location: `<config dir>/brick-runtime/runtime.yaml`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("brick-runtime").join("runtime.yaml"))
    }

    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: RuntimeConfig = serde_yaml::from_str(yaml)?;
        if config.template_timeout_ms == 0 || config.rpc_timeout_ms == 0 {
            bail!("Timeouts must be greater than zero");
        }
        Ok(config)
    }

    /// Load from `path`, or from the default path; defaults when the file is absent
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => match Self::default_path() {
                Some(path) if path.exists() => path,
                _ => return Ok(Self::default()),
            },
        };

        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read runtime config {}", path.display()))?;
        Self::from_yaml(&content)
    }
}
