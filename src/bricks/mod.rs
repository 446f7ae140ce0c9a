//! Brick contract
//!
//! Every brick is one of four kinds, each with its own verb:
//!
//! - [`Reader`]: `read(root)` returns data extracted from the page
//! - [`Effect`]: `effect(args)` performs a side effect
//! - [`Transformer`]: `transform(args)` computes a value
//! - [`Renderer`]: `render(args)` produces content for display
//!
//! The interpreter dispatches through the closed [`Brick`] enum so the set of
//! kinds is checked exhaustively.

pub mod args;
pub mod builtin;
pub mod factory;
pub mod options;
pub mod registry;
pub mod schema;
pub mod service;

pub use args::BrickArgs;
pub use factory::{BrickFactory, Package, ReadFunction};
pub use options::{BrickOptions, PipelineInvoker, RunMeta};
pub use registry::BrickRegistry;
pub use service::ServiceDefinition;

use crate::error::BrickError;
use crate::platform::{ElementRef, Platform, PlatformCapability};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;
use std::sync::Arc;

/// The four brick kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BrickKind {
    Reader,
    Effect,
    Transformer,
    Renderer,
}

impl fmt::Display for BrickKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BrickKind::Reader => "reader",
            BrickKind::Effect => "effect",
            BrickKind::Transformer => "transformer",
            BrickKind::Renderer => "renderer",
        };
        f.write_str(name)
    }
}

/// Descriptive data exposed to brick pickers and form generators
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BrickMetadata {
    /// Stable, namespaced registry id (e.g. `@pixiebrix/wait/sleep`)
    pub id: String,

    pub name: String,

    #[serde(default)]
    pub description: String,

    /// JSON Schema of the brick's arguments
    pub input_schema: Value,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_schema: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ui_schema: Option<Value>,
}

impl BrickMetadata {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: String::new(),
            input_schema: json!({"type": "object", "properties": {}}),
            output_schema: None,
            ui_schema: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_input_schema(mut self, schema: Value) -> Self {
        self.input_schema = schema;
        self
    }

    pub fn with_output_schema(mut self, schema: Value) -> Self {
        self.output_schema = Some(schema);
        self
    }

    pub fn with_ui_schema(mut self, schema: Value) -> Self {
        self.ui_schema = Some(schema);
        self
    }
}

/// Output of a [`Renderer`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum RenderResult {
    Html(String),
    Text(String),
    Json(Value),
}

/// Extracts data from the page; side-effect free
#[async_trait]
pub trait Reader: Send + Sync {
    fn metadata(&self) -> &BrickMetadata;

    /// Static availability (URL patterns and the like)
    async fn is_available(&self, _platform: &Platform) -> bool {
        true
    }

    async fn is_pure(&self) -> bool {
        true
    }

    async fn is_root_aware(&self) -> bool {
        true
    }

    async fn required_capabilities(&self, _args: &BrickArgs) -> Vec<PlatformCapability> {
        vec![PlatformCapability::Dom]
    }

    async fn read(&self, root: &ElementRef, options: &BrickOptions) -> Result<Value, BrickError>;
}

/// Performs a side effect
#[async_trait]
pub trait Effect: Send + Sync {
    fn metadata(&self) -> &BrickMetadata;

    async fn is_available(&self, _platform: &Platform) -> bool {
        true
    }

    async fn is_pure(&self) -> bool {
        false
    }

    async fn is_root_aware(&self) -> bool {
        false
    }

    async fn required_capabilities(&self, _args: &BrickArgs) -> Vec<PlatformCapability> {
        Vec::new()
    }

    async fn effect(&self, args: &BrickArgs, options: &BrickOptions) -> Result<(), BrickError>;
}

/// Computes a value from its arguments
#[async_trait]
pub trait Transformer: Send + Sync {
    fn metadata(&self) -> &BrickMetadata;

    async fn is_available(&self, _platform: &Platform) -> bool {
        true
    }

    async fn is_pure(&self) -> bool {
        false
    }

    async fn is_root_aware(&self) -> bool {
        false
    }

    async fn required_capabilities(&self, _args: &BrickArgs) -> Vec<PlatformCapability> {
        Vec::new()
    }

    async fn transform(&self, args: &BrickArgs, options: &BrickOptions) -> Result<Value, BrickError>;
}

/// Produces displayable content
#[async_trait]
pub trait Renderer: Send + Sync {
    fn metadata(&self) -> &BrickMetadata;

    async fn is_available(&self, _platform: &Platform) -> bool {
        true
    }

    async fn is_pure(&self) -> bool {
        true
    }

    async fn is_root_aware(&self) -> bool {
        false
    }

    async fn required_capabilities(&self, _args: &BrickArgs) -> Vec<PlatformCapability> {
        Vec::new()
    }

    async fn render(&self, args: &BrickArgs, options: &BrickOptions) -> Result<RenderResult, BrickError>;
}

/// A registered brick
#[derive(Clone)]
pub enum Brick {
    Reader(Arc<dyn Reader>),
    Effect(Arc<dyn Effect>),
    Transformer(Arc<dyn Transformer>),
    Renderer(Arc<dyn Renderer>),
}

impl Brick {
    pub fn reader(reader: impl Reader + 'static) -> Self {
        Brick::Reader(Arc::new(reader))
    }

    pub fn effect(effect: impl Effect + 'static) -> Self {
        Brick::Effect(Arc::new(effect))
    }

    pub fn transformer(transformer: impl Transformer + 'static) -> Self {
        Brick::Transformer(Arc::new(transformer))
    }

    pub fn renderer(renderer: impl Renderer + 'static) -> Self {
        Brick::Renderer(Arc::new(renderer))
    }

    pub fn kind(&self) -> BrickKind {
        match self {
            Brick::Reader(_) => BrickKind::Reader,
            Brick::Effect(_) => BrickKind::Effect,
            Brick::Transformer(_) => BrickKind::Transformer,
            Brick::Renderer(_) => BrickKind::Renderer,
        }
    }

    pub fn metadata(&self) -> &BrickMetadata {
        match self {
            Brick::Reader(brick) => brick.metadata(),
            Brick::Effect(brick) => brick.metadata(),
            Brick::Transformer(brick) => brick.metadata(),
            Brick::Renderer(brick) => brick.metadata(),
        }
    }

    pub fn id(&self) -> &str {
        &self.metadata().id
    }

    pub async fn is_available(&self, platform: &Platform) -> bool {
        match self {
            Brick::Reader(brick) => brick.is_available(platform).await,
            Brick::Effect(brick) => brick.is_available(platform).await,
            Brick::Transformer(brick) => brick.is_available(platform).await,
            Brick::Renderer(brick) => brick.is_available(platform).await,
        }
    }

    pub async fn is_pure(&self) -> bool {
        match self {
            Brick::Reader(brick) => brick.is_pure().await,
            Brick::Effect(brick) => brick.is_pure().await,
            Brick::Transformer(brick) => brick.is_pure().await,
            Brick::Renderer(brick) => brick.is_pure().await,
        }
    }

    pub async fn is_root_aware(&self) -> bool {
        match self {
            Brick::Reader(brick) => brick.is_root_aware().await,
            Brick::Effect(brick) => brick.is_root_aware().await,
            Brick::Transformer(brick) => brick.is_root_aware().await,
            Brick::Renderer(brick) => brick.is_root_aware().await,
        }
    }

    pub async fn required_capabilities(&self, args: &BrickArgs) -> Vec<PlatformCapability> {
        match self {
            Brick::Reader(brick) => brick.required_capabilities(args).await,
            Brick::Effect(brick) => brick.required_capabilities(args).await,
            Brick::Transformer(brick) => brick.required_capabilities(args).await,
            Brick::Renderer(brick) => brick.required_capabilities(args).await,
        }
    }

    /// Invoke the brick's verb
    ///
    /// Effects produce `null`; renderers produce their serialized result.
    pub async fn run(&self, args: &BrickArgs, options: &BrickOptions) -> Result<Value, BrickError> {
        match self {
            Brick::Reader(brick) => {
                let root = options.root.clone().unwrap_or(ElementRef::Document);
                brick.read(&root, options).await
            }
            Brick::Effect(brick) => brick.effect(args, options).await.map(|_| Value::Null),
            Brick::Transformer(brick) => brick.transform(args, options).await,
            Brick::Renderer(brick) => {
                let result = brick.render(args, options).await?;
                serde_json::to_value(result).map_err(BrickError::unexpected)
            }
        }
    }

    /// Whether both handles point at the same brick instance
    pub fn same_instance(&self, other: &Brick) -> bool {
        fn address<T: ?Sized>(brick: &Arc<T>) -> *const () {
            Arc::as_ptr(brick) as *const ()
        }
        match (self, other) {
            (Brick::Reader(a), Brick::Reader(b)) => address(a) == address(b),
            (Brick::Effect(a), Brick::Effect(b)) => address(a) == address(b),
            (Brick::Transformer(a), Brick::Transformer(b)) => address(a) == address(b),
            (Brick::Renderer(a), Brick::Renderer(b)) => address(a) == address(b),
            _ => false,
        }
    }
}

impl fmt::Debug for Brick {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Brick")
            .field("id", &self.id())
            .field("kind", &self.kind())
            .finish()
    }
}
