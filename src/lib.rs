//! brick-runtime - execute brick pipelines with capability routing and cooperative cancellation

pub mod bricks;
pub mod cli;
pub mod core;
pub mod error;
pub mod execution;
pub mod logging;
pub mod platform;
pub mod templating;

// Re-export commonly used types
pub use bricks::{Brick, BrickArgs, BrickKind, BrickMetadata, BrickOptions, BrickRegistry};
pub use bricks::{Effect, Reader, RenderResult, Renderer, Transformer};
pub use core::{BrickConfig, BrickPipeline, ExecutionStatus, ModDefinition, RunContext, StepState};
pub use error::{BrickError, ErrorKind, PipelineError};
pub use execution::{AbortSignal, ExecutionEvent, PipelineRunner, RunOptions, RunOutcome};
pub use platform::{ExecutionContext, Platform, PlatformCapability};
