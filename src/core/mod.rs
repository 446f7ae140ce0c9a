//! Core domain models
//!
//! This module defines the data structures that represent brick pipelines,
//! their steps and arguments, and the context threaded through a run.

pub mod condition;
pub mod config;
pub mod context;
pub mod expression;
pub mod pipeline;
pub mod state;
pub mod step;

pub use condition::is_truthy;
pub use config::{ModComponent, ModDefinition, RuntimeConfig, StepConfig};
pub use context::RunContext;
pub use expression::ConfigTree;
pub use pipeline::{BrickPipeline, PipelineExpression};
pub use state::{ExecutionStatus, RunState, StepPhase, StepState};
pub use step::{BrickConfig, OnError, RootMode, WindowTarget};
