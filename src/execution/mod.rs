//! Pipeline interpreter

pub mod abort;
pub mod engine;
pub mod executor;
pub mod trace;

pub use abort::{AbortReason, AbortSignal};
pub use engine::{EventHandler, ExecutionEvent, PipelineRunner, RunOptions, RunOutcome, MAX_NESTING_DEPTH};
pub use executor::{StepExecutor, StepResult};
pub use trace::{RunCounter, RunTrace, StepTrace};
