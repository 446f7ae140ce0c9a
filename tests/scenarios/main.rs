//! Scenario-based tests for brick pipelines

mod helpers;

mod abort;
mod capability_gate;
mod context_threading;
mod control_flow;
mod failure_handling;
mod ordering;
mod registry;
mod skip_semantics;
