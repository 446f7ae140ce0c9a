//! Run tracing
//!
//! A [`RunTrace`] records one [`StepTrace`] per step reached during a run,
//! including steps of nested pipelines. Every nested pipeline invocation
//! gets a new call number so its steps can be told apart from the parent's.

use crate::core::state::StepState;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

/// Issues monotonically increasing run numbers per mod component
#[derive(Debug, Default)]
pub struct RunCounter {
    counters: DashMap<String, u64>,
}

impl RunCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Next run number for `key`, starting at 1
    pub fn next(&self, key: &str) -> u64 {
        let mut counter = self.counters.entry(key.to_string()).or_insert(0);
        *counter += 1;
        *counter
    }
}

/// Trace of a single step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepTrace {
    /// Pipeline invocation the step belongs to; 0 is the top-level pipeline
    pub call: u64,

    pub depth: usize,
    pub index: usize,
    pub brick_id: String,
    pub label: String,
    pub state: StepState,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Default)]
struct TraceInner {
    steps: Mutex<Vec<StepTrace>>,
    calls: AtomicU64,
}

/// Shared, append-mostly trace of one run
#[derive(Debug, Clone, Default)]
pub struct RunTrace {
    inner: Arc<TraceInner>,
}

impl RunTrace {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number for the next nested pipeline invocation
    pub fn next_call(&self) -> u64 {
        self.inner.calls.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Number of nested pipeline invocations so far
    pub fn calls(&self) -> u64 {
        self.inner.calls.load(Ordering::SeqCst)
    }

    /// Record a step as pending
    pub fn add(&self, call: u64, depth: usize, index: usize, brick_id: &str, label: &str) {
        self.inner
            .steps
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(StepTrace {
                call,
                depth,
                index,
                brick_id: brick_id.to_string(),
                label: label.to_string(),
                state: StepState::Pending,
                started_at: None,
                finished_at: None,
            });
    }

    /// Move a recorded step to a new state
    pub fn update(&self, call: u64, index: usize, state: StepState) {
        let mut steps = self.inner.steps.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(step) = steps
            .iter_mut()
            .rev()
            .find(|step| step.call == call && step.index == index)
        {
            let now = Utc::now();
            match &state {
                StepState::Running { started_at } => step.started_at = Some(*started_at),
                StepState::Completed { started_at, completed_at, .. } => {
                    step.started_at = Some(*started_at);
                    step.finished_at = Some(*completed_at);
                }
                StepState::Pending => {}
                _ => step.finished_at = Some(now),
            }
            step.state = state;
        }
    }

    pub fn steps(&self) -> Vec<StepTrace> {
        self.inner
            .steps
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Steps of one pipeline invocation, in order
    pub fn call_steps(&self, call: u64) -> Vec<StepTrace> {
        self.steps().into_iter().filter(|step| step.call == call).collect()
    }
}
