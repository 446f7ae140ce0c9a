//! Execution state models

use crate::error::ErrorKind;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Overall run status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExecutionStatus {
    /// Run has not started
    Pending,
    /// Run is in progress
    Running,
    /// Every step completed or was skipped
    Completed,
    /// A step failed and halted the run
    Failed,
    /// The abort signal fired
    Cancelled,
}

/// Phase of a step while the interpreter works on it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StepPhase {
    Pending,
    Templating,
    CapabilityCheck,
    Dispatching,
    Running,
    Completed,
    Skipped,
    Failed,
    Aborted,
}

impl StepPhase {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            StepPhase::Completed | StepPhase::Skipped | StepPhase::Failed | StepPhase::Aborted
        )
    }

    /// Whether the interpreter may move from `self` to `next`
    ///
    /// Phases only move forward; any non-terminal phase may end the step.
    pub fn can_transition_to(&self, next: StepPhase) -> bool {
        if self.is_terminal() {
            return false;
        }
        if next.is_terminal() {
            return true;
        }
        next.ordinal() > self.ordinal()
    }

    fn ordinal(&self) -> u8 {
        match self {
            StepPhase::Pending => 0,
            StepPhase::Templating => 1,
            StepPhase::CapabilityCheck => 2,
            StepPhase::Dispatching => 3,
            StepPhase::Running => 4,
            StepPhase::Completed | StepPhase::Skipped | StepPhase::Failed | StepPhase::Aborted => 5,
        }
    }
}

/// Outcome-bearing state of a single step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StepState {
    /// Step has not been reached
    Pending,
    /// Step is running
    Running { started_at: DateTime<Utc> },
    /// Step produced an output
    Completed {
        output: Value,
        started_at: DateTime<Utc>,
        completed_at: DateTime<Utc>,
    },
    /// Step was not invoked (falsy guard, dry run)
    Skipped { reason: String },
    /// Step raised an error
    Failed {
        error: String,
        kind: ErrorKind,
        failed_at: DateTime<Utc>,
    },
    /// The run was cancelled before or while the step ran
    Aborted,
}

impl StepState {
    /// Check if step is in a terminal state
    pub fn is_terminal(&self) -> bool {
        !matches!(self, StepState::Pending | StepState::Running { .. })
    }

    pub fn phase(&self) -> StepPhase {
        match self {
            StepState::Pending => StepPhase::Pending,
            StepState::Running { .. } => StepPhase::Running,
            StepState::Completed { .. } => StepPhase::Completed,
            StepState::Skipped { .. } => StepPhase::Skipped,
            StepState::Failed { .. } => StepPhase::Failed,
            StepState::Aborted => StepPhase::Aborted,
        }
    }

    pub fn output(&self) -> Option<&Value> {
        match self {
            StepState::Completed { output, .. } => Some(output),
            _ => None,
        }
    }
}

/// Overall state of one pipeline run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunState {
    /// Unique run ID
    pub run_id: Uuid,

    pub status: ExecutionStatus,

    pub started_at: Option<DateTime<Utc>>,

    pub completed_at: Option<DateTime<Utc>>,

    pub total_steps: usize,

    pub completed_steps: usize,

    pub skipped_steps: usize,

    pub failed_steps: usize,
}

impl RunState {
    pub fn new(run_id: Uuid) -> Self {
        Self {
            run_id,
            status: ExecutionStatus::Pending,
            started_at: None,
            completed_at: None,
            total_steps: 0,
            completed_steps: 0,
            skipped_steps: 0,
            failed_steps: 0,
        }
    }

    pub fn start(&mut self, total_steps: usize) {
        self.status = ExecutionStatus::Running;
        self.started_at = Some(Utc::now());
        self.total_steps = total_steps;
    }

    pub fn finish(&mut self, status: ExecutionStatus) {
        self.status = status;
        self.completed_at = Some(Utc::now());
    }

    /// Count a terminal step state
    pub fn record(&mut self, state: &StepState) {
        match state {
            StepState::Completed { .. } => self.completed_steps += 1,
            StepState::Skipped { .. } => self.skipped_steps += 1,
            StepState::Failed { .. } => self.failed_steps += 1,
            _ => {}
        }
    }

    /// Calculate progress (0.0 to 1.0)
    pub fn progress(&self) -> f64 {
        if self.total_steps == 0 {
            return 0.0;
        }
        (self.completed_steps + self.skipped_steps + self.failed_steps) as f64
            / self.total_steps as f64
    }
}
