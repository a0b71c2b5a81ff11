//! Execution state models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Terminal result of a job instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Success,
    Failure,
    Skipped,
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Success => write!(f, "success"),
            Outcome::Failure => write!(f, "failure"),
            Outcome::Skipped => write!(f, "skipped"),
        }
    }
}

/// Raw and effective outcome of a finished instance
///
/// `raw` is what actually happened and feeds the gate. `effective` is what
/// dependents see: a failure of a `continue_on_error` job is masked to
/// `Success`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobResult {
    pub raw: Outcome,
    pub effective: Outcome,
}

impl JobResult {
    pub fn new(raw: Outcome, continue_on_error: bool) -> Self {
        let effective = match raw {
            Outcome::Failure if continue_on_error => Outcome::Success,
            other => other,
        };
        Self { raw, effective }
    }

    pub fn skipped() -> Self {
        Self {
            raw: Outcome::Skipped,
            effective: Outcome::Skipped,
        }
    }
}

/// Overall pipeline execution status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExecutionStatus {
    /// Pipeline has not started
    Pending,
    /// Pipeline is currently running
    Running,
    /// Every instance is done and the gate passed
    Completed,
    /// Every instance is done and the gate failed
    Failed,
}

/// Scheduling state of a single job instance
#[derive(Debug, Clone, PartialEq)]
pub enum InstanceState {
    /// Waiting for needs to finish
    Pending,
    /// Needs are done and the condition holds
    Ready,
    /// Handed to a worker
    Running { started_at: DateTime<Utc> },
    /// Finished, skipped or failed
    Done {
        result: JobResult,
        duration: Duration,
        /// Failure message or skip reason
        detail: Option<String>,
    },
}

impl InstanceState {
    /// Check if the instance reached its final state
    pub fn is_done(&self) -> bool {
        matches!(self, InstanceState::Done { .. })
    }

    pub fn result(&self) -> Option<JobResult> {
        match self {
            InstanceState::Done { result, .. } => Some(*result),
            _ => None,
        }
    }
}
