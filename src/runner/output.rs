//! Step and job execution results

use std::collections::BTreeMap;
use thiserror::Error;

/// Error types for a single step
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StepFailure {
    #[error("command exited with code {}: {stderr}", describe_code(.code))]
    Command { code: Option<i32>, stderr: String },

    #[error("timeout after {0} seconds")]
    Timeout(u64),

    #[error("internal error: {0}")]
    Internal(String),
}

fn describe_code(code: &Option<i32>) -> String {
    match code {
        Some(code) => code.to_string(),
        None => "<signal>".to_string(),
    }
}

/// A job failed because one of its steps failed
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("step '{step}' failed: {failure}")]
pub struct JobFailure {
    pub step: String,
    pub failure: StepFailure,
}

impl JobFailure {
    pub fn new(step: impl Into<String>, failure: StepFailure) -> Self {
        Self {
            step: step.into(),
            failure,
        }
    }
}

/// Output of one step
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StepOutput {
    /// Captured output
    pub log: String,

    /// Artifacts published by the step (key -> payload)
    pub artifacts: BTreeMap<String, Vec<u8>>,
}

impl StepOutput {
    pub fn with_log(log: impl Into<String>) -> Self {
        Self {
            log: log.into(),
            artifacts: BTreeMap::new(),
        }
    }
}

/// Output of a whole job
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JobOutput {
    /// One entry per step that ran
    pub logs: Vec<String>,

    pub artifacts: BTreeMap<String, Vec<u8>>,
}

impl JobOutput {
    /// Publish an artifact from a job
    pub fn with_artifact(mut self, key: impl Into<String>, payload: impl Into<Vec<u8>>) -> Self {
        self.artifacts.insert(key.into(), payload.into());
        self
    }

    /// Fold a step's output into the job output; later steps win on key clashes
    pub fn absorb(&mut self, step: StepOutput) {
        self.logs.push(step.log);
        self.artifacts.extend(step.artifacts);
    }
}
