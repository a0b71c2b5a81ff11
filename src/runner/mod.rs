//! Step execution adapters
//!
//! The engine never interprets steps. It hands a job's steps to a
//! [`StepExecutor`] and only looks at whether the whole job succeeded.

pub mod config;
pub mod output;
pub mod shell;

use crate::core::{InstanceId, Step, TriggerContext};
use async_trait::async_trait;
use std::collections::BTreeMap;
use tracing::debug;

pub use config::ShellConfig;
pub use output::{JobFailure, JobOutput, StepFailure, StepOutput};
pub use shell::ShellExecutor;

/// Everything an executor gets to know about the job instance it runs
#[derive(Debug, Clone)]
pub struct JobContext {
    pub instance: InstanceId,
    pub trigger: TriggerContext,

    /// Consumed artifacts, already fetched from the store
    pub inputs: BTreeMap<String, Vec<u8>>,

    /// Artifact keys the job is expected to publish
    pub produces: Vec<String>,
}

impl JobContext {
    pub fn new(instance: InstanceId, trigger: TriggerContext) -> Self {
        Self {
            instance,
            trigger,
            inputs: BTreeMap::new(),
            produces: Vec::new(),
        }
    }
}

/// Trait for step execution - allows for different implementations
#[async_trait]
pub trait StepExecutor: Send + Sync {
    /// Run a single step
    async fn run_step(&self, step: &Step, ctx: &JobContext) -> Result<StepOutput, StepFailure>;

    /// Run a job's steps in order, stopping at the first failure
    async fn execute(&self, steps: &[Step], ctx: &JobContext) -> Result<JobOutput, JobFailure> {
        let mut output = JobOutput::default();

        for step in steps {
            debug!("{}: running step '{}'", ctx.instance, step.label());
            let step_output = self
                .run_step(step, ctx)
                .await
                .map_err(|failure| JobFailure::new(step.label(), failure))?;
            output.absorb(step_output);
        }

        Ok(output)
    }
}
