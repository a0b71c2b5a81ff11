//! Test utility functions for jobflow
#![allow(dead_code)]

use jobflow::core::config::PipelineConfig;
use jobflow::core::{Outcome, Step, TriggerContext};
use jobflow::execution::{run_pipeline, EngineOptions, PipelineError, PipelineReport};
use jobflow::runner::{JobContext, JobFailure, JobOutput, StepExecutor, StepFailure, StepOutput};

use async_trait::async_trait;
use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Default)]
struct StubState {
    failing: HashSet<String>,
    withheld: HashSet<String>,
    delay: Option<Duration>,
    invocations: Mutex<Vec<String>>,
    inputs: Mutex<BTreeMap<String, BTreeMap<String, Vec<u8>>>>,
}

/// Deterministic step executor
///
/// Every job succeeds unless its template id or full instance name was
/// marked failing. Declared artifacts are published as
/// `"<key> from <instance>"` unless withheld.
#[derive(Clone, Default)]
pub struct StubExecutor {
    state: Arc<StubState>,
}

impl StubExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the given templates or instances
    pub fn failing(jobs: &[&str]) -> Self {
        Self::new().with_failing(jobs)
    }

    pub fn with_failing(self, jobs: &[&str]) -> Self {
        self.rebuild(|state| state.failing.extend(jobs.iter().map(|j| j.to_string())))
    }

    /// Succeed without publishing the given artifact keys
    pub fn withholding(self, keys: &[&str]) -> Self {
        self.rebuild(|state| state.withheld.extend(keys.iter().map(|k| k.to_string())))
    }

    pub fn with_delay(self, delay: Duration) -> Self {
        self.rebuild(|state| state.delay = Some(delay))
    }

    fn rebuild(self, f: impl FnOnce(&mut StubState)) -> Self {
        let mut state = StubState {
            failing: self.state.failing.clone(),
            withheld: self.state.withheld.clone(),
            delay: self.state.delay,
            ..Default::default()
        };
        f(&mut state);
        Self {
            state: Arc::new(state),
        }
    }

    /// Instances that ran, in start order
    pub fn invocations(&self) -> Vec<String> {
        self.state.invocations.lock().unwrap().clone()
    }

    /// How many times an instance ran
    pub fn runs_of(&self, instance: &str) -> usize {
        self.invocations().iter().filter(|i| *i == instance).count()
    }

    /// Artifacts an instance received
    pub fn inputs_of(&self, instance: &str) -> BTreeMap<String, Vec<u8>> {
        self.state
            .inputs
            .lock()
            .unwrap()
            .get(instance)
            .cloned()
            .unwrap_or_default()
    }

    fn fails(&self, ctx: &JobContext) -> bool {
        self.state.failing.contains(&ctx.instance.template)
            || self.state.failing.contains(&ctx.instance.to_string())
    }
}

#[async_trait]
impl StepExecutor for StubExecutor {
    async fn run_step(&self, step: &Step, ctx: &JobContext) -> Result<StepOutput, StepFailure> {
        if let Some(delay) = self.state.delay {
            tokio::time::sleep(delay).await;
        }
        if self.fails(ctx) {
            return Err(StepFailure::Command {
                code: Some(1),
                stderr: format!("{} failed", step.label()),
            });
        }
        Ok(StepOutput::with_log(step.run.clone()))
    }

    async fn execute(&self, steps: &[Step], ctx: &JobContext) -> Result<JobOutput, JobFailure> {
        let name = ctx.instance.to_string();
        self.state.invocations.lock().unwrap().push(name.clone());
        self.state
            .inputs
            .lock()
            .unwrap()
            .insert(name.clone(), ctx.inputs.clone());

        let mut output = JobOutput::default();
        for step in steps {
            let step_output = self
                .run_step(step, ctx)
                .await
                .map_err(|f| JobFailure::new(step.label(), f))?;
            output.absorb(step_output);
        }

        for key in &ctx.produces {
            if !self.state.withheld.contains(key) {
                output = output.with_artifact(key.clone(), format!("{} from {}", key, name).into_bytes());
            }
        }
        Ok(output)
    }
}

/// Parse a definition and run it with default options
pub async fn run_yaml(
    yaml: &str,
    trigger: TriggerContext,
    executor: StubExecutor,
) -> PipelineReport {
    run_yaml_with(yaml, trigger, executor, EngineOptions::default())
        .await
        .expect("pipeline run failed")
}

/// Parse a definition and run it, surfacing engine errors
pub async fn run_yaml_with(
    yaml: &str,
    trigger: TriggerContext,
    executor: StubExecutor,
    options: EngineOptions,
) -> Result<PipelineReport, PipelineError> {
    // parsed without validation so graph errors reach the engine
    let config: PipelineConfig = serde_yaml::from_str(yaml).expect("invalid YAML");
    run_pipeline(&config, trigger, executor, options).await
}

/// Assert an instance's raw outcome
pub fn assert_outcome(report: &PipelineReport, instance: &str, expected: Outcome) {
    let job = report
        .job(instance)
        .unwrap_or_else(|| panic!("Instance '{}' not found in report: {:?}", instance, report.outcomes()));
    assert_eq!(
        job.raw, expected,
        "Instance '{}' should be {}, but was {} ({:?})",
        instance, expected, job.raw, job.detail
    );
}

/// Assert an instance's raw and effective outcomes
pub fn assert_outcomes(report: &PipelineReport, instance: &str, raw: Outcome, effective: Outcome) {
    assert_outcome(report, instance, raw);
    let job = &report.jobs[instance];
    assert_eq!(
        job.effective, effective,
        "Instance '{}' should be effectively {}, but was {}",
        instance, effective, job.effective
    );
}

/// Assert an instance was skipped for the given reason
pub fn assert_skipped(report: &PipelineReport, instance: &str, reason: &str) {
    assert_outcome(report, instance, Outcome::Skipped);
    let detail = report.jobs[instance].detail.clone().unwrap_or_default();
    assert!(
        detail.contains(reason),
        "Instance '{}' skip reason '{}' does not contain '{}'",
        instance, detail, reason
    );
}

pub fn assert_gate_passed(report: &PipelineReport) {
    assert!(
        report.gate_passed,
        "Gate should have passed: {:?}",
        report.outcomes()
    );
    assert_eq!(report.exit_code(), 0);
}

pub fn assert_gate_failed(report: &PipelineReport) {
    assert!(
        !report.gate_passed,
        "Gate should have failed: {:?}",
        report.outcomes()
    );
    assert_ne!(report.exit_code(), 0);
}
