//! Shell executor - runs step commands as subprocesses

use crate::core::Step;
use crate::runner::{
    JobContext, JobFailure, JobOutput, ShellConfig, StepExecutor, StepFailure, StepOutput,
};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, warn};
use uuid::Uuid;

/// Per-job scratch directories for artifact hand-off
#[derive(Debug)]
struct ArtifactDirs {
    root: PathBuf,
    inputs: PathBuf,
    outputs: PathBuf,
}

impl ArtifactDirs {
    async fn create(ctx: &JobContext) -> Result<Self, StepFailure> {
        let root = std::env::temp_dir().join(format!("jobflow-{}", Uuid::new_v4()));
        let inputs = root.join("in");
        let outputs = root.join("out");

        for dir in [&inputs, &outputs] {
            tokio::fs::create_dir_all(dir).await.map_err(|e| {
                StepFailure::Internal(format!("Failed to create {}: {}", dir.display(), e))
            })?;
        }

        for (key, payload) in &ctx.inputs {
            let path = inputs.join(key);
            tokio::fs::write(&path, payload).await.map_err(|e| {
                StepFailure::Internal(format!("Failed to stage artifact '{}': {}", key, e))
            })?;
        }

        Ok(Self {
            root,
            inputs,
            outputs,
        })
    }

    /// Read every declared output file that exists
    async fn collect(&self, keys: &[String]) -> BTreeMap<String, Vec<u8>> {
        let mut artifacts = BTreeMap::new();
        for key in keys {
            match tokio::fs::read(self.outputs.join(key)).await {
                Ok(payload) => {
                    artifacts.insert(key.clone(), payload);
                }
                Err(e) => debug!("Artifact '{}' not published: {}", key, e),
            }
        }
        artifacts
    }

    async fn remove(self) {
        if let Err(e) = tokio::fs::remove_dir_all(&self.root).await {
            warn!("Failed to clean up {}: {}", self.root.display(), e);
        }
    }
}

/// Runs each step with `<shell> -c <run>`
///
/// Steps see the matrix assignment as `MATRIX_<AXIS>`, the trigger as
/// `CI_EVENT`/`CI_REF`, the instance as `CI_JOB`, consumed artifacts as
/// files in `$ARTIFACTS_IN` and publish artifacts by writing a file named
/// after the key into `$ARTIFACTS_OUT`.
#[derive(Debug, Clone, Default)]
pub struct ShellExecutor {
    config: ShellConfig,
}

impl ShellExecutor {
    pub fn new(config: ShellConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ShellConfig {
        &self.config
    }

    fn environment(ctx: &JobContext) -> BTreeMap<String, String> {
        let mut env = BTreeMap::new();
        env.insert("CI_JOB".to_string(), ctx.instance.to_string());
        env.insert("CI_EVENT".to_string(), ctx.trigger.event.clone());
        env.insert("CI_REF".to_string(), ctx.trigger.git_ref.clone());
        for (axis, value) in &ctx.instance.matrix {
            env.insert(format!("MATRIX_{}", env_name(axis)), value.clone());
        }
        env
    }

    async fn run_command(
        &self,
        step: &Step,
        ctx: &JobContext,
        dirs: Option<&ArtifactDirs>,
    ) -> Result<StepOutput, StepFailure> {
        debug!("Spawning {} for step '{}'", self.config.shell, step.label());

        let mut command = Command::new(&self.config.shell);
        command
            .arg("-c")
            .arg(&step.run)
            .envs(Self::environment(ctx))
            .envs(&step.env)
            .kill_on_drop(true);

        if let Some(dir) = &self.config.working_dir {
            command.current_dir(dir);
        }
        if let Some(dirs) = dirs {
            command
                .env("ARTIFACTS_IN", &dirs.inputs)
                .env("ARTIFACTS_OUT", &dirs.outputs);
        }

        let result = timeout(Duration::from_secs(self.config.timeout_secs), command.output())
            .await
            .map_err(|_| StepFailure::Timeout(self.config.timeout_secs))?;

        let output = result.map_err(|e| {
            StepFailure::Internal(format!("Failed to spawn {}: {}", self.config.shell, e))
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            warn!(
                "Step '{}' exited with code {:?}: {}",
                step.label(),
                output.status.code(),
                stderr
            );
            return Err(StepFailure::Command {
                code: output.status.code(),
                stderr,
            });
        }

        Ok(StepOutput::with_log(
            String::from_utf8_lossy(&output.stdout).to_string(),
        ))
    }
}

#[async_trait]
impl StepExecutor for ShellExecutor {
    async fn run_step(&self, step: &Step, ctx: &JobContext) -> Result<StepOutput, StepFailure> {
        self.run_command(step, ctx, None).await
    }

    async fn execute(&self, steps: &[Step], ctx: &JobContext) -> Result<JobOutput, JobFailure> {
        let dirs = ArtifactDirs::create(ctx)
            .await
            .map_err(|failure| JobFailure::new("stage artifacts", failure))?;

        let mut output = JobOutput::default();
        let mut failed = None;
        for step in steps {
            match self.run_command(step, ctx, Some(&dirs)).await {
                Ok(step_output) => output.absorb(step_output),
                Err(failure) => {
                    failed = Some(JobFailure::new(step.label(), failure));
                    break;
                }
            }
        }

        if failed.is_none() {
            output.artifacts = dirs.collect(&ctx.produces).await;
        }
        dirs.remove().await;

        match failed {
            Some(failure) => Err(failure),
            None => Ok(output),
        }
    }
}

/// Upper-case an axis name and replace anything that is not alphanumeric
fn env_name(axis: &str) -> String {
    axis.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_uppercase()
            } else {
                '_'
            }
        })
        .collect()
}
