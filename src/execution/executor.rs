//! Job runner - runs one instance: artifacts in, steps, artifacts out

use crate::{
    artifact::{Artifact, ArtifactError, ArtifactStore},
    core::{JobInstance, Outcome, TriggerContext},
    runner::{JobContext, StepExecutor},
};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Result of running one instance
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionResult {
    /// Raw outcome; never `Skipped`
    pub outcome: Outcome,

    /// Failure message, if any
    pub detail: Option<String>,

    pub duration: Duration,
}

/// Runs a single job instance against the step executor and artifact store
pub struct JobRunner<E: ?Sized> {
    executor: Arc<E>,
    artifacts: Arc<dyn ArtifactStore>,
}

impl<E: ?Sized> Clone for JobRunner<E> {
    fn clone(&self) -> Self {
        Self {
            executor: self.executor.clone(),
            artifacts: self.artifacts.clone(),
        }
    }
}

impl<E: StepExecutor + ?Sized> JobRunner<E> {
    pub fn new(executor: Arc<E>, artifacts: Arc<dyn ArtifactStore>) -> Self {
        Self {
            executor,
            artifacts,
        }
    }

    pub fn artifacts(&self) -> &Arc<dyn ArtifactStore> {
        &self.artifacts
    }

    /// Run an instance and return its raw outcome
    pub async fn run(&self, instance: &JobInstance, trigger: &TriggerContext) -> ExecutionResult {
        let started = Instant::now();
        let (outcome, detail) = match self.run_inner(instance, trigger).await {
            Ok(()) => (Outcome::Success, None),
            Err(message) => (Outcome::Failure, Some(message)),
        };

        ExecutionResult {
            outcome,
            detail,
            duration: started.elapsed(),
        }
    }

    async fn run_inner(&self, instance: &JobInstance, trigger: &TriggerContext) -> Result<(), String> {
        let template = &instance.template;
        info!("Executing job: {}", instance.id);

        let mut ctx = JobContext::new(instance.id.clone(), trigger.clone());
        ctx.produces = template.produces.clone();

        for request in &template.consumes {
            match self.artifacts.get(&request.key).await {
                Ok(artifact) => {
                    debug!(
                        "{}: consuming '{}' from {} ({} bytes)",
                        instance.id,
                        request.key,
                        artifact.producer,
                        artifact.payload.len()
                    );
                    ctx.inputs.insert(request.key.clone(), artifact.payload);
                }
                Err(ArtifactError::NotFound(key)) if request.optional => {
                    debug!("{}: optional artifact '{}' is absent", instance.id, key);
                }
                Err(e) => {
                    warn!("{}: {}", instance.id, e);
                    return Err(e.to_string());
                }
            }
        }

        let mut output = self
            .executor
            .execute(&template.steps, &ctx)
            .await
            .map_err(|failure| {
                warn!("Job {} failed: {}", instance.id, failure);
                failure.to_string()
            })?;

        for key in &template.produces {
            let payload = output
                .artifacts
                .remove(key)
                .ok_or_else(|| format!("declared artifact '{}' was not produced", key))?;

            let artifact = Artifact {
                payload,
                producer: instance.id.clone(),
            };
            self.artifacts
                .put(key, artifact)
                .await
                .map_err(|e| e.to_string())?;
            debug!("{}: published '{}'", instance.id, key);
        }

        info!("Job {} completed successfully", instance.id);
        Ok(())
    }
}
