//! Main execution engine - orchestrates the entire pipeline run

use crate::{
    artifact::{ArtifactStore, InMemoryArtifactStore},
    core::{
        ConditionInput, ExecutionStatus, GraphError, InstanceId, InstanceState, JobInstance,
        JobResult, Outcome, PipelineRun, TriggerContext,
    },
    execution::{
        gate,
        executor::{ExecutionResult, JobRunner},
        report::PipelineReport,
        scheduler::{ExecutionScheduler, SchedulingStrategy},
    },
    runner::StepExecutor,
};
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Mutex;
use tokio::task::{AbortHandle, JoinError, JoinSet};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Errors that abort a run before a report can be produced
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("invalid job graph: {0}")]
    Graph(#[from] GraphError),

    #[error("scheduler deadlock: {} instance(s) can never start: {}", stuck.len(), stuck.join(", "))]
    SchedulerDeadlock { stuck: Vec<String> },

    #[error("worker for '{instance}' panicked: {reason}")]
    WorkerPanicked { instance: String, reason: String },

    #[error("pipeline '{pipeline}' does not run for {event} {git_ref}")]
    NotTriggered {
        pipeline: String,
        event: String,
        git_ref: String,
    },
}

impl PipelineError {
    /// Process exit code for a run that ended with this error
    pub fn exit_code(&self) -> i32 {
        match self {
            PipelineError::NotTriggered { .. } => 0,
            PipelineError::Graph(_) => 1,
            PipelineError::SchedulerDeadlock { .. } | PipelineError::WorkerPanicked { .. } => 2,
        }
    }
}

/// Events that can occur during pipeline execution
#[derive(Debug, Clone)]
pub enum ExecutionEvent {
    PipelineStarted {
        execution_id: Uuid,
        pipeline_name: String,
        instances: usize,
    },
    JobStarted {
        instance: InstanceId,
    },
    JobFinished {
        instance: InstanceId,
        result: JobResult,
        duration: Duration,
        detail: Option<String>,
    },
    JobSkipped {
        instance: InstanceId,
        reason: String,
    },
    PipelineCompleted {
        execution_id: Uuid,
        status: ExecutionStatus,
        gate_passed: bool,
    },
}

/// Type for event handlers
pub type EventHandler = Arc<dyn Fn(ExecutionEvent) + Send + Sync>;

/// Knobs a caller may set per run
#[derive(Debug, Clone, Copy, Default)]
pub struct EngineOptions {
    pub strategy: SchedulingStrategy,

    /// Skip every instance not yet started once anything fails
    pub fail_fast: bool,
}

/// Main pipeline execution engine
pub struct ExecutionEngine<E> {
    scheduler: ExecutionScheduler,
    executor: Arc<E>,
    artifacts: Option<Arc<dyn ArtifactStore>>,
    fail_fast: bool,
    event_handlers: Arc<Mutex<Vec<EventHandler>>>,
}

/// What a worker task hands back to the engine
type WorkerOutput = (usize, Result<ExecutionResult, JoinError>);

/// Running instances of one execution
///
/// Each instance runs in its own task so a panic is attributed to it; the
/// join set only awaits those tasks. `abort_all` cancels both layers.
#[derive(Default)]
struct WorkerPool {
    joins: JoinSet<WorkerOutput>,
    running: HashMap<usize, AbortHandle>,
}

impl WorkerPool {
    fn spawn<E: StepExecutor + ?Sized + 'static>(
        &mut self,
        index: usize,
        runner: JobRunner<E>,
        instance: JobInstance,
        trigger: TriggerContext,
    ) {
        let handle = tokio::spawn(async move { runner.run(&instance, &trigger).await });
        self.running.insert(index, handle.abort_handle());
        self.joins.spawn(async move { (index, handle.await) });
    }

    async fn join_next(&mut self) -> Option<Result<WorkerOutput, JoinError>> {
        let joined = self.joins.join_next().await;
        if let Some(Ok((index, _))) = &joined {
            self.running.remove(index);
        }
        joined
    }

    fn abort_all(&mut self) {
        for (_, handle) in self.running.drain() {
            handle.abort();
        }
        self.joins.abort_all();
    }

    fn is_empty(&self) -> bool {
        self.joins.is_empty()
    }

    fn len(&self) -> usize {
        self.running.len()
    }
}

impl<E: StepExecutor + 'static> ExecutionEngine<E> {
    pub fn new(executor: E, strategy: SchedulingStrategy) -> Self {
        Self {
            scheduler: ExecutionScheduler::new(strategy),
            executor: Arc::new(executor),
            artifacts: None,
            fail_fast: false,
            event_handlers: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn with_options(executor: E, options: EngineOptions) -> Self {
        Self::new(executor, options.strategy).with_fail_fast(options.fail_fast)
    }

    pub fn with_fail_fast(mut self, fail_fast: bool) -> Self {
        self.fail_fast = fail_fast;
        self
    }

    /// Use a caller-owned artifact store instead of a fresh one per run
    pub fn with_artifact_store(mut self, store: Arc<dyn ArtifactStore>) -> Self {
        self.artifacts = Some(store);
        self
    }

    pub fn executor(&self) -> &E {
        &self.executor
    }

    /// Add an event handler
    pub async fn add_event_handler<F>(&self, handler: F)
    where
        F: Fn(ExecutionEvent) + Send + Sync + 'static,
    {
        self.event_handlers.lock().await.push(Arc::new(handler));
    }

    /// Emit an event to all handlers
    async fn emit_event(&self, event: ExecutionEvent) {
        let handlers = self.event_handlers.lock().await;
        for handler in handlers.iter() {
            handler(event.clone());
        }
    }

    /// Execute every instance of the run and report the outcome
    pub async fn execute(&self, run: &mut PipelineRun) -> Result<PipelineReport, PipelineError> {
        let execution_id = run.execution_id;
        info!(
            "Starting pipeline execution: {} ({}, {:?})",
            run.name,
            execution_id,
            self.scheduler.strategy()
        );

        run.start();
        self.emit_event(ExecutionEvent::PipelineStarted {
            execution_id,
            pipeline_name: run.name.clone(),
            instances: run.graph().len(),
        })
        .await;

        let artifacts = self
            .artifacts
            .clone()
            .unwrap_or_else(|| Arc::new(InMemoryArtifactStore::new()));
        let runner = JobRunner::new(self.executor.clone(), artifacts);
        let mut workers = WorkerPool::default();

        loop {
            let mut progressed = self.resolve(run).await;

            for index in self.scheduler.next_instances(run) {
                self.dispatch(run, index, &runner, &mut workers).await;
                progressed = true;
            }

            if run.is_complete() {
                break;
            }

            if workers.is_empty() {
                if progressed {
                    continue;
                }
                let stuck: Vec<String> = run
                    .unfinished()
                    .into_iter()
                    .map(|i| run.graph().instance(i).id.to_string())
                    .collect();
                error!("No instances ready to run and none running - pipeline stuck");
                run.finish(false);
                return Err(PipelineError::SchedulerDeadlock { stuck });
            }

            debug!("Waiting on {} running instance(s)", workers.len());
            match workers.join_next().await {
                Some(Ok((index, Ok(result)))) => {
                    self.complete(run, index, result.outcome, result.duration, result.detail)
                        .await;
                }
                Some(Ok((index, Err(e)))) => {
                    workers.abort_all();
                    run.finish(false);
                    return Err(PipelineError::WorkerPanicked {
                        instance: run.graph().instance(index).id.to_string(),
                        reason: e.to_string(),
                    });
                }
                Some(Err(e)) => {
                    workers.abort_all();
                    run.finish(false);
                    return Err(PipelineError::WorkerPanicked {
                        instance: "<unknown>".to_string(),
                        reason: e.to_string(),
                    });
                }
                None => {}
            }
        }

        debug!("Artifacts published: {:?}", runner.artifacts().keys().await);

        let gate_passed = gate::gate_passed(run);
        run.finish(gate_passed);

        info!(
            "Pipeline execution finished: {} - {:?} in {:?} (gate {})",
            run.name,
            run.status,
            run.elapsed(),
            if gate_passed { "passed" } else { "failed" }
        );
        self.emit_event(ExecutionEvent::PipelineCompleted {
            execution_id,
            status: run.status,
            gate_passed,
        })
        .await;

        Ok(PipelineReport::from_run(run, gate_passed))
    }

    /// Move pending instances whose needs are done to `Ready` or `Skipped`
    ///
    /// Returns whether any instance changed state.
    async fn resolve(&self, run: &mut PipelineRun) -> bool {
        let mut progressed = false;

        if self.fail_fast && run.has_effective_failure() {
            let unstarted: Vec<usize> = run
                .unfinished()
                .into_iter()
                .filter(|&i| matches!(run.state(i), InstanceState::Pending | InstanceState::Ready))
                .collect();
            for index in unstarted {
                self.skip(run, index, "fail-fast").await;
                progressed = true;
            }
        }

        loop {
            let resolvable = run.resolvable();
            if resolvable.is_empty() {
                break;
            }

            for index in resolvable {
                let needs = run.need_results(index);
                let instance = run.graph().instance(index);
                let input = ConditionInput {
                    trigger: &run.trigger,
                    needs: &needs,
                };

                if instance.template.condition.evaluate(&input) {
                    debug!("{} is ready", instance.id);
                    run.set_state(index, InstanceState::Ready);
                } else {
                    self.skip(run, index, "condition evaluated to false").await;
                }
            }
            progressed = true;
        }

        progressed
    }

    /// Start a ready instance; gates are evaluated inline
    async fn dispatch(
        &self,
        run: &mut PipelineRun,
        index: usize,
        runner: &JobRunner<E>,
        workers: &mut WorkerPool,
    ) {
        let instance = run.graph().instance(index).clone();
        self.emit_event(ExecutionEvent::JobStarted {
            instance: instance.id.clone(),
        })
        .await;

        if instance.template.gate {
            let (outcome, detail) = gate::evaluate(&gate::required_outcomes(run, index));
            self.complete(run, index, outcome, Duration::ZERO, detail).await;
            return;
        }

        run.set_state(
            index,
            InstanceState::Running {
                started_at: Utc::now(),
            },
        );

        workers.spawn(index, runner.clone(), instance, run.trigger.clone());
    }

    async fn complete(
        &self,
        run: &mut PipelineRun,
        index: usize,
        raw: Outcome,
        duration: Duration,
        detail: Option<String>,
    ) {
        let instance = run.graph().instance(index).clone();
        let result = JobResult::new(raw, instance.template.continue_on_error);

        match (result.raw, result.effective) {
            (Outcome::Failure, Outcome::Success) => {
                warn!("{} failed but continues on error", instance.id)
            }
            (Outcome::Failure, _) => warn!("{} failed", instance.id),
            _ => info!("{} finished: {}", instance.id, result.raw),
        }

        run.set_state(
            index,
            InstanceState::Done {
                result,
                duration,
                detail: detail.clone(),
            },
        );
        self.emit_event(ExecutionEvent::JobFinished {
            instance: instance.id,
            result,
            duration,
            detail,
        })
        .await;
    }

    async fn skip(&self, run: &mut PipelineRun, index: usize, reason: &str) {
        let id = run.graph().instance(index).id.clone();
        info!("Skipping {}: {}", id, reason);

        run.set_state(
            index,
            InstanceState::Done {
                result: JobResult::skipped(),
                duration: Duration::ZERO,
                detail: Some(reason.to_string()),
            },
        );
        self.emit_event(ExecutionEvent::JobSkipped {
            instance: id,
            reason: reason.to_string(),
        })
        .await;
    }
}
