//! Pipeline execution engine

pub mod engine;
pub mod executor;
pub mod gate;
pub mod report;
pub mod scheduler;

pub use engine::{EngineOptions, EventHandler, ExecutionEngine, ExecutionEvent, PipelineError};
pub use executor::{ExecutionResult, JobRunner};
pub use report::{JobReport, PipelineReport};
pub use scheduler::{ExecutionScheduler, SchedulingStrategy};

use crate::core::{config::PipelineConfig, MatrixExpander, PipelineRun, TriggerContext};
use crate::runner::StepExecutor;

/// Run a pipeline definition once for a trigger
///
/// Builds and validates the job graph, expands matrices and executes every
/// instance. Graph errors are returned before any job runs. A definition
/// whose `on` filters reject the trigger yields `PipelineError::NotTriggered`.
pub async fn run_pipeline<E: StepExecutor + 'static>(
    definition: &PipelineConfig,
    trigger: TriggerContext,
    executor: E,
    options: EngineOptions,
) -> Result<PipelineReport, PipelineError> {
    run_pipeline_with_handlers(definition, trigger, executor, options, Vec::new()).await
}

/// [`run_pipeline`] with event handlers attached before the first event
pub async fn run_pipeline_with_handlers<E: StepExecutor + 'static>(
    definition: &PipelineConfig,
    trigger: TriggerContext,
    executor: E,
    options: EngineOptions,
    handlers: Vec<EventHandler>,
) -> Result<PipelineReport, PipelineError> {
    if !definition.accepts(&trigger) {
        return Err(PipelineError::NotTriggered {
            pipeline: definition.name.clone(),
            event: trigger.event,
            git_ref: trigger.git_ref,
        });
    }

    let graph = definition.to_graph()?;
    let instances = MatrixExpander::expand(&graph)?;
    let mut run = PipelineRun::new(definition.name.clone(), instances, trigger);

    let options = EngineOptions {
        fail_fast: options.fail_fast || definition.fail_fast,
        ..options
    };
    let engine = ExecutionEngine::with_options(executor, options);
    for handler in handlers {
        engine.add_event_handler(move |event| handler(event)).await;
    }
    engine.execute(&mut run).await
}
