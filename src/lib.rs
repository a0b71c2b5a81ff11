//! jobflow - a CI job-graph scheduler with matrix expansion and an aggregate gate

pub mod artifact;
pub mod cli;
pub mod core;
pub mod execution;
pub mod persistence;
pub mod runner;

// Re-export commonly used types
pub use artifact::{Artifact, ArtifactError, ArtifactStore, InMemoryArtifactStore};
pub use core::config::PipelineConfig;
pub use core::{
    Condition, ExecutionStatus, GraphError, JobGraph, JobResult, JobTemplate, MatrixExpander,
    Outcome, PipelineRun, Step, TriggerContext,
};
pub use execution::{
    run_pipeline, run_pipeline_with_handlers, EngineOptions, ExecutionEngine, ExecutionEvent,
    PipelineError, PipelineReport, SchedulingStrategy,
};
pub use runner::{JobContext, ShellExecutor, StepExecutor};
