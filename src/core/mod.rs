//! Core domain models for pipelines
//!
//! This module defines job templates, the job graph, matrix expansion,
//! activation conditions and execution state.

pub mod condition;
pub mod config;
pub mod context;
pub mod graph;
pub mod job;
pub mod matrix;
pub mod pipeline;
pub mod state;

pub use condition::{Condition, ConditionInput};
pub use context::TriggerContext;
pub use graph::{GraphError, JobGraph};
pub use job::{ArtifactRequest, JobTemplate, Step};
pub use matrix::{InstanceGraph, InstanceId, JobInstance, MatrixExpander};
pub use pipeline::PipelineRun;
pub use state::{ExecutionStatus, InstanceState, JobResult, Outcome};
