//! Pipeline run - instance graph plus per-instance execution state

use crate::core::{
    context::TriggerContext,
    matrix::InstanceGraph,
    state::{ExecutionStatus, InstanceState, JobResult, Outcome},
};
use chrono::{DateTime, Utc};
use std::time::Duration;
use uuid::Uuid;

/// One execution of a pipeline definition
#[derive(Debug, Clone)]
pub struct PipelineRun {
    /// Unique execution ID
    pub execution_id: Uuid,

    /// Pipeline name
    pub name: String,

    /// The event this run reacts to
    pub trigger: TriggerContext,

    pub status: ExecutionStatus,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,

    graph: InstanceGraph,
    states: Vec<InstanceState>,
}

impl PipelineRun {
    pub fn new(name: impl Into<String>, graph: InstanceGraph, trigger: TriggerContext) -> Self {
        let states = vec![InstanceState::Pending; graph.len()];
        Self {
            execution_id: Uuid::new_v4(),
            name: name.into(),
            trigger,
            status: ExecutionStatus::Pending,
            started_at: None,
            completed_at: None,
            graph,
            states,
        }
    }

    pub fn graph(&self) -> &InstanceGraph {
        &self.graph
    }

    pub fn state(&self, index: usize) -> &InstanceState {
        &self.states[index]
    }

    pub(crate) fn set_state(&mut self, index: usize, state: InstanceState) {
        self.states[index] = state;
    }

    /// Mark the run as started
    pub fn start(&mut self) {
        self.status = ExecutionStatus::Running;
        self.started_at = Some(Utc::now());
    }

    /// Mark the run as finished with the gate's verdict
    pub fn finish(&mut self, gate_passed: bool) {
        self.status = if gate_passed {
            ExecutionStatus::Completed
        } else {
            ExecutionStatus::Failed
        };
        self.completed_at = Some(Utc::now());
    }

    /// Pending instances whose needs are all done, in topological order
    pub fn resolvable(&self) -> Vec<usize> {
        (0..self.states.len())
            .filter(|&i| matches!(self.states[i], InstanceState::Pending))
            .filter(|&i| {
                self.graph
                    .needs_of(i)
                    .iter()
                    .all(|&dep| self.states[dep].is_done())
            })
            .collect()
    }

    /// Instances that passed their condition and wait for a worker
    pub fn ready(&self) -> Vec<usize> {
        (0..self.states.len())
            .filter(|&i| matches!(self.states[i], InstanceState::Ready))
            .collect()
    }

    pub fn running_count(&self) -> usize {
        self.states
            .iter()
            .filter(|s| matches!(s, InstanceState::Running { .. }))
            .count()
    }

    /// Instances not yet done
    pub fn unfinished(&self) -> Vec<usize> {
        (0..self.states.len())
            .filter(|&i| !self.states[i].is_done())
            .collect()
    }

    /// Results of every need of an instance; needs must be done
    pub fn need_results(&self, index: usize) -> Vec<JobResult> {
        self.graph
            .needs_of(index)
            .iter()
            .filter_map(|&dep| self.states[dep].result())
            .collect()
    }

    /// Whether any finished instance has effective outcome `Failure`
    pub fn has_effective_failure(&self) -> bool {
        self.states
            .iter()
            .filter_map(InstanceState::result)
            .any(|r| r.effective == Outcome::Failure)
    }

    pub fn is_complete(&self) -> bool {
        self.states.iter().all(InstanceState::is_done)
    }

    /// Total wall time of the run so far
    pub fn elapsed(&self) -> Duration {
        match (self.started_at, self.completed_at) {
            (Some(start), Some(end)) => end.signed_duration_since(start).to_std().unwrap_or_default(),
            (Some(start), None) => Utc::now().signed_duration_since(start).to_std().unwrap_or_default(),
            _ => Duration::ZERO,
        }
    }
}
