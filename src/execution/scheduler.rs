//! Execution scheduler - determines which instances to dispatch next

use crate::core::PipelineRun;

/// Strategy for scheduling instance execution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SchedulingStrategy {
    /// One instance at a time, in topological order
    Sequential,

    /// Every ready instance at once
    #[default]
    Parallel,

    /// Worker pool of at most N concurrent instances
    LimitedParallel(usize),
}

/// Scheduler for determining which ready instances get a worker
#[derive(Debug, Clone)]
pub struct ExecutionScheduler {
    strategy: SchedulingStrategy,
}

impl ExecutionScheduler {
    pub fn new(strategy: SchedulingStrategy) -> Self {
        Self { strategy }
    }

    pub fn strategy(&self) -> SchedulingStrategy {
        self.strategy
    }

    /// Number of additional workers that may start now
    fn capacity(&self, running: usize) -> usize {
        match self.strategy {
            SchedulingStrategy::Sequential => 1usize.saturating_sub(running),
            SchedulingStrategy::Parallel => usize::MAX,
            // a pool of zero workers could never finish
            SchedulingStrategy::LimitedParallel(max) => max.max(1).saturating_sub(running),
        }
    }

    /// Ready instances to dispatch, lowest topological position first
    pub fn next_instances(&self, run: &PipelineRun) -> Vec<usize> {
        let capacity = self.capacity(run.running_count());
        if capacity == 0 {
            return vec![];
        }
        run.ready().into_iter().take(capacity).collect()
    }
}

impl Default for ExecutionScheduler {
    fn default() -> Self {
        Self::new(SchedulingStrategy::default())
    }
}
