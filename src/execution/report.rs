//! Pipeline report - the externally visible result of a run

use crate::core::{ExecutionStatus, InstanceId, InstanceState, Outcome, PipelineRun, TriggerContext};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Result of a single job instance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobReport {
    pub instance: InstanceId,
    pub raw: Outcome,
    pub effective: Outcome,
    pub duration_ms: u64,

    /// Failure message or skip reason
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// Result of a whole pipeline run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineReport {
    pub execution_id: Uuid,
    pub pipeline_name: String,
    pub trigger: TriggerContext,
    pub status: ExecutionStatus,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,

    /// Per-instance results keyed by the instance's display name
    pub jobs: BTreeMap<String, JobReport>,

    pub gate_passed: bool,
}

impl PipelineReport {
    /// Build a report from a finished run
    pub fn from_run(run: &PipelineRun, gate_passed: bool) -> Self {
        let jobs = run
            .graph()
            .instances()
            .iter()
            .enumerate()
            .filter_map(|(i, instance)| match run.state(i) {
                InstanceState::Done {
                    result,
                    duration,
                    detail,
                } => Some((
                    instance.id.to_string(),
                    JobReport {
                        instance: instance.id.clone(),
                        raw: result.raw,
                        effective: result.effective,
                        duration_ms: duration.as_millis() as u64,
                        detail: detail.clone(),
                    },
                )),
                _ => None,
            })
            .collect();

        Self {
            execution_id: run.execution_id,
            pipeline_name: run.name.clone(),
            trigger: run.trigger.clone(),
            status: run.status,
            started_at: run.started_at,
            completed_at: run.completed_at,
            jobs,
            gate_passed,
        }
    }

    pub fn job(&self, id: &str) -> Option<&JobReport> {
        self.jobs.get(id)
    }

    /// Raw outcome per instance
    pub fn outcomes(&self) -> BTreeMap<String, Outcome> {
        self.jobs
            .iter()
            .map(|(id, job)| (id.clone(), job.raw))
            .collect()
    }

    /// Number of instances with the given raw outcome
    pub fn count(&self, outcome: Outcome) -> usize {
        self.jobs.values().filter(|job| job.raw == outcome).count()
    }

    pub fn duration_ms(&self) -> u64 {
        match (self.started_at, self.completed_at) {
            (Some(start), Some(end)) => end
                .signed_duration_since(start)
                .num_milliseconds()
                .max(0) as u64,
            _ => 0,
        }
    }

    /// Process exit code for this run
    pub fn exit_code(&self) -> i32 {
        if self.gate_passed {
            0
        } else {
            1
        }
    }
}
