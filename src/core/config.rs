//! Pipeline definition loaded from YAML

use crate::core::{
    condition::Condition,
    context::TriggerContext,
    graph::{GraphError, JobGraph},
    job::{ArtifactRequest, JobTemplate, Step},
};
use anyhow::Result;
use serde::{Deserialize, Serialize};
use serde_yaml::Value;
use std::collections::BTreeMap;
use std::path::Path;

/// Top-level pipeline definition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Pipeline name
    pub name: String,

    /// Skip every pending job once any job fails
    #[serde(default, alias = "fail-fast")]
    pub fail_fast: bool,

    /// Events this definition reacts to; empty accepts every trigger
    #[serde(default, rename = "on")]
    pub triggers: Vec<TriggerFilter>,

    /// Job declarations
    pub jobs: Vec<JobConfig>,
}

/// Selects the triggers a definition runs for
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriggerFilter {
    /// Event name, e.g. `push`
    pub event: String,

    /// Ref patterns; a trailing `*` matches any suffix. Empty matches all refs
    #[serde(default)]
    pub refs: Vec<String>,
}

impl TriggerFilter {
    pub fn matches(&self, trigger: &TriggerContext) -> bool {
        if self.event != trigger.event {
            return false;
        }
        self.refs.is_empty()
            || self
                .refs
                .iter()
                .any(|pattern| ref_matches(pattern, &trigger.git_ref))
    }
}

fn ref_matches(pattern: &str, git_ref: &str) -> bool {
    match pattern.strip_suffix('*') {
        Some(prefix) => git_ref.starts_with(prefix),
        None => pattern == git_ref,
    }
}

/// Job declaration as written in YAML
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobConfig {
    /// Unique job identifier
    pub id: String,

    /// Jobs that must finish first
    #[serde(default)]
    pub needs: Vec<String>,

    /// Condition expression; omitted means `success()`
    #[serde(default, rename = "if", alias = "condition")]
    pub condition: Option<String>,

    /// Matrix axes
    #[serde(default)]
    pub matrix: BTreeMap<String, Vec<Value>>,

    /// Report failure without blocking dependents
    #[serde(default, alias = "continueOnError", alias = "continue-on-error")]
    pub continue_on_error: bool,

    #[serde(default)]
    pub steps: Vec<Step>,

    /// Artifact keys published on success
    #[serde(default)]
    pub produces: Vec<String>,

    /// Artifact keys fetched before the steps run
    #[serde(default)]
    pub consumes: Vec<ConsumeConfig>,

    /// Marks the aggregate gate job
    #[serde(default)]
    pub gate: bool,
}

/// A consumed artifact: either a bare key or `{ key, optional }`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConsumeConfig {
    Key(String),
    Detailed(ArtifactRequest),
}

impl From<&ConsumeConfig> for ArtifactRequest {
    fn from(config: &ConsumeConfig) -> Self {
        match config {
            ConsumeConfig::Key(key) => ArtifactRequest::required(key.clone()),
            ConsumeConfig::Detailed(request) => request.clone(),
        }
    }
}

impl JobConfig {
    /// Build the domain template, parsing the condition expression
    pub fn to_template(&self) -> Result<JobTemplate, GraphError> {
        let condition = match &self.condition {
            Some(expression) => {
                Condition::parse(expression).map_err(|e| GraphError::InvalidCondition {
                    job: self.id.clone(),
                    expression: expression.clone(),
                    reason: e.reason,
                })?
            }
            None if self.gate => Condition::always(),
            None => Condition::success(),
        };

        let matrix = self
            .matrix
            .iter()
            .map(|(axis, values)| (axis.clone(), values.iter().map(scalar_to_string).collect()))
            .collect();

        Ok(JobTemplate {
            id: self.id.clone(),
            needs: self.needs.clone(),
            condition,
            matrix,
            continue_on_error: self.continue_on_error,
            steps: self.steps.clone(),
            produces: self.produces.clone(),
            consumes: self.consumes.iter().map(ArtifactRequest::from).collect(),
            gate: self.gate,
        })
    }
}

fn scalar_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        other => serde_yaml::to_string(other)
            .map(|s| s.trim().to_string())
            .unwrap_or_default(),
    }
}

impl PipelineConfig {
    /// Load a pipeline definition from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse and validate a pipeline definition from a YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: PipelineConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the definition without running anything
    pub fn validate(&self) -> Result<()> {
        for job in &self.jobs {
            if job.gate && !job.steps.is_empty() {
                anyhow::bail!("Gate job '{}' must not declare steps", job.id);
            }
            if job.gate && !job.produces.is_empty() {
                anyhow::bail!("Gate job '{}' must not produce artifacts", job.id);
            }
        }

        self.to_graph()?;
        Ok(())
    }

    /// Build and finalize the job graph
    pub fn to_graph(&self) -> Result<JobGraph, GraphError> {
        let mut graph = JobGraph::new();
        for job in &self.jobs {
            graph.add_job(job.to_template()?)?;
        }
        graph.finalize()?;
        Ok(graph)
    }

    /// Whether this definition runs for the given trigger
    pub fn accepts(&self, trigger: &TriggerContext) -> bool {
        self.triggers.is_empty() || self.triggers.iter().any(|f| f.matches(trigger))
    }

    /// Number of job instances after matrix expansion
    pub fn instance_count(&self) -> usize {
        self.jobs
            .iter()
            .map(|job| {
                job.matrix
                    .values()
                    .map(|values| {
                        let mut distinct: Vec<String> = values.iter().map(scalar_to_string).collect();
                        distinct.sort();
                        distinct.dedup();
                        distinct.len()
                    })
                    .product::<usize>()
            })
            .sum()
    }
}
