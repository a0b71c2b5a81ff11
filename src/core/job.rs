//! Job template domain model

use crate::core::condition::Condition;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// An opaque command descriptor; the core never interprets it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Step {
    /// Human-readable step name
    #[serde(default)]
    pub name: Option<String>,

    /// Command handed to the step executor
    pub run: String,

    /// Extra environment for this step
    #[serde(default)]
    pub env: BTreeMap<String, String>,
}

impl Step {
    pub fn new(run: impl Into<String>) -> Self {
        Self {
            name: None,
            run: run.into(),
            env: BTreeMap::new(),
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Name for logs: the explicit name or the command itself
    pub fn label(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.run)
    }
}

/// An artifact a job reads before its steps run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactRequest {
    pub key: String,

    /// Missing optional artifacts are ignored instead of failing the job
    #[serde(default)]
    pub optional: bool,
}

impl ArtifactRequest {
    pub fn required(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            optional: false,
        }
    }

    pub fn optional(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            optional: true,
        }
    }
}

/// A declared unit of work before matrix expansion
#[derive(Debug, Clone)]
pub struct JobTemplate {
    /// Unique job identifier
    pub id: String,

    /// Templates that must finish first, in declaration order
    pub needs: Vec<String>,

    /// Activation condition evaluated once all needs are done
    pub condition: Condition,

    /// Matrix axes (axis name -> values); empty means no expansion
    pub matrix: BTreeMap<String, Vec<String>>,

    /// A failure is reported but does not block dependents
    pub continue_on_error: bool,

    pub steps: Vec<Step>,

    /// Artifact keys published when the job succeeds
    pub produces: Vec<String>,

    /// Artifact keys fetched before the steps run
    pub consumes: Vec<ArtifactRequest>,

    /// This template is the pipeline's aggregate gate
    pub gate: bool,
}

impl JobTemplate {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            needs: Vec::new(),
            condition: Condition::default(),
            matrix: BTreeMap::new(),
            continue_on_error: false,
            steps: Vec::new(),
            produces: Vec::new(),
            consumes: Vec::new(),
            gate: false,
        }
    }

    /// A gate template: runs regardless of upstream results
    pub fn gate(id: impl Into<String>, needs: &[&str]) -> Self {
        let mut template = Self::new(id).with_needs(needs);
        template.condition = Condition::always();
        template.gate = true;
        template
    }

    pub fn with_needs(mut self, needs: &[&str]) -> Self {
        self.needs = needs.iter().map(|n| n.to_string()).collect();
        self
    }

    pub fn with_condition(mut self, condition: Condition) -> Self {
        self.condition = condition;
        self
    }

    pub fn with_axis(mut self, axis: impl Into<String>, values: &[&str]) -> Self {
        self.matrix
            .insert(axis.into(), values.iter().map(|v| v.to_string()).collect());
        self
    }

    pub fn with_continue_on_error(mut self, continue_on_error: bool) -> Self {
        self.continue_on_error = continue_on_error;
        self
    }

    pub fn with_step(mut self, step: Step) -> Self {
        self.steps.push(step);
        self
    }

    pub fn producing(mut self, key: impl Into<String>) -> Self {
        self.produces.push(key.into());
        self
    }

    pub fn consuming(mut self, request: ArtifactRequest) -> Self {
        self.consumes.push(request);
        self
    }

    pub fn is_matrixed(&self) -> bool {
        !self.matrix.is_empty()
    }
}
