//! Job graph - templates and their dependency edges

use crate::core::job::JobTemplate;
use std::collections::{HashMap, HashSet};
use thiserror::Error;

/// Construction-time errors; any of these rejects the pipeline before a job runs
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GraphError {
    #[error("duplicate job id '{0}'")]
    DuplicateId(String),

    #[error("job '{job}' needs unknown job '{dependency}'")]
    UnknownDependency { job: String, dependency: String },

    #[error("dependency cycle: {}", path.join(" -> "))]
    Cycle { path: Vec<String> },

    #[error("job graph is frozen; no further changes are allowed")]
    Frozen,

    #[error("job graph must be finalized before expansion")]
    NotFinalized,

    #[error("job '{job}' declares matrix axis '{axis}' with no values")]
    EmptyMatrixAxis { job: String, axis: String },

    #[error("more than one gate job declared: '{first}' and '{second}'")]
    MultipleGates { first: String, second: String },

    #[error("job '{job}' produces artifact '{key}' from {instances} matrix instances; a key can have only one producer")]
    MatrixProducer {
        job: String,
        key: String,
        instances: usize,
    },

    #[error("job '{job}' uses invalid artifact key '{key}': use letters, digits, '.', '_' or '-', not starting with '.'")]
    InvalidArtifactKey { job: String, key: String },

    #[error("job '{job}' has an invalid condition '{expression}': {reason}")]
    InvalidCondition {
        job: String,
        expression: String,
        reason: String,
    },
}

/// Artifact keys double as file names in executor scratch directories
fn is_valid_artifact_key(key: &str) -> bool {
    !key.is_empty()
        && !key.starts_with('.')
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
}

/// Instances a template expands to, counting repeated axis values once
fn instance_count(template: &JobTemplate) -> usize {
    template
        .matrix
        .values()
        .map(|values| values.iter().collect::<HashSet<_>>().len())
        .product()
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    White,
    Gray,
    Black,
}

/// Job templates plus their `needs` edges
///
/// Templates are added one at a time, then `finalize` validates the graph
/// and freezes it.
#[derive(Debug, Clone, Default)]
pub struct JobGraph {
    templates: Vec<JobTemplate>,
    index: HashMap<String, usize>,
    /// Topological order (indices into `templates`), set by `finalize`
    order: Vec<usize>,
    frozen: bool,
}

impl JobGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a job template
    pub fn add_job(&mut self, template: JobTemplate) -> Result<(), GraphError> {
        if self.frozen {
            return Err(GraphError::Frozen);
        }
        if self.index.contains_key(&template.id) {
            return Err(GraphError::DuplicateId(template.id));
        }

        self.index.insert(template.id.clone(), self.templates.len());
        self.templates.push(template);
        Ok(())
    }

    /// Validate edges, reject cycles and freeze the graph
    pub fn finalize(&mut self) -> Result<(), GraphError> {
        if self.frozen {
            return Ok(());
        }

        let mut gate: Option<&str> = None;
        for template in &self.templates {
            for dep in &template.needs {
                if !self.index.contains_key(dep) {
                    return Err(GraphError::UnknownDependency {
                        job: template.id.clone(),
                        dependency: dep.clone(),
                    });
                }
            }

            for (axis, values) in &template.matrix {
                if values.is_empty() {
                    return Err(GraphError::EmptyMatrixAxis {
                        job: template.id.clone(),
                        axis: axis.clone(),
                    });
                }
            }

            let keys = template
                .produces
                .iter()
                .chain(template.consumes.iter().map(|request| &request.key));
            for key in keys {
                if !is_valid_artifact_key(key) {
                    return Err(GraphError::InvalidArtifactKey {
                        job: template.id.clone(),
                        key: key.clone(),
                    });
                }
            }

            let instances = instance_count(template);
            if let (Some(key), true) = (template.produces.first(), instances > 1) {
                return Err(GraphError::MatrixProducer {
                    job: template.id.clone(),
                    key: key.clone(),
                    instances,
                });
            }

            if template.gate {
                if let Some(first) = gate {
                    return Err(GraphError::MultipleGates {
                        first: first.to_string(),
                        second: template.id.clone(),
                    });
                }
                gate = Some(&template.id);
            }
        }

        self.order = self.topological_order()?;
        self.frozen = true;
        Ok(())
    }

    /// Depth-first search with three-colour marking
    ///
    /// Roots are visited in declaration order, so the resulting order is
    /// deterministic.
    fn topological_order(&self) -> Result<Vec<usize>, GraphError> {
        let mut marks = vec![Mark::White; self.templates.len()];
        let mut order = Vec::with_capacity(self.templates.len());
        let mut path = Vec::new();

        for root in 0..self.templates.len() {
            if marks[root] == Mark::White {
                self.visit(root, &mut marks, &mut path, &mut order)?;
            }
        }

        Ok(order)
    }

    fn visit(
        &self,
        node: usize,
        marks: &mut [Mark],
        path: &mut Vec<usize>,
        order: &mut Vec<usize>,
    ) -> Result<(), GraphError> {
        marks[node] = Mark::Gray;
        path.push(node);

        for dep in &self.templates[node].needs {
            let dep = self.index[dep];
            match marks[dep] {
                Mark::Gray => {
                    let start = path.iter().position(|&n| n == dep).unwrap_or(0);
                    let mut cycle: Vec<String> = path[start..]
                        .iter()
                        .map(|&n| self.templates[n].id.clone())
                        .collect();
                    cycle.push(self.templates[dep].id.clone());
                    return Err(GraphError::Cycle { path: cycle });
                }
                Mark::White => self.visit(dep, marks, path, order)?,
                Mark::Black => {}
            }
        }

        path.pop();
        marks[node] = Mark::Black;
        order.push(node);
        Ok(())
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    pub fn template(&self, id: &str) -> Option<&JobTemplate> {
        self.index.get(id).map(|&i| &self.templates[i])
    }

    /// Templates in topological order once finalized, declaration order before
    pub fn templates(&self) -> Vec<&JobTemplate> {
        if self.frozen {
            self.order.iter().map(|&i| &self.templates[i]).collect()
        } else {
            self.templates.iter().collect()
        }
    }

    /// The gate template, if one is declared
    pub fn gate(&self) -> Option<&JobTemplate> {
        self.templates.iter().find(|t| t.gate)
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }
}
