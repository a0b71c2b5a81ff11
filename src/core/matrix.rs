//! Matrix expansion - turns job templates into concrete job instances

use crate::core::{
    graph::{GraphError, JobGraph},
    job::JobTemplate,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

/// Identity of a job instance: template id plus matrix assignment
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct InstanceId {
    pub template: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub matrix: BTreeMap<String, String>,
}

impl InstanceId {
    pub fn new(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
            matrix: BTreeMap::new(),
        }
    }

    pub fn with(mut self, axis: impl Into<String>, value: impl Into<String>) -> Self {
        self.matrix.insert(axis.into(), value.into());
        self
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.template)?;
        if !self.matrix.is_empty() {
            let assignment: Vec<String> = self
                .matrix
                .iter()
                .map(|(axis, value)| format!("{}={}", axis, value))
                .collect();
            write!(f, " ({})", assignment.join(", "))?;
        }
        Ok(())
    }
}

/// One concrete, schedulable execution of a template
#[derive(Debug, Clone)]
pub struct JobInstance {
    pub id: InstanceId,
    pub template: Arc<JobTemplate>,
}

/// Instance-level DAG produced by the expander
///
/// Instances are stored in topological order and `needs[i]` holds the
/// indices of every instance that instance `i` waits on.
#[derive(Debug, Clone)]
pub struct InstanceGraph {
    instances: Vec<JobInstance>,
    needs: Vec<Vec<usize>>,
    by_template: HashMap<String, Vec<usize>>,
}

impl InstanceGraph {
    pub fn instances(&self) -> &[JobInstance] {
        &self.instances
    }

    pub fn instance(&self, index: usize) -> &JobInstance {
        &self.instances[index]
    }

    /// Indices of the instances `index` depends on
    pub fn needs_of(&self, index: usize) -> &[usize] {
        &self.needs[index]
    }

    /// Indices of every instance expanded from a template
    pub fn instances_of(&self, template: &str) -> &[usize] {
        self.by_template
            .get(template)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn position(&self, id: &InstanceId) -> Option<usize> {
        self.instances_of(&id.template)
            .iter()
            .copied()
            .find(|&i| self.instances[i].id == *id)
    }

    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }
}

/// Matrix expander for job templates
pub struct MatrixExpander;

impl MatrixExpander {
    /// Expand a finalized graph into its instance graph
    pub fn expand(graph: &JobGraph) -> Result<InstanceGraph, GraphError> {
        if !graph.is_frozen() {
            return Err(GraphError::NotFinalized);
        }

        let mut instances = Vec::new();
        let mut needs = Vec::new();
        let mut by_template: HashMap<String, Vec<usize>> = HashMap::new();

        for template in graph.templates() {
            let shared = Arc::new(template.clone());

            // every instance needs every instance of each needed template
            let mut upstream = Vec::new();
            for dep in &template.needs {
                if let Some(indices) = by_template.get(dep) {
                    upstream.extend(indices.iter().copied());
                }
            }
            upstream.sort_unstable();
            upstream.dedup();

            let mut own = Vec::new();
            for assignment in Self::combinations(&template.matrix) {
                own.push(instances.len());
                instances.push(JobInstance {
                    id: InstanceId {
                        template: template.id.clone(),
                        matrix: assignment,
                    },
                    template: shared.clone(),
                });
                needs.push(upstream.clone());
            }
            by_template.insert(template.id.clone(), own);
        }

        let expanded = InstanceGraph {
            instances,
            needs,
            by_template,
        };
        Self::check_acyclic(&expanded)?;
        Ok(expanded)
    }

    /// Cartesian product of the axis values
    ///
    /// Axes iterate in name order, values in declaration order with
    /// duplicates dropped. An empty matrix yields one empty assignment.
    pub fn combinations(
        matrix: &BTreeMap<String, Vec<String>>,
    ) -> Vec<BTreeMap<String, String>> {
        let mut combos = vec![BTreeMap::new()];

        for (axis, values) in matrix {
            let mut distinct: Vec<&String> = Vec::with_capacity(values.len());
            for value in values {
                if !distinct.contains(&value) {
                    distinct.push(value);
                }
            }

            combos = combos
                .into_iter()
                .flat_map(|combo| {
                    distinct.iter().map(move |value| {
                        let mut next = combo.clone();
                        next.insert(axis.clone(), (*value).clone());
                        next
                    })
                })
                .collect();
        }

        combos
    }

    /// Every edge must point to an earlier instance in topological order
    fn check_acyclic(expanded: &InstanceGraph) -> Result<(), GraphError> {
        for (i, deps) in expanded.needs.iter().enumerate() {
            if let Some(&bad) = deps.iter().find(|&&d| d >= i) {
                return Err(GraphError::Cycle {
                    path: vec![
                        expanded.instances[i].id.to_string(),
                        expanded.instances[bad].id.to_string(),
                        expanded.instances[i].id.to_string(),
                    ],
                });
            }
        }
        Ok(())
    }
}
