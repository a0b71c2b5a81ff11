//! Trigger context - the external event a pipeline run reacts to

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Describes the event that started a pipeline run
///
/// Conditions and trigger filters are evaluated against this value; the
/// shell executor also exports it to every step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerContext {
    /// Event name, e.g. `push` or `pull_request`
    pub event: String,

    /// Fully qualified git ref, e.g. `refs/heads/main`
    #[serde(rename = "ref")]
    pub git_ref: String,

    /// Extra key/value data supplied by the caller
    #[serde(default)]
    pub variables: BTreeMap<String, String>,
}

impl TriggerContext {
    pub fn new(event: impl Into<String>, git_ref: impl Into<String>) -> Self {
        Self {
            event: event.into(),
            git_ref: git_ref.into(),
            variables: BTreeMap::new(),
        }
    }

    /// Convenience constructor for a push to a branch
    pub fn push(branch: &str) -> Self {
        Self::new("push", format!("refs/heads/{}", branch))
    }

    /// Convenience constructor for a pull request event
    pub fn pull_request(number: u64) -> Self {
        Self::new("pull_request", format!("refs/pull/{}/merge", number))
    }

    pub fn with_variable(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.variables.insert(key.into(), value.into());
        self
    }

    /// Short ref name (`main` for `refs/heads/main`)
    pub fn ref_name(&self) -> &str {
        self.git_ref
            .strip_prefix("refs/heads/")
            .or_else(|| self.git_ref.strip_prefix("refs/tags/"))
            .unwrap_or(&self.git_ref)
    }
}

impl Default for TriggerContext {
    fn default() -> Self {
        Self::new("manual", "refs/heads/main")
    }
}
