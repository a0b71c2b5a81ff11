//! Job activation conditions
//!
//! A condition decides, once every need of an instance is done, whether the
//! instance runs or is skipped. Only a closed set of predicates is
//! understood; there is no general expression grammar.

use crate::core::{
    context::TriggerContext,
    state::{JobResult, Outcome},
};
use regex::Regex;
use std::fmt;
use std::sync::{Arc, OnceLock};
use thiserror::Error;

/// Input a condition is evaluated against
#[derive(Debug, Clone, Copy)]
pub struct ConditionInput<'a> {
    pub trigger: &'a TriggerContext,
    /// Results of every needed instance
    pub needs: &'a [JobResult],
}

/// Opaque caller-supplied predicate
pub type CustomPredicate = Arc<dyn Fn(&ConditionInput<'_>) -> bool + Send + Sync>;

/// A single predicate of a condition
#[derive(Clone)]
pub enum Predicate {
    /// No need has effective outcome `Failure` (skipped needs are fine)
    Success,
    /// Every need has effective outcome `Success`
    AllSuccess,
    /// At least one need has effective outcome `Failure`
    Failure,
    /// Always true
    Always,
    /// Trigger event equals (or differs from) a value
    Event { value: String, negated: bool },
    /// Trigger ref equals (or differs from) a value
    Ref { value: String, negated: bool },
    /// Trigger ref starts with a prefix
    RefStartsWith(String),
    /// Caller-supplied predicate
    Custom(CustomPredicate),
}

impl Predicate {
    /// Status predicates look at need results; others only at the trigger
    fn inspects_needs(&self) -> bool {
        matches!(
            self,
            Predicate::Success
                | Predicate::AllSuccess
                | Predicate::Failure
                | Predicate::Always
                | Predicate::Custom(_)
        )
    }

    fn evaluate(&self, input: &ConditionInput<'_>) -> bool {
        match self {
            Predicate::Success => input
                .needs
                .iter()
                .all(|r| r.effective != Outcome::Failure),
            Predicate::AllSuccess => input
                .needs
                .iter()
                .all(|r| r.effective == Outcome::Success),
            Predicate::Failure => input
                .needs
                .iter()
                .any(|r| r.effective == Outcome::Failure),
            Predicate::Always => true,
            Predicate::Event { value, negated } => (input.trigger.event == *value) != *negated,
            Predicate::Ref { value, negated } => (input.trigger.git_ref == *value) != *negated,
            Predicate::RefStartsWith(prefix) => input.trigger.git_ref.starts_with(prefix.as_str()),
            Predicate::Custom(f) => f(input),
        }
    }
}

impl fmt::Debug for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Predicate::Success => write!(f, "success()"),
            Predicate::AllSuccess => write!(f, "all_success()"),
            Predicate::Failure => write!(f, "failure()"),
            Predicate::Always => write!(f, "always()"),
            Predicate::Event { value, negated } => {
                write!(f, "event {} '{}'", if *negated { "!=" } else { "==" }, value)
            }
            Predicate::Ref { value, negated } => {
                write!(f, "ref {} '{}'", if *negated { "!=" } else { "==" }, value)
            }
            Predicate::RefStartsWith(prefix) => write!(f, "startsWith(ref, '{}')", prefix),
            Predicate::Custom(_) => write!(f, "<custom>"),
        }
    }
}

/// Error produced when a condition expression cannot be parsed
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{reason}")]
pub struct ConditionParseError {
    pub reason: String,
}

impl ConditionParseError {
    fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// Activation condition: a disjunction of conjunctions of predicates
#[derive(Clone)]
pub struct Condition {
    any_of: Vec<Vec<Predicate>>,
    source: String,
}

impl Condition {
    /// The default condition: no needed instance failed
    pub fn success() -> Self {
        Self {
            any_of: vec![vec![Predicate::Success]],
            source: "success()".to_string(),
        }
    }

    pub fn always() -> Self {
        Self {
            any_of: vec![vec![Predicate::Always]],
            source: "always()".to_string(),
        }
    }

    /// Wrap an opaque predicate
    pub fn custom<F>(f: F) -> Self
    where
        F: Fn(&ConditionInput<'_>) -> bool + Send + Sync + 'static,
    {
        Self {
            any_of: vec![vec![Predicate::Custom(Arc::new(f))]],
            source: "<custom>".to_string(),
        }
    }

    /// Parse a condition expression
    ///
    /// Clauses are joined by `&&` (binding tighter) and `||`. Every `||`
    /// clause without a status predicate is implicitly ANDed with `success()`.
    pub fn parse(expression: &str) -> Result<Self, ConditionParseError> {
        let trimmed = expression.trim();
        if trimmed.is_empty() {
            return Err(ConditionParseError::new("empty condition"));
        }

        let mut any_of = Vec::new();
        for clause in trimmed.split("||") {
            let mut all_of = Vec::new();
            for atom in clause.split("&&") {
                all_of.push(parse_atom(atom.trim())?);
            }
            if !all_of.iter().any(Predicate::inspects_needs) {
                all_of.insert(0, Predicate::Success);
            }
            any_of.push(all_of);
        }

        Ok(Self {
            any_of,
            source: trimmed.to_string(),
        })
    }

    /// Evaluate the condition once all needs are done
    pub fn evaluate(&self, input: &ConditionInput<'_>) -> bool {
        self.any_of
            .iter()
            .any(|clause| clause.iter().all(|p| p.evaluate(input)))
    }

    /// The expression this condition was built from
    pub fn source(&self) -> &str {
        &self.source
    }
}

impl Default for Condition {
    fn default() -> Self {
        Self::success()
    }
}

impl fmt::Debug for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Condition")
            .field("source", &self.source)
            .field("any_of", &self.any_of)
            .finish()
    }
}

fn status_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(success|all_success|failure|always)\(\s*\)$").expect("valid regex"))
}

fn comparison_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(event|ref)\s*(==|!=)\s*'([^']*)'$").expect("valid regex"))
}

fn starts_with_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^startsWith\(\s*ref\s*,\s*'([^']*)'\s*\)$").expect("valid regex")
    })
}

fn parse_atom(atom: &str) -> Result<Predicate, ConditionParseError> {
    if atom.is_empty() {
        return Err(ConditionParseError::new("empty clause"));
    }

    if let Some(caps) = status_regex().captures(atom) {
        return Ok(match &caps[1] {
            "success" => Predicate::Success,
            "all_success" => Predicate::AllSuccess,
            "failure" => Predicate::Failure,
            _ => Predicate::Always,
        });
    }

    if let Some(caps) = comparison_regex().captures(atom) {
        let value = caps[3].to_string();
        let negated = &caps[2] == "!=";
        return Ok(match &caps[1] {
            "event" => Predicate::Event { value, negated },
            _ => Predicate::Ref { value, negated },
        });
    }

    if let Some(caps) = starts_with_regex().captures(atom) {
        return Ok(Predicate::RefStartsWith(caps[1].to_string()));
    }

    Err(ConditionParseError::new(format!(
        "unsupported condition term '{}'",
        atom
    )))
}
