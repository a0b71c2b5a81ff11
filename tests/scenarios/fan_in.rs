//! Test: Fan-out / fan-in - one failing branch fails the gate, nothing re-runs

use crate::helpers::*;
use jobflow::core::{Outcome, TriggerContext};

const DIAMOND: &str = r#"
name: "diamond"
jobs:
  - id: build
    steps:
      - run: "make"
  - id: test-a
    needs: [build]
    steps:
      - run: "make test-a"
  - id: test-b
    needs: [build]
    steps:
      - run: "make test-b"
  - id: gate
    gate: true
    needs: [test-a, test-b]
"#;

/// A failing branch fails the gate without touching its sibling
#[tokio::test]
async fn test_failing_branch_fails_gate() {
    let stub = StubExecutor::failing(&["test-b"]);
    let report = run_yaml(DIAMOND, TriggerContext::push("main"), stub.clone()).await;

    assert_outcome(&report, "build", Outcome::Success);
    assert_outcome(&report, "test-a", Outcome::Success);
    assert_outcome(&report, "test-b", Outcome::Failure);
    assert_outcome(&report, "gate", Outcome::Failure);
    assert_gate_failed(&report);

    // build ran once even though two jobs depend on it
    assert_eq!(stub.runs_of("build"), 1);
    assert_eq!(stub.runs_of("test-a"), 1);

    let gate = report.job("gate").unwrap();
    assert_eq!(gate.detail.as_deref(), Some("required jobs failed: test-b"));
}

#[tokio::test]
async fn test_all_green_passes_gate() {
    let stub = StubExecutor::new();
    let report = run_yaml(DIAMOND, TriggerContext::push("main"), stub.clone()).await;

    assert_gate_passed(&report);
    assert_eq!(report.jobs.len(), 4);
    assert_eq!(stub.invocations().len(), 3);
    assert_eq!(stub.invocations()[0], "build");
}

/// Dependents only start after every need finished
#[tokio::test]
async fn test_needs_run_before_dependents() {
    let stub = StubExecutor::new().with_delay(std::time::Duration::from_millis(5));
    run_yaml(DIAMOND, TriggerContext::push("main"), stub.clone()).await;

    let order = stub.invocations();
    let build = order.iter().position(|i| i == "build").unwrap();
    assert!(order.iter().position(|i| i == "test-a").unwrap() > build);
    assert!(order.iter().position(|i| i == "test-b").unwrap() > build);
}

/// Same definition, trigger and failures give the same report
#[tokio::test]
async fn test_repeated_runs_are_deterministic() {
    let first = run_yaml(
        DIAMOND,
        TriggerContext::push("main"),
        StubExecutor::failing(&["test-a"]),
    )
    .await;
    let second = run_yaml(
        DIAMOND,
        TriggerContext::push("main"),
        StubExecutor::failing(&["test-a"]),
    )
    .await;

    assert_eq!(first.outcomes(), second.outcomes());
    assert_eq!(first.gate_passed, second.gate_passed);
    assert_ne!(first.execution_id, second.execution_id);
}

/// Without a gate every instance counts
#[tokio::test]
async fn test_no_gate_means_every_job_is_required() {
    let yaml = r#"
name: "gateless"
jobs:
  - id: build
  - id: docs
    continue-on-error: true
"#;
    let report = run_yaml(yaml, TriggerContext::push("main"), StubExecutor::failing(&["docs"])).await;
    assert_outcomes(&report, "docs", Outcome::Failure, Outcome::Success);
    assert_gate_failed(&report);

    let report = run_yaml(yaml, TriggerContext::push("main"), StubExecutor::new()).await;
    assert_gate_passed(&report);
}
