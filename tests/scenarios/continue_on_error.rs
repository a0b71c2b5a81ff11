//! Test: continue-on-error - masked for dependents, visible to the gate

use crate::helpers::*;
use jobflow::core::{Outcome, TriggerContext};

const LINT: &str = r#"
name: "lint"
jobs:
  - id: clippy
    continue-on-error: true
    matrix:
      toolchain: [stable, nightly]
    steps:
      - run: "cargo clippy"
  - id: package
    needs: [clippy]
    if: "all_success()"
    steps:
      - run: "cargo package"
  - id: check-success
    gate: true
    needs: [clippy, package]
"#;

#[tokio::test]
async fn test_masked_failure_unblocks_dependents() {
    let stub = StubExecutor::failing(&["clippy (toolchain=nightly)"]);
    let report = run_yaml(LINT, TriggerContext::push("main"), stub.clone()).await;

    assert_outcomes(
        &report,
        "clippy (toolchain=nightly)",
        Outcome::Failure,
        Outcome::Success,
    );
    assert_outcomes(
        &report,
        "clippy (toolchain=stable)",
        Outcome::Success,
        Outcome::Success,
    );

    // even the strict condition sees only effective outcomes
    assert_outcome(&report, "package", Outcome::Success);
    assert_eq!(stub.runs_of("package"), 1);
}

#[tokio::test]
async fn test_masked_failure_still_fails_gate() {
    let stub = StubExecutor::failing(&["clippy (toolchain=nightly)"]);
    let report = run_yaml(LINT, TriggerContext::push("main"), stub).await;

    assert_outcome(&report, "check-success", Outcome::Failure);
    assert_gate_failed(&report);
    assert!(report.jobs["check-success"]
        .detail
        .as_deref()
        .unwrap()
        .contains("clippy (toolchain=nightly)"));
}

#[tokio::test]
async fn test_masked_failure_does_not_trigger_fail_fast() {
    let stub = StubExecutor::failing(&["clippy"]);
    let options = jobflow::EngineOptions {
        fail_fast: true,
        ..Default::default()
    };
    let report = run_yaml_with(LINT, TriggerContext::push("main"), stub, options)
        .await
        .unwrap();

    assert_outcome(&report, "package", Outcome::Success);
    assert_gate_failed(&report);
}
