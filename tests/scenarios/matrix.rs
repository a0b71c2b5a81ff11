//! Test: Matrix expansion - one instance per axis combination

use crate::helpers::*;
use jobflow::core::{Outcome, TriggerContext};

const MATRIX: &str = r#"
name: "matrix"
jobs:
  - id: build
    matrix:
      target: [x86_64, aarch64]
    steps:
      - run: "cargo build --target $MATRIX_TARGET"
  - id: test
    needs: [build]
    matrix:
      os: [linux, macos]
      toolchain: [stable, nightly]
    steps:
      - run: "cargo test"
  - id: release
    needs: [test]
    steps:
      - run: "cargo publish"
  - id: gate
    gate: true
    needs: [release]
"#;

#[tokio::test]
async fn test_every_combination_runs_once() {
    let stub = StubExecutor::new();
    let report = run_yaml(MATRIX, TriggerContext::push("main"), stub.clone()).await;

    // 2 builds + 4 tests + release + gate
    assert_eq!(report.jobs.len(), 8);
    for os in ["linux", "macos"] {
        for toolchain in ["stable", "nightly"] {
            let id = format!("test (os={}, toolchain={})", os, toolchain);
            assert_outcome(&report, &id, Outcome::Success);
            assert_eq!(stub.runs_of(&id), 1);
        }
    }
    assert_gate_passed(&report);
}

/// Each test instance waits for every build instance
#[tokio::test]
async fn test_instances_wait_for_every_needed_instance() {
    let stub = StubExecutor::new().with_delay(std::time::Duration::from_millis(5));
    run_yaml(MATRIX, TriggerContext::push("main"), stub.clone()).await;

    let order = stub.invocations();
    let last_build = order.iter().rposition(|i| i.starts_with("build")).unwrap();
    let first_test = order.iter().position(|i| i.starts_with("test")).unwrap();
    let last_test = order.iter().rposition(|i| i.starts_with("test")).unwrap();
    let release = order.iter().position(|i| i == "release").unwrap();

    assert!(first_test > last_build);
    assert!(release > last_test);
}

/// One failing combination blocks the fan-in job
#[tokio::test]
async fn test_single_failing_instance_blocks_dependents() {
    let stub = StubExecutor::failing(&["test (os=macos, toolchain=nightly)"]);
    let report = run_yaml(MATRIX, TriggerContext::push("main"), stub.clone()).await;

    assert_outcome(&report, "test (os=macos, toolchain=nightly)", Outcome::Failure);
    assert_outcome(&report, "test (os=linux, toolchain=nightly)", Outcome::Success);
    assert_skipped(&report, "release", "condition evaluated to false");
    assert_eq!(stub.runs_of("release"), 0);

    // the gate only needs release, which was skipped rather than failed
    assert_outcome(&report, "gate", Outcome::Success);
    assert_gate_passed(&report);
}

#[tokio::test]
async fn test_matrix_values_are_deduplicated() {
    let yaml = r#"
name: "dup"
jobs:
  - id: test
    matrix:
      version: [1, 2, 1]
"#;
    let report = run_yaml(yaml, TriggerContext::push("main"), StubExecutor::new()).await;
    let ids: Vec<&String> = report.jobs.keys().collect();
    assert_eq!(ids, vec!["test (version=1)", "test (version=2)"]);
}
