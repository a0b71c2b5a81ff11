//! Test: Conditions - trigger filters, status functions and skip propagation

use crate::helpers::*;
use jobflow::core::{Outcome, TriggerContext};

const RELEASE: &str = r#"
name: "release"
jobs:
  - id: build
    steps:
      - run: "make"
  - id: publish
    needs: [build]
    if: "event == 'push' && startsWith(ref, 'refs/tags/')"
    steps:
      - run: "make publish"
  - id: announce
    needs: [publish]
    steps:
      - run: "post announcement"
  - id: report-failure
    needs: [build]
    if: "failure()"
    steps:
      - run: "notify team"
  - id: cleanup
    needs: [build]
    if: "always()"
    steps:
      - run: "rm -rf target"
  - id: gate
    gate: true
    needs: [announce, cleanup]
"#;

/// A false condition skips the job; dependents still run under `success()`
#[tokio::test]
async fn test_skipped_job_does_not_block_dependents() {
    let stub = StubExecutor::new();
    let report = run_yaml(RELEASE, TriggerContext::push("main"), stub.clone()).await;

    assert_skipped(&report, "publish", "condition evaluated to false");
    assert_eq!(stub.runs_of("publish"), 0);
    assert_outcome(&report, "announce", Outcome::Success);
    assert_skipped(&report, "report-failure", "condition evaluated to false");
    assert_outcome(&report, "cleanup", Outcome::Success);
    assert_gate_passed(&report);
}

#[tokio::test]
async fn test_tag_push_runs_publish() {
    let stub = StubExecutor::new();
    let trigger = TriggerContext::new("push", "refs/tags/v2.1.0");
    let report = run_yaml(RELEASE, trigger, stub.clone()).await;

    assert_outcome(&report, "publish", Outcome::Success);
    assert_eq!(stub.runs_of("publish"), 1);
    assert_gate_passed(&report);
}

/// A tag pushed from a pull request event does not publish
#[tokio::test]
async fn test_event_must_match_too() {
    let trigger = TriggerContext::new("pull_request", "refs/tags/v2.1.0");
    let report = run_yaml(RELEASE, trigger, StubExecutor::new()).await;
    assert_skipped(&report, "publish", "condition evaluated to false");
}

/// Failure handlers run, regular dependents are skipped
#[tokio::test]
async fn test_failure_runs_handlers_and_always_jobs() {
    let stub = StubExecutor::failing(&["build"]);
    let report = run_yaml(RELEASE, TriggerContext::new("push", "refs/tags/v1"), stub.clone()).await;

    assert_outcome(&report, "build", Outcome::Failure);
    assert_skipped(&report, "publish", "condition evaluated to false");
    assert_outcome(&report, "report-failure", Outcome::Success);
    assert_outcome(&report, "cleanup", Outcome::Success);

    // a skipped need is not a failed need
    assert_outcome(&report, "announce", Outcome::Success);

    // build is not a gate need
    assert_outcome(&report, "gate", Outcome::Success);

    let mut ran = stub.invocations();
    ran.sort();
    assert_eq!(ran, vec!["announce", "build", "cleanup", "report-failure"]);
}

/// `all_success()` treats a skipped need as blocking
#[tokio::test]
async fn test_all_success_requires_every_need_to_run() {
    let yaml = r#"
name: "strict"
jobs:
  - id: optional
    if: "event == 'schedule'"
  - id: strict
    needs: [optional]
    if: "all_success()"
  - id: lenient
    needs: [optional]
"#;
    let report = run_yaml(yaml, TriggerContext::push("main"), StubExecutor::new()).await;

    assert_outcome(&report, "optional", Outcome::Skipped);
    assert_outcome(&report, "strict", Outcome::Skipped);
    assert_outcome(&report, "lenient", Outcome::Success);
}

/// `||` combines alternatives; trigger atoms alone imply `success()`
#[tokio::test]
async fn test_alternatives_and_implicit_success() {
    let yaml = r#"
name: "alternatives"
jobs:
  - id: build
  - id: deploy
    needs: [build]
    if: "ref == 'refs/heads/main' || ref == 'refs/heads/release'"
"#;
    let report = run_yaml(yaml, TriggerContext::push("release"), StubExecutor::new()).await;
    assert_outcome(&report, "deploy", Outcome::Success);

    let report = run_yaml(yaml, TriggerContext::push("feature"), StubExecutor::new()).await;
    assert_outcome(&report, "deploy", Outcome::Skipped);

    let report = run_yaml(yaml, TriggerContext::push("main"), StubExecutor::failing(&["build"])).await;
    assert_outcome(&report, "deploy", Outcome::Skipped);
}
