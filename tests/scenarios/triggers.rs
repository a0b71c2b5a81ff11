//! Test: Trigger filters and event handlers on the library entry point

use crate::helpers::*;
use jobflow::core::config::PipelineConfig;
use jobflow::core::{Outcome, TriggerContext};
use jobflow::execution::{
    run_pipeline_with_handlers, EngineOptions, EventHandler, ExecutionEvent, PipelineError,
};
use std::sync::{Arc, Mutex};

const RELEASE: &str = r#"
name: "release"
on:
  - event: push
    refs: ["refs/tags/*"]
jobs:
  - id: build
    steps:
      - run: "cargo build --release"
  - id: publish
    needs: [build]
    steps:
      - run: "cargo publish"
  - id: gate
    gate: true
    needs: [publish]
"#;

#[tokio::test]
async fn test_untriggered_definition_runs_nothing() {
    let stub = StubExecutor::new();
    let result = run_yaml_with(
        RELEASE,
        TriggerContext::push("main"),
        stub.clone(),
        EngineOptions::default(),
    )
    .await;

    match result {
        Err(error @ PipelineError::NotTriggered { .. }) => {
            assert_eq!(error.exit_code(), 0);
            assert_eq!(
                error.to_string(),
                "pipeline 'release' does not run for push refs/heads/main"
            );
        }
        other => panic!("expected the run to be filtered out, got {:?}", other.map(|r| r.outcomes())),
    }
    assert!(stub.invocations().is_empty());
}

#[tokio::test]
async fn test_matching_trigger_runs() {
    let stub = StubExecutor::new();
    let report = run_yaml(RELEASE, TriggerContext::new("push", "refs/tags/v2.0.0"), stub.clone()).await;

    assert_gate_passed(&report);
    assert_eq!(stub.invocations(), vec!["build", "publish"]);
}

#[tokio::test]
async fn test_handlers_see_every_instance() {
    let config = PipelineConfig::from_yaml(RELEASE).unwrap();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    let handler: EventHandler = Arc::new(move |event: ExecutionEvent| {
        let line = match event {
            ExecutionEvent::PipelineStarted { instances, .. } => format!("start {}", instances),
            ExecutionEvent::JobStarted { instance } => format!("run {}", instance),
            ExecutionEvent::JobFinished { instance, result, .. } => {
                format!("done {} {}", instance, result.raw)
            }
            ExecutionEvent::JobSkipped { instance, .. } => format!("skip {}", instance),
            ExecutionEvent::PipelineCompleted { gate_passed, .. } => format!("gate {}", gate_passed),
        };
        sink.lock().unwrap().push(line);
    });

    let stub = StubExecutor::failing(&["publish"]);
    let report = run_pipeline_with_handlers(
        &config,
        TriggerContext::new("push", "refs/tags/v2.0.0"),
        stub,
        EngineOptions::default(),
        vec![handler],
    )
    .await
    .unwrap();

    assert_outcome(&report, "publish", Outcome::Failure);
    let seen = seen.lock().unwrap();
    assert_eq!(seen.first().map(String::as_str), Some("start 3"));
    assert_eq!(seen.last().map(String::as_str), Some("gate false"));
    assert!(seen.contains(&"done publish failure".to_string()), "{:?}", seen);
}
