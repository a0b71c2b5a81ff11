//! Test: Invalid graphs are rejected before any job runs

use crate::helpers::*;
use jobflow::core::{GraphError, TriggerContext};
use jobflow::core::config::PipelineConfig;
use jobflow::execution::{EngineOptions, PipelineError};

async fn expect_graph_error(yaml: &str) -> (GraphError, StubExecutor) {
    let stub = StubExecutor::new();
    let result = run_yaml_with(
        yaml,
        TriggerContext::push("main"),
        stub.clone(),
        EngineOptions::default(),
    )
    .await;

    match result {
        Err(PipelineError::Graph(e)) => (e, stub),
        other => panic!("expected a graph error, got {:?}", other.map(|r| r.outcomes())),
    }
}

#[tokio::test]
async fn test_cycle_runs_nothing() {
    let yaml = r#"
name: "cyclic"
jobs:
  - id: setup
  - id: a
    needs: [setup, c]
  - id: b
    needs: [a]
  - id: c
    needs: [b]
"#;
    let (error, stub) = expect_graph_error(yaml).await;

    match &error {
        GraphError::Cycle { path } => {
            assert_eq!(path.first(), path.last());
            for id in ["a", "b", "c"] {
                assert!(path.iter().any(|p| p == id), "{} missing from {:?}", id, path);
            }
            assert!(!path.iter().any(|p| p == "setup"));
        }
        other => panic!("expected a cycle, got {:?}", other),
    }
    assert!(stub.invocations().is_empty());
}

#[tokio::test]
async fn test_unknown_dependency() {
    let yaml = r#"
name: "dangling"
jobs:
  - id: deploy
    needs: [build]
"#;
    let (error, stub) = expect_graph_error(yaml).await;
    assert_eq!(
        error,
        GraphError::UnknownDependency {
            job: "deploy".to_string(),
            dependency: "build".to_string(),
        }
    );
    assert!(stub.invocations().is_empty());
}

#[tokio::test]
async fn test_duplicate_job_id() {
    let yaml = r#"
name: "dup"
jobs:
  - id: build
  - id: build
"#;
    let (error, _) = expect_graph_error(yaml).await;
    assert_eq!(error, GraphError::DuplicateId("build".to_string()));
}

#[tokio::test]
async fn test_empty_matrix_axis() {
    let yaml = r#"
name: "empty-axis"
jobs:
  - id: test
    matrix:
      os: []
"#;
    let (error, _) = expect_graph_error(yaml).await;
    assert!(matches!(error, GraphError::EmptyMatrixAxis { ref job, ref axis } if job == "test" && axis == "os"));
}

#[tokio::test]
async fn test_unparseable_condition() {
    let yaml = r#"
name: "bad-if"
jobs:
  - id: deploy
    if: "github.event_name == 'push'"
"#;
    let (error, _) = expect_graph_error(yaml).await;
    assert!(matches!(error, GraphError::InvalidCondition { ref job, .. } if job == "deploy"));
}

#[test]
fn test_validation_reports_cycles_on_load() {
    let yaml = r#"
name: "self"
jobs:
  - id: loop
    needs: [loop]
"#;
    let error = PipelineConfig::from_yaml(yaml).unwrap_err();
    assert!(error.to_string().contains("cycle"), "{}", error);
}

#[test]
fn test_gate_with_steps_is_rejected() {
    let yaml = r#"
name: "busy-gate"
jobs:
  - id: build
  - id: gate
    gate: true
    needs: [build]
    steps:
      - run: "echo hi"
"#;
    let error = PipelineConfig::from_yaml(yaml).unwrap_err();
    assert!(error.to_string().contains("must not declare steps"));
}

#[test]
fn test_two_gates_are_rejected() {
    let yaml = r#"
name: "gates"
jobs:
  - id: first
    gate: true
  - id: second
    gate: true
"#;
    let error = PipelineConfig::from_yaml(yaml).unwrap_err();
    let graph_error = error.downcast_ref::<GraphError>().unwrap();
    assert!(matches!(graph_error, GraphError::MultipleGates { .. }));
}

/// Every instance of a matrixed producer would write the same key
#[tokio::test]
async fn test_matrixed_producer_is_rejected() {
    let yaml = r#"
name: "fan-out-build"
jobs:
  - id: build
    matrix:
      os: [linux, macos]
    produces: [dist]
  - id: gate
    gate: true
    needs: [build]
"#;
    assert!(PipelineConfig::from_yaml(yaml).is_err());

    let (error, stub) = expect_graph_error(yaml).await;
    assert_eq!(
        error,
        GraphError::MatrixProducer {
            job: "build".to_string(),
            key: "dist".to_string(),
            instances: 2,
        }
    );
    assert!(stub.invocations().is_empty());
}

#[tokio::test]
async fn test_artifact_key_with_path_separator_is_rejected() {
    let yaml = r#"
name: "escape"
jobs:
  - id: build
    produces: ["../outside"]
"#;
    let (error, stub) = expect_graph_error(yaml).await;
    assert_eq!(
        error,
        GraphError::InvalidArtifactKey {
            job: "build".to_string(),
            key: "../outside".to_string(),
        }
    );
    assert!(stub.invocations().is_empty());
}
