//! Gate evaluation - aggregates raw outcomes into one verdict

use crate::core::{InstanceId, Outcome, PipelineRun};

/// Verdict of the gate over its required instances
///
/// Looks at *raw* outcomes, so a `continue_on_error` job that failed still
/// fails the gate even though it never blocked its dependents.
pub fn evaluate(required: &[(InstanceId, Outcome)]) -> (Outcome, Option<String>) {
    let failed: Vec<String> = required
        .iter()
        .filter(|(_, raw)| *raw == Outcome::Failure)
        .map(|(id, _)| id.to_string())
        .collect();

    if failed.is_empty() {
        (Outcome::Success, None)
    } else {
        (
            Outcome::Failure,
            Some(format!("required jobs failed: {}", failed.join(", "))),
        )
    }
}

/// Raw outcomes of every need of the instance at `index`
pub fn required_outcomes(run: &PipelineRun, index: usize) -> Vec<(InstanceId, Outcome)> {
    let graph = run.graph();
    graph
        .needs_of(index)
        .iter()
        .filter_map(|&dep| {
            run.state(dep)
                .result()
                .map(|r| (graph.instance(dep).id.clone(), r.raw))
        })
        .collect()
}

/// Final pipeline verdict
///
/// With a declared gate this is the gate's raw outcome. Without one, every
/// instance counts as required.
pub fn gate_passed(run: &PipelineRun) -> bool {
    let graph = run.graph();
    let gate = graph
        .instances()
        .iter()
        .position(|instance| instance.template.gate);

    match gate {
        Some(index) => matches!(
            run.state(index).result(),
            Some(result) if result.raw == Outcome::Success
        ),
        None => {
            let all: Vec<(InstanceId, Outcome)> = graph
                .instances()
                .iter()
                .enumerate()
                .map(|(i, instance)| {
                    let raw = run
                        .state(i)
                        .result()
                        .map(|r| r.raw)
                        .unwrap_or(Outcome::Failure);
                    (instance.id.clone(), raw)
                })
                .collect();
            evaluate(&all).0 == Outcome::Success
        }
    }
}
