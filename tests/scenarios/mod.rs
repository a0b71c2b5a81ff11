//! Scenario-based tests for jobflow

mod conditions;
mod continue_on_error;
mod fan_in;
mod graph_errors;
mod matrix;
mod triggers;
