//! CLI output formatting

use crate::{
    core::{ExecutionStatus, Outcome},
    execution::{ExecutionEvent, JobReport, PipelineReport},
    persistence::ExecutionSummary,
};
use console::Emoji;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

// Re-export style
pub use console::style;

// Emojis for output
pub static CHECK: Emoji<'_, '_> = Emoji("✅ ", "✓ ");
pub static CROSS: Emoji<'_, '_> = Emoji("❌ ", "✗ ");
pub static SKIP: Emoji<'_, '_> = Emoji("⏭️  ", "- ");
pub static SPINNER: Emoji<'_, '_> = Emoji("⏳ ", "~ ");
pub static INFO: Emoji<'_, '_> = Emoji("ℹ️  ", "i ");
pub static WARN: Emoji<'_, '_> = Emoji("⚠️  ", "!");
pub static ROCKET: Emoji<'_, '_> = Emoji("🚀 ", "> ");

/// Create a progress bar over job instances
pub fn create_progress_bar(total: usize) -> ProgressBar {
    let progress = ProgressBar::new(total as u64);
    let style = ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("#>-");
    progress.set_style(style);
    progress.enable_steady_tick(Duration::from_millis(100));
    progress
}

/// Format an outcome for display
pub fn format_outcome(outcome: Outcome) -> String {
    match outcome {
        Outcome::Success => style("SUCCESS").green().to_string(),
        Outcome::Failure => style("FAILURE").red().to_string(),
        Outcome::Skipped => style("SKIPPED").dim().to_string(),
    }
}

/// Format an execution status for display
pub fn format_status(status: ExecutionStatus) -> String {
    match status {
        ExecutionStatus::Pending => style("PENDING").dim().to_string(),
        ExecutionStatus::Running => style("RUNNING").yellow().to_string(),
        ExecutionStatus::Completed => style("PASSED").green().to_string(),
        ExecutionStatus::Failed => style("FAILED").red().to_string(),
    }
}

/// Format a duration as `1h 2m 3s`, `2m 3s` or `1.2s`
pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    if secs < 60 {
        format!("{:.1}s", duration.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}

/// Format run summary for display
pub fn format_execution_summary(summary: &ExecutionSummary) -> String {
    let status_icon = match summary.status {
        ExecutionStatus::Completed => CHECK,
        ExecutionStatus::Failed => CROSS,
        ExecutionStatus::Running => SPINNER,
        ExecutionStatus::Pending => INFO,
    };

    format!(
        "{} {} - {} - {} - {} ({} jobs, {} failed, {} skipped)",
        status_icon,
        style(&summary.execution_id.to_string()[..8]).dim(),
        style(&summary.pipeline_name).bold(),
        style(&summary.trigger).cyan(),
        format_status(summary.status),
        summary.total_jobs,
        summary.failed_jobs,
        summary.skipped_jobs
    )
}

/// Format an execution event for display
pub fn format_execution_event(event: &ExecutionEvent) -> String {
    match event {
        ExecutionEvent::PipelineStarted {
            execution_id,
            pipeline_name,
            instances,
        } => format!(
            "{} Starting pipeline {} ({}, {} jobs)",
            ROCKET,
            style(pipeline_name).bold(),
            style(&execution_id.to_string()[..8]).dim(),
            instances
        ),
        ExecutionEvent::JobStarted { instance } => {
            format!("{} {}", SPINNER, style(instance).cyan())
        }
        ExecutionEvent::JobFinished {
            instance,
            result,
            duration,
            detail,
        } => match (result.raw, result.effective) {
            (Outcome::Failure, Outcome::Success) => format!(
                "{} {} failed, continuing: {}",
                WARN,
                style(instance).yellow(),
                style(detail.as_deref().unwrap_or("no details")).dim()
            ),
            (Outcome::Failure, _) => format!(
                "{} {}: {}",
                CROSS,
                style(instance).red(),
                style(detail.as_deref().unwrap_or("no details")).dim()
            ),
            _ => format!(
                "{} {} {}",
                CHECK,
                style(instance).green(),
                style(format_duration(*duration)).dim()
            ),
        },
        ExecutionEvent::JobSkipped { instance, reason } => {
            format!("{} {} ({})", SKIP, style(instance).dim(), reason)
        }
        ExecutionEvent::PipelineCompleted {
            execution_id,
            gate_passed,
            ..
        } => {
            let verdict = if *gate_passed {
                style("passed").green().to_string()
            } else {
                style("failed").red().to_string()
            };
            format!(
                "{} Pipeline ({}) gate {}",
                INFO,
                style(&execution_id.to_string()[..8]).dim(),
                verdict
            )
        }
    }
}

/// Format one row of the final job table
pub fn format_job_report(job: &JobReport) -> String {
    let mut line = format!(
        "  {:<40} {:<10} {:>8}",
        job.instance.to_string(),
        format_outcome(job.raw),
        format_duration(Duration::from_millis(job.duration_ms))
    );
    if job.raw != job.effective {
        line.push_str(&format!(" (effective {})", job.effective));
    }
    if let Some(detail) = &job.detail {
        line.push_str(&format!("  {}", style(detail).dim()));
    }
    line
}

/// Format the final report as a job table plus verdict
pub fn format_report(report: &PipelineReport) -> String {
    let mut lines = vec![format!(
        "{} {} ({} {})",
        INFO,
        style(&report.pipeline_name).bold(),
        report.trigger.event,
        report.trigger.git_ref
    )];
    lines.extend(report.jobs.values().map(format_job_report));

    let verdict = if report.gate_passed {
        format!("{} gate {}", CHECK, style("passed").green())
    } else {
        format!("{} gate {}", CROSS, style("failed").red())
    };
    lines.push(format!(
        "{} in {}",
        verdict,
        format_duration(Duration::from_millis(report.duration_ms()))
    ));
    lines.join("\n")
}
