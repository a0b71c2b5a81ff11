use anyhow::{Context, Result};
use jobflow::cli::commands::{HistoryCommand, ListCommand, RunCommand, ValidateCommand};
use jobflow::cli::output::*;
use jobflow::cli::{Cli, Command};
use jobflow::core::config::PipelineConfig;
use jobflow::execution::{
    run_pipeline_with_handlers, EngineOptions, EventHandler, ExecutionEvent, PipelineError,
};
use jobflow::persistence::{
    ExecutionSummary, InMemoryPersistence, PersistenceBackend, SqliteExecutionStore,
};
use jobflow::runner::ShellExecutor;
use std::sync::Arc;
use tracing::{debug, error, Level};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::from_args();

    // Initialize logging
    let log_level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set logging subscriber")?;

    let code = match &cli.command {
        Command::Run(cmd) => run_pipeline(cmd).await?,
        Command::Validate(cmd) => validate_pipeline(cmd)?,
        Command::List(cmd) => list_pipelines(cmd).await?,
        Command::History(cmd) => show_history(cmd).await?,
    };

    if code != 0 {
        std::process::exit(code);
    }
    Ok(())
}

async fn run_pipeline(cmd: &RunCommand) -> Result<i32> {
    let config = PipelineConfig::from_file(&cmd.file)
        .with_context(|| format!("Failed to load pipeline definition {}", cmd.file))?;

    let store: Arc<dyn PersistenceBackend> = if cmd.no_history {
        Arc::new(InMemoryPersistence::new())
    } else {
        Arc::new(SqliteExecutionStore::with_default_path().await?)
    };

    let mut handlers: Vec<EventHandler> = Vec::new();
    if !cmd.json {
        let progress = create_progress_bar(0);
        handlers.push(Arc::new(move |event: ExecutionEvent| {
            match &event {
                ExecutionEvent::PipelineStarted { instances, .. } => {
                    progress.set_length(*instances as u64)
                }
                ExecutionEvent::JobFinished { .. } | ExecutionEvent::JobSkipped { .. } => {
                    progress.inc(1)
                }
                ExecutionEvent::PipelineCompleted { .. } => progress.finish_and_clear(),
                _ => {}
            }
            progress.println(format_execution_event(&event));
        }));
    }

    let executor = ShellExecutor::default();
    debug!("Running steps with {:?}", executor.config());
    let options = EngineOptions {
        strategy: cmd.scheduling_strategy(),
        fail_fast: cmd.fail_fast,
    };

    let report =
        match run_pipeline_with_handlers(&config, cmd.trigger(), executor, options, handlers).await
        {
            Ok(report) => report,
            Err(e @ PipelineError::NotTriggered { .. }) => {
                println!("{} {}", INFO, e);
                return Ok(e.exit_code());
            }
            Err(e) => {
                error!("{}", e);
                println!("{} {} {}", CROSS, style(&config.name).bold(), style(&e).red());
                return Ok(e.exit_code());
            }
        };

    if cmd.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("\n{}", format_report(&report));
    }

    if !cmd.no_history {
        let summary = ExecutionSummary::from_report(&report);
        store.save_execution(&summary).await?;
        if !cmd.json {
            println!(
                "{} Run saved to history (ID: {})",
                INFO,
                style(&summary.execution_id.to_string()[..8]).dim()
            );
        }
    }

    Ok(report.exit_code())
}

fn validate_pipeline(cmd: &ValidateCommand) -> Result<i32> {
    println!("{} Validating pipeline...", INFO);

    match PipelineConfig::from_file(&cmd.file) {
        Ok(config) => {
            println!("{} Pipeline definition is valid!", CHECK);
            println!("  Name: {}", style(&config.name).bold());
            println!("  Jobs: {}", style(config.jobs.len()).cyan());
            println!("  Instances: {}", style(config.instance_count()).cyan());
            if let Some(gate) = config.jobs.iter().find(|job| job.gate) {
                println!("  Gate: {}", style(&gate.id).cyan());
            }

            if cmd.json {
                let json = serde_json::to_string_pretty(&config)?;
                println!("\n{}", json);
            }
            Ok(0)
        }
        Err(e) => {
            println!("{} Validation failed:", CROSS);
            println!("  {}", style(format!("{:#}", e)).red());
            Ok(1)
        }
    }
}

async fn list_pipelines(cmd: &ListCommand) -> Result<i32> {
    let store = SqliteExecutionStore::with_default_path().await?;
    let pipelines = store.list_pipelines().await?;

    if pipelines.is_empty() {
        println!("{} No pipelines found in history", INFO);
        return Ok(0);
    }

    if cmd.json {
        let mut json_data = Vec::new();
        for pipeline in &pipelines {
            let executions = store.list_executions(pipeline).await?;
            json_data.push(serde_json::json!({
                "name": pipeline,
                "execution_count": executions.len(),
            }));
        }
        let data = serde_json::json!({ "pipelines": json_data });
        println!("{}", serde_json::to_string_pretty(&data)?);
        return Ok(0);
    }

    println!("{} Pipelines in history:", INFO);
    for pipeline_name in &pipelines {
        if cmd.with_counts {
            let executions = store.list_executions(pipeline_name).await?;
            let passed = executions.iter().filter(|e| e.gate_passed).count();
            println!(
                "  {} ({} runs: {} passed, {} failed)",
                style(pipeline_name).bold(),
                style(executions.len()).cyan(),
                style(passed).green(),
                style(executions.len() - passed).red()
            );
        } else {
            println!("  {}", style(pipeline_name).bold());
        }
    }

    Ok(0)
}

async fn show_history(cmd: &HistoryCommand) -> Result<i32> {
    let store = SqliteExecutionStore::with_default_path().await?;

    if let Some(exec_id_str) = &cmd.execution_id {
        let exec_id =
            uuid::Uuid::parse_str(exec_id_str).context("Invalid execution ID format")?;

        match store.load_execution(exec_id).await? {
            Some(summary) => print_execution_details(&summary, cmd.details)?,
            None => println!("{} Run not found", WARN),
        }
        return Ok(0);
    }

    let mut executions = match &cmd.pipeline {
        Some(pipeline_name) => store.list_executions(pipeline_name).await?,
        None => {
            let mut all_execs = Vec::new();
            for pipeline in store.list_pipelines().await? {
                all_execs.extend(store.list_executions(&pipeline).await?);
            }
            all_execs.sort_by(|a, b| b.started_at.cmp(&a.started_at));
            all_execs
        }
    };
    executions.truncate(cmd.limit);

    if executions.is_empty() {
        println!("{} No runs found", INFO);
        return Ok(0);
    }

    if cmd.json {
        let data = serde_json::json!({ "executions": executions });
        println!("{}", serde_json::to_string_pretty(&data)?);
    } else {
        println!("{} Run history (showing latest {}):", INFO, cmd.limit);
        for summary in &executions {
            println!("  {}", format_execution_summary(summary));
        }
    }

    Ok(0)
}

fn print_execution_details(summary: &ExecutionSummary, details: bool) -> Result<()> {
    println!("{} Run Details", INFO);
    println!("  ID: {}", style(summary.execution_id).cyan());
    println!("  Pipeline: {}", style(&summary.pipeline_name).bold());
    println!("  Trigger: {}", style(&summary.trigger).cyan());
    println!("  Status: {}", format_status(summary.status));
    println!("  Started: {}", style(summary.started_at.to_rfc3339()).dim());
    if let Some(completed) = summary.completed_at {
        println!("  Completed: {}", style(completed.to_rfc3339()).dim());
        if let Ok(duration) = completed.signed_duration_since(summary.started_at).to_std() {
            println!("  Duration: {}", style(format_duration(duration)).dim());
        }
    }
    println!(
        "  Jobs: {} ({} failed, {} skipped)",
        summary.total_jobs,
        style(summary.failed_jobs).red(),
        style(summary.skipped_jobs).dim()
    );
    let gate = if summary.gate_passed {
        style("passed").green()
    } else {
        style("failed").red()
    };
    println!("  Gate: {}", gate);

    if details {
        println!("\n  {}", style("Full details:").bold());
        let json = serde_json::to_string_pretty(summary)?;
        for line in json.lines() {
            println!("    {}", line);
        }
    }

    Ok(())
}
