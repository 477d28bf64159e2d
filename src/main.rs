use anyhow::{Context, Result};
use procflow::cli::commands::{RunCommand, ValidateCommand};
use procflow::cli::output::*;
use procflow::cli::{Cli, Command};
use procflow::core::{ConfigError, Workflow, WorkflowConfig};
use procflow::execution::{ChannelNotifier, ExecutionEngine, InheritSink, NullSink, Sink};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::error;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::from_args();

    // Initialize logging
    let default_filter = if cli.verbose { "procflow=debug" } else { "procflow=warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set logging subscriber")?;

    // Execute command
    let ok = match &cli.command {
        Command::Run(cmd) => run_workflow(cmd).await?,
        Command::Validate(cmd) => validate_workflow(cmd)?,
    };

    if !ok {
        std::process::exit(1);
    }
    Ok(())
}

async fn run_workflow(cmd: &RunCommand) -> Result<bool> {
    let workflow = Workflow::from_file(&cmd.file)
        .with_context(|| format!("Failed to load workflow {}", cmd.file))?;

    println!(
        "{} Loaded workflow: {} ({} steps)",
        INFO,
        style(&cmd.file).bold(),
        style(workflow.len()).cyan()
    );

    let sink: Arc<dyn Sink> = if cmd.quiet {
        Arc::new(NullSink)
    } else {
        Arc::new(InheritSink)
    };
    let (notifier, mut events) = ChannelNotifier::new();
    let total = workflow.len();

    let engine = ExecutionEngine::new(workflow, &cmd.run_config(), sink, Arc::new(notifier))
        .context("Invalid run configuration")?;

    // Ctrl-C stops admitting new steps; running ones are awaited
    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancel.cancel();
            }
        });
    }

    let progress = cmd.quiet.then(|| create_progress_bar(total));
    let printer = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            match &progress {
                Some(bar) => {
                    if event.kind.is_terminal() {
                        bar.inc(1);
                    }
                    bar.set_message(format_event(&event));
                }
                None => println!("{}", format_event(&event)),
            }
        }
        if let Some(bar) = progress {
            bar.finish_and_clear();
        }
    });

    println!();
    let result = engine.run(cancel).await;
    let report = engine.report().await;

    // Dropping the engine closes the event channel and ends the printer
    drop(engine);
    if let Err(e) = printer.await {
        error!("Event printer failed: {}", e);
    }

    println!("\n{}", format_report(&report));

    if let Err(e) = result {
        println!("\n{} {}", CROSS, style(&e).red());
        error!("{}", e);
        return Ok(false);
    }

    if report.succeeded() {
        println!(
            "\n{} {} completed {}",
            CHECK,
            style(&cmd.file).bold(),
            style("successfully").green()
        );
        Ok(true)
    } else {
        println!(
            "\n{} {} {} ({}/{} steps succeeded)",
            CROSS,
            style(&cmd.file).bold(),
            style("failed").red(),
            report.count(procflow::StepStatus::Success),
            report.total()
        );
        Ok(false)
    }
}

fn validate_workflow(cmd: &ValidateCommand) -> Result<bool> {
    println!("{} Validating workflow...", INFO);

    match WorkflowConfig::from_file(&cmd.file) {
        Ok(config) => {
            println!("{} Workflow definition is valid!", CHECK);
            println!("  Version: {}", style(&config.version).bold());
            println!("  Steps: {}", style(config.steps.len()).cyan());
            println!("  Metadata entries: {}", style(config.metadata.len()).cyan());

            if cmd.json {
                let json = serde_json::to_string_pretty(&config)?;
                println!("\n{}", json);
            }
            Ok(true)
        }
        Err(ConfigError::Invalid(violations)) => {
            println!("{} Validation failed:", CROSS);
            for violation in &violations {
                println!("{}", format_violation(violation));
            }
            Ok(false)
        }
        Err(e) => {
            println!("{} Validation failed:", CROSS);
            println!("  {}", style(e).red());
            Ok(false)
        }
    }
}
