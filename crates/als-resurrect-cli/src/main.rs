mod commands;
mod logging;
mod progress;

use std::path::Path;
use std::process;
use std::sync::Arc;

use als_resurrect_core::batch::{read_project_list, run_project};
use als_resurrect_core::config::load_configuration;
use als_resurrect_core::{AppConfig, BatchRunner, BatchSummary, ProjectStatus, ResolveEngine};
use anyhow::Context;
use clap::{CommandFactory, Parser};
use colored::*;
use commands::{Cli, Commands, OutputArgs};
use dotenv::dotenv;
use progress::CliReporter;
use tracing::{error, info};

fn main() -> anyhow::Result<()> {
    dotenv().ok();

    let _guard = logging::init_logger();

    let mut config = match load_configuration() {
        Ok(config) => config,
        Err(err) => {
            error!("Error loading configuration: {}", err);
            process::exit(1);
        }
    };

    let args = Cli::parse();

    let all_succeeded = match args.command {
        Some(Commands::Repair { project, output }) => {
            apply_output_args(&mut config, &output);
            run_repair(&config, &project)?
        }
        Some(Commands::Batch {
            list,
            output,
            workers,
        }) => {
            apply_output_args(&mut config, &output);
            if let Some(workers) = workers {
                config.workers = workers;
            }
            run_batch(&config, &list)?
        }
        Some(Commands::PrintConfig) => {
            println!("Configuration: {:?}", config);
            true
        }
        None => {
            let _ = Cli::command().print_long_help();
            true
        }
    };

    if !all_succeeded {
        process::exit(1);
    }
    Ok(())
}

fn apply_output_args(config: &mut AppConfig, output: &OutputArgs) {
    if output.symlink {
        config.symlink = true;
    }
    if output.keep_original {
        config.in_place = false;
    }
}

fn run_repair(config: &AppConfig, project: &Path) -> anyhow::Result<bool> {
    let engine = ResolveEngine::from_config(config).context("Could not set up the repair engine")?;

    match run_project(&engine, project) {
        ProjectStatus::Repaired(report) => {
            info!(
                "{} recovered, {} still missing, {} already resolved in {}",
                format!("{}", report.stats.recovered).green(),
                format!("{}", report.stats.unresolved).red(),
                format!("{}", report.stats.resolved).cyan(),
                format!("{:.2}s", report.duration.as_secs_f64()).green(),
            );
            info!("Wrote {}", report.output.display());
            if let Some(artifact) = &report.debug_artifact {
                info!("Wrote {}", artifact.display());
            }
            Ok(true)
        }
        ProjectStatus::Failed(_) => Ok(false),
    }
}

fn run_batch(config: &AppConfig, list: &Path) -> anyhow::Result<bool> {
    let projects = read_project_list(list)
        .with_context(|| format!("Could not read project list {}", list.display()))?;
    let engine = ResolveEngine::from_config(config).context("Could not set up the repair engine")?;

    let runner = BatchRunner::new(Arc::new(engine), config.workers);
    let reporter = CliReporter::new();
    let summary = runner.run(&projects, &reporter)?;

    print_summary(&summary);
    Ok(summary.failed() == 0)
}

fn print_summary(summary: &BatchSummary) {
    println!();
    info!(
        "{} repaired, {} failed, {} samples recovered in {}",
        format!("{}", summary.succeeded()).green(),
        format!("{}", summary.failed()).red(),
        format!("{}", summary.recovered_samples()).cyan(),
        format!("{:.2}s", summary.duration.as_secs_f64()).green(),
    );
    for outcome in &summary.outcomes {
        if let ProjectStatus::Failed(err) = &outcome.status {
            println!("  {} {}", err.kind.tag().red(), outcome.project.display());
        }
    }
}
