//! CLI command definitions

use crate::core::RunConfig;
use clap::Args;
use std::time::Duration;

/// Run a workflow
#[derive(Debug, Args, Clone)]
pub struct RunCommand {
    /// Path to workflow YAML file
    #[arg(short, long)]
    pub file: String,

    /// Maximum number of steps executing at once
    #[arg(short = 'j', long, default_value_t = 4, value_parser = clap::value_parser!(u16).range(1..))]
    pub concurrency: u16,

    /// Deadline for each step, in seconds
    #[arg(long, default_value_t = 300, value_parser = clap::value_parser!(u64).range(1..))]
    pub timeout_secs: u64,

    /// Discard step output and show a progress bar instead
    #[arg(short, long)]
    pub quiet: bool,
}

impl RunCommand {
    pub fn run_config(&self) -> RunConfig {
        RunConfig::new()
            .with_concurrency(usize::from(self.concurrency))
            .with_step_timeout(Duration::from_secs(self.timeout_secs))
    }
}

/// Validate a workflow definition
#[derive(Debug, Args, Clone)]
pub struct ValidateCommand {
    /// Path to workflow YAML file
    #[arg(short, long)]
    pub file: String,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}
