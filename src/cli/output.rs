//! CLI output formatting

use crate::core::{RunReport, StepStatus, Violation};
use crate::execution::{Event, EventKind};
use console::Emoji;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

// Re-export style
pub use console::style;

// Emojis for output
pub static CHECK: Emoji<'_, '_> = Emoji("✅ ", "✓ ");
pub static CROSS: Emoji<'_, '_> = Emoji("❌ ", "✗ ");
pub static SPINNER: Emoji<'_, '_> = Emoji("⏳ ", "~ ");
pub static INFO: Emoji<'_, '_> = Emoji("ℹ️  ", "i ");
pub static WARN: Emoji<'_, '_> = Emoji("⚠️  ", "!");
pub static ROCKET: Emoji<'_, '_> = Emoji("🚀 ", "> ");

/// Create a progress bar
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

/// Format a step status for display
pub fn format_step_status(status: StepStatus) -> String {
    match status {
        StepStatus::Idle => style("IDLE").dim().to_string(),
        StepStatus::Pending => style("PENDING").dim().to_string(),
        StepStatus::Running => style("RUNNING").yellow().to_string(),
        StepStatus::Success => style("SUCCESS").green().to_string(),
        StepStatus::Failed => style("FAILED").red().to_string(),
    }
}

/// Format a lifecycle event for display
pub fn format_event(event: &Event) -> String {
    let step = &event.step;
    match event.kind {
        EventKind::RunRequested => format!("{} {} requested", SPINNER, style(step).dim()),
        EventKind::RunStarted => format!("{} {}", ROCKET, style(step).cyan()),
        EventKind::RunSuccess => format!("{} {}", CHECK, style(step).green()),
        EventKind::RunFail { exit_status } => format!(
            "{} {}: {}",
            CROSS,
            style(step).red(),
            style(format!("exited with status {}", exit_status)).dim()
        ),
        EventKind::RunError => format!(
            "{} {}: {}",
            CROSS,
            style(step).red(),
            style("could not be started").dim()
        ),
        EventKind::RunWaitError => format!(
            "{} {}: {}",
            CROSS,
            style(step).red(),
            style("lost track of the process").dim()
        ),
        EventKind::RunTimeout => format!(
            "{} {}: {}",
            WARN,
            style(step).yellow(),
            style("timed out").dim()
        ),
    }
}

/// Format a run report as one line per step
pub fn format_report(report: &RunReport) -> String {
    let width = report
        .steps
        .iter()
        .map(|(name, _)| name.len())
        .max()
        .unwrap_or(0);

    report
        .steps
        .iter()
        .map(|(name, status)| {
            format!(
                "  {:width$}  {}",
                name,
                format_step_status(*status),
                width = width
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Format a validation violation for display
pub fn format_violation(violation: &Violation) -> String {
    format!("  {} {}", CROSS, style(violation).red())
}
