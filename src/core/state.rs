//! Execution state models

use serde::{Deserialize, Serialize};
use std::fmt;

/// State of a single step
///
/// Steps move strictly forward: `Idle -> Pending -> Running -> {Success, Failed}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StepStatus {
    /// Step has not been selected yet
    Idle,
    /// Step was claimed by the scheduler and is waiting for admission
    Pending,
    /// Step's command is currently executing
    Running,
    /// Command exited with status 0 inside its deadline
    Success,
    /// Command could not start, exited non-zero, timed out, or could not be waited on
    Failed,
}

impl StepStatus {
    /// Check if step is in a terminal state
    pub fn is_terminal(&self) -> bool {
        matches!(self, StepStatus::Success | StepStatus::Failed)
    }

    /// Position of the status in the lifecycle, used to enforce monotonic transitions
    pub(crate) fn rank(&self) -> u8 {
        match self {
            StepStatus::Idle => 0,
            StepStatus::Pending => 1,
            StepStatus::Running => 2,
            StepStatus::Success | StepStatus::Failed => 3,
        }
    }
}

impl fmt::Display for StepStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            StepStatus::Idle => "idle",
            StepStatus::Pending => "pending",
            StepStatus::Running => "running",
            StepStatus::Success => "success",
            StepStatus::Failed => "failed",
        };
        f.write_str(label)
    }
}

/// Final (or in-flight) view of a workflow run
///
/// `Run` only returns hard errors, so a non-zero exit leaves no trace in its
/// return value. Callers that need a single verdict read it from here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    /// Step names paired with their status, in declaration order
    pub steps: Vec<(String, StepStatus)>,
}

impl RunReport {
    pub fn new(steps: Vec<(String, StepStatus)>) -> Self {
        Self { steps }
    }

    /// Status of a step by name
    pub fn status(&self, name: &str) -> Option<StepStatus> {
        self.steps
            .iter()
            .find(|(step, _)| step == name)
            .map(|(_, status)| *status)
    }

    /// Number of steps currently in `status`
    pub fn count(&self, status: StepStatus) -> usize {
        self.steps.iter().filter(|(_, s)| *s == status).count()
    }

    pub fn total(&self) -> usize {
        self.steps.len()
    }

    /// True only if every step reached `Success`
    pub fn succeeded(&self) -> bool {
        self.steps.iter().all(|(_, s)| *s == StepStatus::Success)
    }

    /// Names of the steps that failed
    pub fn failed_steps(&self) -> Vec<&str> {
        self.steps
            .iter()
            .filter(|(_, s)| *s == StepStatus::Failed)
            .map(|(name, _)| name.as_str())
            .collect()
    }

    /// Calculate progress percentage (0.0 to 1.0)
    pub fn progress(&self) -> f64 {
        if self.steps.is_empty() {
            return 0.0;
        }
        let finished = self.steps.iter().filter(|(_, s)| s.is_terminal()).count();
        finished as f64 / self.steps.len() as f64
    }
}
