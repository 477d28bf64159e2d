//! Step domain model

use crate::core::state::StepStatus;
use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Index of a step inside its workflow
pub type StepId = usize;

/// Raised when a step is asked to move backwards or skip a state
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("step '{step}' cannot move from {from} to {to}")]
pub struct InvalidTransition {
    pub step: String,
    pub from: StepStatus,
    pub to: StepStatus,
}

/// A command split into its executable and positional arguments
///
/// The first whitespace-delimited token is the program. No shell expansion,
/// quoting, or environment substitution is applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommandLine {
    program: String,
    args: Vec<String>,
}

impl CommandLine {
    /// Split a raw command string, returning `None` when it has no tokens
    pub fn parse(raw: &str) -> Option<Self> {
        let mut tokens = raw.split_whitespace().map(str::to_string);
        let program = tokens.next()?;
        Some(Self {
            program,
            args: tokens.collect(),
        })
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }
}

impl fmt::Display for CommandLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.program)?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

/// A single step in a workflow
#[derive(Debug, Clone)]
pub struct Step {
    /// Unique step name
    pub name: String,

    /// Command executed for this step
    pub command: CommandLine,

    /// Indexes of the sibling steps this step depends on
    pub dependencies: Vec<StepId>,

    /// Runtime state
    status: StepStatus,
}

impl Step {
    pub fn new(name: impl Into<String>, command: CommandLine, dependencies: Vec<StepId>) -> Self {
        Self {
            name: name.into(),
            command,
            dependencies,
            status: StepStatus::Idle,
        }
    }

    pub fn status(&self) -> StepStatus {
        self.status
    }

    /// Step has reached `Success` or `Failed`
    pub fn is_done(&self) -> bool {
        self.status.is_terminal()
    }

    /// Step is `Idle` and every dependency in `siblings` has succeeded
    pub fn should_run(&self, siblings: &[Step]) -> bool {
        self.status == StepStatus::Idle
            && self.dependencies.iter().all(|&dep| {
                siblings
                    .get(dep)
                    .is_some_and(|s| s.status == StepStatus::Success)
            })
    }

    /// `Idle -> Pending`
    pub fn claim(&mut self) -> Result<(), InvalidTransition> {
        self.transition(StepStatus::Idle, StepStatus::Pending)
    }

    /// `Pending -> Running`
    pub fn start(&mut self) -> Result<(), InvalidTransition> {
        self.transition(StepStatus::Pending, StepStatus::Running)
    }

    /// `Running -> Success` or `Running -> Failed`
    pub fn finish(&mut self, success: bool) -> Result<(), InvalidTransition> {
        let to = if success {
            StepStatus::Success
        } else {
            StepStatus::Failed
        };
        self.transition(StepStatus::Running, to)
    }

    fn transition(&mut self, from: StepStatus, to: StepStatus) -> Result<(), InvalidTransition> {
        if self.status != from || to.rank() <= from.rank() {
            return Err(InvalidTransition {
                step: self.name.clone(),
                from: self.status,
                to,
            });
        }
        self.status = to;
        Ok(())
    }
}
