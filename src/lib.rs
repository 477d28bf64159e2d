//! procflow - run workflows of external commands with dependency ordering
//! and bounded concurrency

pub mod cli;
pub mod core;
pub mod execution;

// Re-export commonly used types
pub use crate::core::{RunConfig, RunReport, Step, StepStatus, Workflow, WorkflowConfig};
pub use execution::{EngineError, Event, EventKind, ExecutionEngine, Notifier, ProcessRunner, Sink};
