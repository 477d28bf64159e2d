//! Core domain models for workflows
//!
//! This module defines the fundamental data structures that represent
//! workflows, steps, and their configuration.

pub mod config;
pub mod state;
pub mod step;
pub mod workflow;

pub use config::{ConfigError, RunConfig, Violation, WorkflowConfig, SUPPORTED_VERSION};
pub use state::*;
pub use step::*;
pub use workflow::*;
