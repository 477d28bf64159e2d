//! Workflow configuration from YAML

use crate::core::step::CommandLine;
use crate::core::workflow::Workflow;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::io::Read;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// The only workflow document version this crate accepts
pub const SUPPORTED_VERSION: &str = "1";

/// A single rule broken by a workflow document
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Violation {
    UnsupportedVersion { found: String },
    DuplicateStep { name: String },
    UnknownDependency { step: String, dependency: String },
    EmptyCommand { step: String },
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Violation::UnsupportedVersion { found } => write!(
                f,
                "unsupported version '{}' (expected '{}')",
                found, SUPPORTED_VERSION
            ),
            Violation::DuplicateStep { name } => write!(f, "duplicate step name '{}'", name),
            Violation::UnknownDependency { step, dependency } => write!(
                f,
                "step '{}' depends on non-existent step '{}'",
                step, dependency
            ),
            Violation::EmptyCommand { step } => write!(f, "step '{}' has an empty command", step),
        }
    }
}

/// Errors raised while loading a workflow or a run configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read workflow: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse workflow: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("invalid workflow: {}", join_violations(.0))]
    Invalid(Vec<Violation>),

    #[error("invalid run configuration: {0}")]
    Run(String),
}

fn join_violations(violations: &[Violation]) -> String {
    violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Top-level workflow document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowConfig {
    /// Document version, must equal [`SUPPORTED_VERSION`]
    pub version: String,

    /// Free-form metadata, carried but never interpreted
    #[serde(default)]
    pub metadata: HashMap<String, String>,

    /// Steps in declaration order
    #[serde(default)]
    pub steps: Vec<StepConfig>,
}

/// Step configuration as defined in YAML
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepConfig {
    /// Unique step name
    pub name: String,

    /// Command line to execute
    pub command: String,

    /// Names of steps this step depends on
    #[serde(default)]
    pub depends_on: Vec<String>,
}

impl WorkflowConfig {
    /// Load workflow configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Load workflow configuration from any reader
    pub fn from_reader<R: Read>(mut reader: R) -> Result<Self, ConfigError> {
        let mut buf = Vec::new();
        reader.read_to_end(&mut buf)?;
        Self::from_slice(&buf)
    }

    /// Parse workflow configuration from raw bytes
    pub fn from_slice(bytes: &[u8]) -> Result<Self, ConfigError> {
        let config: WorkflowConfig = serde_yaml::from_slice(bytes)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse workflow configuration from YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let config: WorkflowConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Check every rule and report all violations at once
    pub fn validate(&self) -> Result<(), ConfigError> {
        let violations = self.violations();
        if violations.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Invalid(violations))
        }
    }

    /// Every rule this document breaks, in document order
    pub fn violations(&self) -> Vec<Violation> {
        let mut violations = Vec::new();

        if self.version != SUPPORTED_VERSION {
            violations.push(Violation::UnsupportedVersion {
                found: self.version.clone(),
            });
        }

        let mut seen = HashSet::new();
        for step in &self.steps {
            if !seen.insert(step.name.as_str()) {
                violations.push(Violation::DuplicateStep {
                    name: step.name.clone(),
                });
            }
        }

        for step in &self.steps {
            if CommandLine::parse(&step.command).is_none() {
                violations.push(Violation::EmptyCommand {
                    step: step.name.clone(),
                });
            }
            for dep in &step.depends_on {
                if !seen.contains(dep.as_str()) {
                    violations.push(Violation::UnknownDependency {
                        step: step.name.clone(),
                        dependency: dep.clone(),
                    });
                }
            }
        }

        violations
    }

    /// Build the runtime workflow
    pub fn to_workflow(&self) -> Result<Workflow, ConfigError> {
        Workflow::from_config(self)
    }
}

/// Settings supplied by the caller for a single run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunConfig {
    /// Maximum number of steps executing at once
    pub concurrency: usize,

    /// Deadline applied to each step's launch and wait
    pub step_timeout: Duration,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            concurrency: 4,
            step_timeout: Duration::from_secs(300), // 5 minutes
        }
    }
}

impl RunConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    pub fn with_step_timeout(mut self, step_timeout: Duration) -> Self {
        self.step_timeout = step_timeout;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.concurrency == 0 {
            return Err(ConfigError::Run("concurrency must be at least 1".to_string()));
        }
        if self.step_timeout.is_zero() {
            return Err(ConfigError::Run("step timeout must be greater than zero".to_string()));
        }
        Ok(())
    }
}
