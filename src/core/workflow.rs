//! Workflow domain model

use crate::core::config::{ConfigError, Violation, WorkflowConfig};
use crate::core::state::{RunReport, StepStatus};
use crate::core::step::{CommandLine, Step, StepId};
use std::collections::HashMap;
use std::io::Read;
use std::path::Path;

/// A loaded workflow: an arena of steps with index-based dependencies
#[derive(Debug, Clone)]
pub struct Workflow {
    /// Document version
    pub version: String,

    /// Opaque metadata from the document
    pub metadata: HashMap<String, String>,

    /// Steps in declaration order
    steps: Vec<Step>,
}

impl Workflow {
    /// Create a workflow from a validated configuration
    pub fn from_config(config: &WorkflowConfig) -> Result<Self, ConfigError> {
        config.validate()?;

        let index: HashMap<&str, StepId> = config
            .steps
            .iter()
            .enumerate()
            .map(|(id, step)| (step.name.as_str(), id))
            .collect();

        let mut steps = Vec::with_capacity(config.steps.len());
        for step in &config.steps {
            let command = CommandLine::parse(&step.command).ok_or_else(|| {
                ConfigError::Invalid(vec![Violation::EmptyCommand {
                    step: step.name.clone(),
                }])
            })?;
            let dependencies = step
                .depends_on
                .iter()
                .map(|dep| {
                    index.get(dep.as_str()).copied().ok_or_else(|| {
                        ConfigError::Invalid(vec![Violation::UnknownDependency {
                            step: step.name.clone(),
                            dependency: dep.clone(),
                        }])
                    })
                })
                .collect::<Result<Vec<_>, _>>()?;
            steps.push(Step::new(step.name.clone(), command, dependencies));
        }

        Ok(Workflow {
            version: config.version.clone(),
            metadata: config.metadata.clone(),
            steps,
        })
    }

    /// Parse and validate a workflow from YAML
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        WorkflowConfig::from_yaml(yaml)?.to_workflow()
    }

    /// Parse and validate a workflow from raw bytes
    pub fn from_slice(bytes: &[u8]) -> Result<Self, ConfigError> {
        WorkflowConfig::from_slice(bytes)?.to_workflow()
    }

    /// Parse and validate a workflow from a reader
    pub fn from_reader<R: Read>(reader: R) -> Result<Self, ConfigError> {
        WorkflowConfig::from_reader(reader)?.to_workflow()
    }

    /// Parse and validate a workflow file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        WorkflowConfig::from_file(path)?.to_workflow()
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub(crate) fn steps_mut(&mut self) -> &mut [Step] {
        &mut self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Get a step by name
    pub fn step(&self, name: &str) -> Option<&Step> {
        self.steps.iter().find(|s| s.name == name)
    }

    /// Names of the direct dependencies of a step
    pub fn dependency_names(&self, name: &str) -> Option<Vec<&str>> {
        self.step(name).map(|step| {
            step.dependencies
                .iter()
                .filter_map(|&dep| self.steps.get(dep))
                .map(|dep| dep.name.as_str())
                .collect()
        })
    }

    pub fn status(&self, name: &str) -> Option<StepStatus> {
        self.step(name).map(Step::status)
    }

    /// Snapshot of every step's status
    pub fn report(&self) -> RunReport {
        RunReport::new(
            self.steps
                .iter()
                .map(|s| (s.name.clone(), s.status()))
                .collect(),
        )
    }
}
