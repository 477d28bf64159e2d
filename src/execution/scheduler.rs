//! Execution scheduler - the guarded state block that decides which step runs next

use crate::core::{CommandLine, RunReport, StepId, StepStatus, Workflow};
use crate::execution::executor::{Completion, RunError};
use tracing::{debug, error, warn};

/// Outcome of one selection scan
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    /// The stop flag is raised; nothing new may be dispatched
    Stopped,
    /// Every step is `Success` or `Failed`
    Finished,
    /// This step moved `Idle -> Pending` and now belongs to the caller
    Claimed(StepId),
    /// Nothing is claimable yet but some step is still in flight
    Waiting,
    /// Nothing is claimable and nothing is in flight; these steps can never run
    Stalled(Vec<String>),
}

/// Step statuses, the stop flag, and the first hard error of a run
///
/// Callers keep this behind a single mutex so that scan-and-claim and every
/// status change are serialized.
#[derive(Debug)]
pub struct ExecutionScheduler {
    workflow: Workflow,
    stop: bool,
    failure: Option<RunError>,
}

impl ExecutionScheduler {
    pub fn new(workflow: Workflow) -> Self {
        Self {
            workflow,
            stop: false,
            failure: None,
        }
    }

    /// Scan in declaration order and claim the first runnable step
    pub fn select(&mut self) -> Selection {
        if self.stop {
            return Selection::Stopped;
        }

        let steps = self.workflow.steps();
        if steps.iter().all(|s| s.is_done()) {
            return Selection::Finished;
        }

        if let Some(id) = steps.iter().position(|s| s.should_run(steps)) {
            let step = &mut self.workflow.steps_mut()[id];
            return match step.claim() {
                Ok(()) => {
                    debug!("Claimed step {}", step.name);
                    Selection::Claimed(id)
                }
                Err(e) => {
                    error!("{}", e);
                    self.stop = true;
                    Selection::Stopped
                }
            };
        }

        let in_flight = steps
            .iter()
            .any(|s| matches!(s.status(), StepStatus::Pending | StepStatus::Running));
        if in_flight {
            Selection::Waiting
        } else {
            Selection::Stalled(
                steps
                    .iter()
                    .filter(|s| !s.is_done())
                    .map(|s| s.name.clone())
                    .collect(),
            )
        }
    }

    /// Move a claimed step to `Running` and hand back what to execute
    ///
    /// A step that cannot start raises the stop flag, so the selection loop
    /// ends instead of waiting on it.
    pub fn start(&mut self, id: StepId) -> Option<(String, CommandLine)> {
        let started = match self.workflow.steps_mut().get_mut(id) {
            Some(step) => match step.start() {
                Ok(()) => Some((step.name.clone(), step.command.clone())),
                Err(e) => {
                    error!("{}", e);
                    None
                }
            },
            None => {
                error!("No step with index {}", id);
                None
            }
        };

        if started.is_none() {
            self.stop = true;
        }
        started
    }

    /// Record a finished execution
    ///
    /// Any failure raises the stop flag. Errors that propagate out of the run
    /// are kept, first one wins.
    pub fn complete(&mut self, id: StepId, outcome: Result<Completion, RunError>) {
        let success = matches!(outcome, Ok(Completion::Success));

        if let Some(step) = self.workflow.steps_mut().get_mut(id) {
            if let Err(e) = step.finish(success) {
                error!("{}", e);
            }
            if !success {
                warn!("Step {} failed, no further steps will be dispatched", step.name);
            }
        }

        if !success {
            self.stop = true;
        }

        if let Err(e) = outcome {
            if e.is_propagated() && self.failure.is_none() {
                self.failure = Some(e);
            }
        }
    }

    /// Raise the stop flag
    pub fn request_stop(&mut self) {
        self.stop = true;
    }

    pub fn is_stopped(&self) -> bool {
        self.stop
    }

    /// Take the first error that should be returned from the run
    pub fn take_failure(&mut self) -> Option<RunError> {
        self.failure.take()
    }

    pub fn running_count(&self) -> usize {
        self.workflow
            .steps()
            .iter()
            .filter(|s| s.status() == StepStatus::Running)
            .count()
    }

    pub fn workflow(&self) -> &Workflow {
        &self.workflow
    }

    pub fn into_workflow(self) -> Workflow {
        self.workflow
    }

    pub fn report(&self) -> RunReport {
        self.workflow.report()
    }
}
