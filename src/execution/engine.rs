//! Main execution engine - drives a workflow run to completion

use crate::core::{ConfigError, RunConfig, RunReport, StepId, StepStatus, Workflow};
use crate::execution::events::Notifier;
use crate::execution::executor::{ProcessRunner, RunError};
use crate::execution::gate::{AdmissionGate, AdmissionPermit, GateError};
use crate::execution::scheduler::{ExecutionScheduler, Selection};
use crate::execution::sink::Sink;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{Mutex, Notify};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Errors returned from a workflow run
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("workflow run cancelled")]
    Cancelled,

    #[error("admission failed: {0}")]
    Admission(GateError),

    #[error(transparent)]
    Step(#[from] RunError),

    #[error("workflow stalled, these steps can never run: {}", .0.join(", "))]
    Stalled(Vec<String>),

    #[error("workflow has already been run")]
    AlreadyStarted,

    #[error("step task panicked: {0}")]
    TaskPanicked(String),
}

impl EngineError {
    /// The run ended because a step exceeded its deadline
    pub fn is_deadline_exceeded(&self) -> bool {
        matches!(self, EngineError::Step(RunError::Timeout { .. }))
    }
}

/// State shared between the selection loop and dispatched step tasks
struct Shared {
    scheduler: Mutex<ExecutionScheduler>,
    wake: Notify,
}

/// Raises the stop flag of a running workflow from outside
///
/// Steps already dispatched keep running and are still awaited.
#[derive(Clone)]
pub struct StopHandle {
    shared: Arc<Shared>,
}

impl StopHandle {
    pub async fn stop(&self) {
        self.shared.scheduler.lock().await.request_stop();
        self.shared.wake.notify_one();
    }
}

/// Dependency-aware, concurrency-bounded workflow engine
///
/// Runs a workflow once; a second call to [`ExecutionEngine::run`] fails.
pub struct ExecutionEngine {
    shared: Arc<Shared>,
    gate: AdmissionGate,
    runner: ProcessRunner,
    started: AtomicBool,
}

impl ExecutionEngine {
    pub fn new(
        workflow: Workflow,
        config: &RunConfig,
        sink: Arc<dyn Sink>,
        notifier: Arc<dyn Notifier>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;

        Ok(Self {
            shared: Arc::new(Shared {
                scheduler: Mutex::new(ExecutionScheduler::new(workflow)),
                wake: Notify::new(),
            }),
            gate: AdmissionGate::new(config.concurrency),
            runner: ProcessRunner::new(sink, notifier, config.step_timeout),
            started: AtomicBool::new(false),
        })
    }

    pub fn stop_handle(&self) -> StopHandle {
        StopHandle {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Number of steps currently admitted
    pub fn admitted(&self) -> usize {
        self.gate.in_use()
    }

    /// Current status of every step
    pub async fn report(&self) -> RunReport {
        self.shared.scheduler.lock().await.report()
    }

    /// Snapshot of the workflow with its current step statuses
    pub async fn workflow(&self) -> Workflow {
        self.shared.scheduler.lock().await.workflow().clone()
    }

    /// Run the workflow
    ///
    /// Returns `Ok` when every step finished or a step failure stopped the run;
    /// inspect [`ExecutionEngine::report`] for the verdict. Wait errors,
    /// timeouts, cancellation and stalls are returned as errors, always after
    /// every dispatched step has finished.
    pub async fn run(&self, cancel: CancellationToken) -> Result<(), EngineError> {
        if self.started.swap(true, Ordering::SeqCst) {
            return Err(EngineError::AlreadyStarted);
        }

        info!(
            "Starting workflow run (concurrency: {}, step timeout: {:?})",
            self.gate.capacity(),
            self.runner.timeout()
        );

        let mut tasks = JoinSet::new();
        let mut outcome = Ok(());

        loop {
            let selection = self.shared.scheduler.lock().await.select();

            match selection {
                Selection::Stopped => {
                    info!("Stop requested, no further steps will be dispatched");
                    break;
                }
                Selection::Finished => break,
                Selection::Stalled(steps) => {
                    error!("No steps ready to run and none running - workflow stuck");
                    outcome = Err(EngineError::Stalled(steps));
                    break;
                }
                Selection::Waiting => {
                    tokio::select! {
                        _ = self.shared.wake.notified() => {}
                        Some(joined) = tasks.join_next() => {
                            if let Err(e) = joined {
                                error!("Step task panicked: {}", e);
                                self.shared.scheduler.lock().await.request_stop();
                                outcome = Err(EngineError::TaskPanicked(e.to_string()));
                                break;
                            }
                        }
                        _ = cancel.cancelled() => {
                            warn!("Workflow run cancelled while waiting for steps");
                            self.shared.scheduler.lock().await.request_stop();
                            outcome = Err(EngineError::Cancelled);
                            break;
                        }
                    }
                }
                Selection::Claimed(id) => match self.gate.acquire(1, &cancel).await {
                    Ok(permit) => self.dispatch(&mut tasks, id, permit),
                    Err(e) => {
                        warn!("Admission failed: {}", e);
                        self.shared.scheduler.lock().await.request_stop();
                        outcome = Err(match e {
                            GateError::Cancelled => EngineError::Cancelled,
                            other => EngineError::Admission(other),
                        });
                        break;
                    }
                },
            }
        }

        while let Some(joined) = tasks.join_next().await {
            if let Err(e) = joined {
                error!("Step task panicked: {}", e);
                if outcome.is_ok() {
                    outcome = Err(EngineError::TaskPanicked(e.to_string()));
                }
            }
        }

        let mut scheduler = self.shared.scheduler.lock().await;
        if outcome.is_ok() {
            if let Some(failure) = scheduler.take_failure() {
                outcome = Err(EngineError::Step(failure));
            }
        }

        let report = scheduler.report();
        info!(
            "Workflow run finished: {}/{} steps succeeded, {} failed",
            report.count(StepStatus::Success),
            report.total(),
            report.count(StepStatus::Failed)
        );

        outcome
    }

    /// Spawn a claimed step; the task owns its `Pending -> Running -> done` moves
    fn dispatch(&self, tasks: &mut JoinSet<()>, id: StepId, permit: AdmissionPermit) {
        let shared = Arc::clone(&self.shared);
        let runner = self.runner.clone();

        tasks.spawn(async move {
            let started = shared.scheduler.lock().await.start(id);
            if let Some((name, command)) = started {
                let outcome = runner.execute(&name, &command).await;
                shared.scheduler.lock().await.complete(id, outcome);
            }
            permit.release();
            shared.wake.notify_one();
        });
    }
}
