//! Process runner - executes one step's command and classifies the outcome

use crate::core::CommandLine;
use crate::execution::events::{Event, EventKind, Notifier};
use crate::execution::sink::{Sink, SinkWriter};
use std::io;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWriteExt};
use tokio::process::Command;
use tokio::task::JoinHandle;
use tokio::time::{timeout_at, Instant};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Hard failures of a single step execution
#[derive(Debug, Error)]
pub enum RunError {
    #[error("failed to launch '{program}' for step '{step}': {source}")]
    Launch {
        step: String,
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("failed while waiting on step '{step}': {source}")]
    Wait {
        step: String,
        #[source]
        source: io::Error,
    },

    #[error("step '{step}' exceeded its deadline of {timeout:?}")]
    Timeout { step: String, timeout: Duration },
}

impl RunError {
    pub fn step(&self) -> &str {
        match self {
            RunError::Launch { step, .. }
            | RunError::Wait { step, .. }
            | RunError::Timeout { step, .. } => step,
        }
    }

    /// Whether the error is returned from a workflow run
    ///
    /// Launch failures are recorded in step status and events only.
    pub fn is_propagated(&self) -> bool {
        matches!(self, RunError::Wait { .. } | RunError::Timeout { .. })
    }
}

/// How a launched process finished
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    /// Exited with status 0 inside the deadline
    Success,
    /// Exited with a non-zero status (`-1` when killed by a signal)
    Failed { exit_status: i32 },
}

impl Completion {
    pub fn is_success(&self) -> bool {
        matches!(self, Completion::Success)
    }
}

/// Runs a step's command as an external process under a deadline
#[derive(Clone)]
pub struct ProcessRunner {
    sink: Arc<dyn Sink>,
    notifier: Arc<dyn Notifier>,
    timeout: Duration,
}

impl ProcessRunner {
    pub fn new(sink: Arc<dyn Sink>, notifier: Arc<dyn Notifier>, timeout: Duration) -> Self {
        Self {
            sink,
            notifier,
            timeout,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Execute `command` for `step`
    ///
    /// Emits `RunRequested`, then `RunStarted` or `RunError`, then exactly one
    /// of `RunSuccess`, `RunFail`, `RunWaitError` or `RunTimeout`. A non-zero
    /// exit is returned as `Ok(Completion::Failed { .. })`.
    pub async fn execute(&self, step: &str, command: &CommandLine) -> Result<Completion, RunError> {
        let execution_id = Uuid::new_v4();
        self.push(Event::new(step, execution_id, EventKind::RunRequested))
            .await;

        // The deadline covers launch and wait together.
        let deadline = Instant::now() + self.timeout;

        let launched = self.sink.open(step).and_then(|streams| {
            Command::new(command.program())
                .args(command.args())
                .stdin(Stdio::null())
                .stdout(Stdio::piped())
                .stderr(Stdio::piped())
                .kill_on_drop(true)
                .spawn()
                .map(|child| (child, streams))
        });

        let (mut child, streams) = match launched {
            Ok(launched) => launched,
            Err(source) => {
                warn!("Failed to launch step {}: {}", step, source);
                self.push(Event::new(step, execution_id, EventKind::RunError))
                    .await;
                return Err(RunError::Launch {
                    step: step.to_string(),
                    program: command.program().to_string(),
                    source,
                });
            }
        };

        info!("Started step {}: {}", step, command);
        self.push(Event::new(step, execution_id, EventKind::RunStarted))
            .await;

        let mut pumps = [
            child.stdout.take().map(|out| pump(out, streams.stdout)),
            child.stderr.take().map(|err| pump(err, streams.stderr)),
        ];

        let status = match timeout_at(deadline, child.wait()).await {
            Ok(Ok(status)) => status,
            Ok(Err(source)) => {
                abort_all(&pumps);
                return Err(self.wait_error(step, execution_id, source).await);
            }
            Err(_) => {
                if let Err(e) = child.kill().await {
                    warn!("Failed to kill timed out step {}: {}", step, e);
                }
                abort_all(&pumps);
                return Err(self.timed_out(step, execution_id).await);
            }
        };

        if Instant::now() >= deadline {
            abort_all(&pumps);
            return Err(self.timed_out(step, execution_id).await);
        }

        // Output must be fully drained before the outcome is reported.
        for slot in 0..pumps.len() {
            let Some(pump) = pumps[slot].as_mut() else {
                continue;
            };
            let drained = match timeout_at(deadline, pump).await {
                Ok(joined) => joined.unwrap_or_else(|e| Err(io::Error::other(e))),
                Err(_) => {
                    // A grandchild may still hold the pipe open
                    abort_all(&pumps);
                    return Err(self.timed_out(step, execution_id).await);
                }
            };
            if let Err(source) = drained {
                abort_all(&pumps);
                return Err(self.wait_error(step, execution_id, source).await);
            }
        }

        if status.success() {
            info!("Step {} completed successfully", step);
            self.push(Event::new(step, execution_id, EventKind::RunSuccess))
                .await;
            Ok(Completion::Success)
        } else {
            let exit_status = status.code().unwrap_or(-1);
            warn!("Step {} exited with code {}", step, exit_status);
            self.push(Event::new(
                step,
                execution_id,
                EventKind::RunFail { exit_status },
            ))
            .await;
            Ok(Completion::Failed { exit_status })
        }
    }

    async fn wait_error(&self, step: &str, execution_id: Uuid, source: io::Error) -> RunError {
        warn!("Failed while waiting on step {}: {}", step, source);
        self.push(Event::new(step, execution_id, EventKind::RunWaitError))
            .await;
        RunError::Wait {
            step: step.to_string(),
            source,
        }
    }

    async fn timed_out(&self, step: &str, execution_id: Uuid) -> RunError {
        warn!("Step {} timed out after {:?}", step, self.timeout);
        self.push(Event::new(step, execution_id, EventKind::RunTimeout))
            .await;
        RunError::Timeout {
            step: step.to_string(),
            timeout: self.timeout,
        }
    }

    /// Deliver an event; a failed delivery is logged and otherwise ignored
    async fn push(&self, event: Event) {
        debug!("Step {} event: {}", event.step, event.kind);
        if let Err(e) = self.notifier.notify(&event).await {
            warn!("Failed to deliver {} event for step {}: {}", event.kind, event.step, e);
        }
    }
}

/// Copy one process stream into its sink writer until EOF
fn pump<R>(mut source: R, mut sink: SinkWriter) -> JoinHandle<io::Result<u64>>
where
    R: AsyncRead + Send + Unpin + 'static,
{
    tokio::spawn(async move {
        let copied = tokio::io::copy(&mut source, &mut sink).await?;
        sink.flush().await?;
        Ok(copied)
    })
}

fn abort_all(pumps: &[Option<JoinHandle<io::Result<u64>>>]) {
    for pump in pumps.iter().flatten() {
        pump.abort();
    }
}
