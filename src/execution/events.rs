//! Step lifecycle events and the notifiers that receive them

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

/// What happened to a step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EventKind {
    /// Execution was requested, before any launch attempt
    RunRequested,
    /// Process launched
    RunStarted,
    /// Process could not be launched
    RunError,
    /// Process exited with a non-zero status
    RunFail { exit_status: i32 },
    /// Waiting on the process failed
    RunWaitError,
    /// Step exceeded its deadline
    RunTimeout,
    /// Process exited with status 0 inside its deadline
    RunSuccess,
}

impl EventKind {
    /// Numeric payload carried by the event, if any
    pub fn payload(&self) -> Option<i32> {
        match self {
            EventKind::RunFail { exit_status } => Some(*exit_status),
            _ => None,
        }
    }

    /// The event closes a step's sequence
    pub fn is_terminal(&self) -> bool {
        !matches!(self, EventKind::RunRequested | EventKind::RunStarted)
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventKind::RunRequested => f.write_str("run requested"),
            EventKind::RunStarted => f.write_str("run started"),
            EventKind::RunError => f.write_str("run error"),
            EventKind::RunFail { exit_status } => write!(f, "run failed (exit {})", exit_status),
            EventKind::RunWaitError => f.write_str("run wait error"),
            EventKind::RunTimeout => f.write_str("run timed out"),
            EventKind::RunSuccess => f.write_str("run succeeded"),
        }
    }
}

/// Immutable record of one lifecycle occurrence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Name of the step the event belongs to
    pub step: String,

    /// Identifier of the single execution that produced the event
    pub execution_id: Uuid,

    #[serde(flatten)]
    pub kind: EventKind,

    pub emitted_at: DateTime<Utc>,
}

impl Event {
    pub fn new(step: impl Into<String>, execution_id: Uuid, kind: EventKind) -> Self {
        Self {
            step: step.into(),
            execution_id,
            kind,
            emitted_at: Utc::now(),
        }
    }
}

/// Error types for notifier operations
#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("notification channel closed")]
    Closed,

    #[error("notification failed: {0}")]
    Other(String),
}

/// Receives lifecycle events
///
/// Delivery failures are reported back but never retried by the caller.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, event: &Event) -> Result<(), NotifyError>;
}

/// Forwards events into a tokio channel
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
    tx: mpsc::UnboundedSender<Event>,
}

impl ChannelNotifier {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Event>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

#[async_trait]
impl Notifier for ChannelNotifier {
    async fn notify(&self, event: &Event) -> Result<(), NotifyError> {
        self.tx.send(event.clone()).map_err(|_| NotifyError::Closed)
    }
}

/// Writes events to the log
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

#[async_trait]
impl Notifier for TracingNotifier {
    async fn notify(&self, event: &Event) -> Result<(), NotifyError> {
        match event.kind {
            EventKind::RunError
            | EventKind::RunWaitError
            | EventKind::RunTimeout
            | EventKind::RunFail { .. } => {
                warn!(step = %event.step, execution_id = %event.execution_id, "{}", event.kind);
            }
            _ => info!(step = %event.step, execution_id = %event.execution_id, "{}", event.kind),
        }
        Ok(())
    }
}
