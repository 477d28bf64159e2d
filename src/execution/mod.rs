//! Workflow execution engine

pub mod engine;
pub mod events;
pub mod executor;
pub mod gate;
pub mod scheduler;
pub mod sink;

pub use engine::{EngineError, ExecutionEngine, StopHandle};
pub use events::{ChannelNotifier, Event, EventKind, Notifier, NotifyError, TracingNotifier};
pub use executor::{Completion, ProcessRunner, RunError};
pub use gate::{AdmissionGate, AdmissionPermit, GateError};
pub use scheduler::{ExecutionScheduler, Selection};
pub use sink::{CapturedOutput, InheritSink, MemorySink, NullSink, Sink, SinkStreams};
