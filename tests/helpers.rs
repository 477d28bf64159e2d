//! Test utility functions for procflow
#![allow(dead_code)]

use procflow::core::{RunConfig, StepStatus, Workflow};
use procflow::execution::{
    ChannelNotifier, EngineError, Event, EventKind, ExecutionEngine, MemorySink, Sink,
    SinkStreams,
};
use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::io::AsyncWrite;
use tokio_util::sync::CancellationToken;

/// Result of running a workflow in tests
pub struct WorkflowTestResult {
    pub outcome: Result<(), EngineError>,
    pub workflow: Workflow,
    pub events: Vec<Event>,
    pub sink: Option<MemorySink>,
}

impl WorkflowTestResult {
    pub fn status(&self, step: &str) -> StepStatus {
        self.workflow
            .status(step)
            .unwrap_or_else(|| panic!("Step '{}' not found in workflow", step))
    }

    /// Event kinds emitted for one step, in emission order
    pub fn kinds_for(&self, step: &str) -> Vec<EventKind> {
        self.events
            .iter()
            .filter(|e| e.step == step)
            .map(|e| e.kind)
            .collect()
    }

    /// Position of the first event of `kind` for `step`
    pub fn position_of(&self, step: &str, kind: EventKind) -> Option<usize> {
        self.events
            .iter()
            .position(|e| e.step == step && e.kind == kind)
    }

    /// Highest number of steps between `RunStarted` and their terminal event
    pub fn max_running(&self) -> usize {
        let mut running = 0usize;
        let mut max = 0usize;
        for event in &self.events {
            if event.kind == EventKind::RunStarted {
                running += 1;
                max = max.max(running);
            } else if event.kind.is_terminal() && event.kind != EventKind::RunError {
                running = running.saturating_sub(1);
            }
        }
        max
    }

    pub fn stdout_of(&self, step: &str) -> String {
        self.sink
            .as_ref()
            .and_then(|sink| sink.output(step))
            .map(|o| o.stdout_lossy())
            .unwrap_or_default()
    }
}

pub fn workflow_from_yaml(yaml: &str) -> Workflow {
    Workflow::from_yaml(yaml).expect("Failed to load workflow")
}

pub fn run_config(concurrency: usize) -> RunConfig {
    RunConfig::new()
        .with_concurrency(concurrency)
        .with_step_timeout(Duration::from_secs(30))
}

/// Run a workflow definition with captured output and collected events
pub async fn run_workflow(yaml: &str, config: RunConfig) -> WorkflowTestResult {
    let sink = MemorySink::new();
    let mut result = run_workflow_with_sink(yaml, config, Arc::new(sink.clone())).await;
    result.sink = Some(sink);
    result
}

/// Run a workflow definition against a caller-supplied sink
pub async fn run_workflow_with_sink(
    yaml: &str,
    config: RunConfig,
    sink: Arc<dyn Sink>,
) -> WorkflowTestResult {
    let workflow = workflow_from_yaml(yaml);
    let (notifier, mut rx) = ChannelNotifier::new();

    let engine = ExecutionEngine::new(workflow, &config, sink, Arc::new(notifier))
        .expect("Invalid run configuration");

    let outcome = engine.run(CancellationToken::new()).await;
    let workflow = engine.workflow().await;
    drop(engine);

    let mut events = Vec::new();
    while let Some(event) = rx.recv().await {
        events.push(event);
    }

    WorkflowTestResult {
        outcome,
        workflow,
        events,
        sink: None,
    }
}

/// Sink whose writers reject every write
pub struct FailingSink;

struct FailingWriter;

impl AsyncWrite for FailingWriter {
    fn poll_write(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        _buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        Poll::Ready(Err(io::Error::other("disk full")))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}

impl Sink for FailingSink {
    fn open(&self, _step: &str) -> io::Result<SinkStreams> {
        Ok(SinkStreams {
            stdout: Box::new(FailingWriter),
            stderr: Box::new(FailingWriter),
        })
    }
}

pub fn assert_step_status(result: &WorkflowTestResult, step: &str, expected: StepStatus) {
    let actual = result.status(step);
    assert_eq!(
        actual, expected,
        "Step '{}' expected {} but was {}",
        step, expected, actual
    );
}

/// Every step's events are a prefix of one of the legal lifecycles
pub fn assert_lifecycles_well_formed(result: &WorkflowTestResult) {
    for step in result.workflow.steps() {
        let kinds = result.kinds_for(&step.name);
        match kinds.as_slice() {
            [] | [EventKind::RunRequested] => {}
            [EventKind::RunRequested, EventKind::RunError] => {}
            [EventKind::RunRequested, EventKind::RunStarted] => {}
            [EventKind::RunRequested, EventKind::RunStarted, terminal] => {
                assert!(
                    terminal.is_terminal() && *terminal != EventKind::RunError,
                    "Step '{}' ended with unexpected event {}",
                    step.name,
                    terminal
                );
            }
            other => panic!("Step '{}' emitted malformed sequence {:?}", step.name, other),
        }
    }
}

/// No step starts before each of its dependencies reported success
pub fn assert_dependencies_respected(result: &WorkflowTestResult) {
    for step in result.workflow.steps() {
        let Some(started) = result.position_of(&step.name, EventKind::RunStarted) else {
            continue;
        };
        for dep in result.workflow.dependency_names(&step.name).unwrap_or_default() {
            let finished = result
                .position_of(dep, EventKind::RunSuccess)
                .unwrap_or_else(|| panic!("'{}' started but dependency '{}' never succeeded", step.name, dep));
            assert!(
                finished < started,
                "'{}' started before dependency '{}' succeeded",
                step.name,
                dep
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_run_workflow_helper_collects_events() {
        let result = run_workflow(
            r#"
version: "1"
steps:
  - name: only
    command: "echo hi"
"#,
            run_config(1),
        )
        .await;

        assert!(result.outcome.is_ok());
        assert_eq!(
            result.kinds_for("only"),
            vec![
                EventKind::RunRequested,
                EventKind::RunStarted,
                EventKind::RunSuccess
            ]
        );
        assert_eq!(result.stdout_of("only"), "hi\n");
    }
}
