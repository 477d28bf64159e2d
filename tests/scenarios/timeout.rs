//! Test: Timeout - a step past its deadline is killed and ends the run

use crate::helpers::*;
use procflow::core::{RunConfig, StepStatus};
use procflow::execution::{EngineError, EventKind};
use std::time::{Duration, Instant};

#[tokio::test]
async fn test_step_timeout_returns_deadline_error() {
    let yaml = r#"
version: "1"
steps:
  - name: T
    command: "sleep 30"
  - name: after
    command: "true"
    depends_on: [T]
"#;

    let config = RunConfig::new()
        .with_concurrency(1)
        .with_step_timeout(Duration::from_millis(300));

    let started = Instant::now();
    let result = run_workflow(yaml, config).await;

    assert!(started.elapsed() < Duration::from_secs(10));
    match &result.outcome {
        Err(e) => assert!(e.is_deadline_exceeded(), "unexpected error: {}", e),
        Ok(()) => panic!("expected the run to time out"),
    }
    assert!(matches!(result.outcome, Err(EngineError::Step(_))));

    assert_step_status(&result, "T", StepStatus::Failed);
    assert_step_status(&result, "after", StepStatus::Idle);
    assert_eq!(
        result.kinds_for("T"),
        vec![
            EventKind::RunRequested,
            EventKind::RunStarted,
            EventKind::RunTimeout
        ]
    );
}

#[tokio::test]
async fn test_fast_step_beats_deadline() {
    let yaml = r#"
version: "1"
steps:
  - name: quick
    command: "echo fast"
"#;

    let config = RunConfig::new()
        .with_concurrency(1)
        .with_step_timeout(Duration::from_secs(5));

    let result = run_workflow(yaml, config).await;

    assert!(result.outcome.is_ok());
    assert_step_status(&result, "quick", StepStatus::Success);
}
