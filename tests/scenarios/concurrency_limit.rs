//! Test: Concurrency Limit - never more steps running than the gate admits

use crate::helpers::*;
use procflow::core::StepStatus;

#[tokio::test]
async fn test_three_independent_steps_with_limit_two() {
    let yaml = r#"
version: "1"
steps:
  - name: A
    command: "sleep 0.2"
  - name: B
    command: "sleep 0.2"
  - name: C
    command: "sleep 0.2"
"#;

    let result = run_workflow(yaml, run_config(2)).await;

    assert!(result.outcome.is_ok());
    for step in ["A", "B", "C"] {
        assert_step_status(&result, step, StepStatus::Success);
    }
    assert!(
        result.max_running() <= 2,
        "observed {} concurrent steps",
        result.max_running()
    );
    assert_lifecycles_well_formed(&result);
}

#[tokio::test]
async fn test_limit_one_serializes_independent_steps() {
    let yaml = r#"
version: "1"
steps:
  - name: one
    command: "true"
  - name: two
    command: "true"
  - name: three
    command: "true"
"#;

    let result = run_workflow(yaml, run_config(1)).await;

    assert_eq!(result.max_running(), 1);

    // Declaration order decides who goes first
    let starts: Vec<&str> = result
        .events
        .iter()
        .filter(|e| e.kind == procflow::EventKind::RunStarted)
        .map(|e| e.step.as_str())
        .collect();
    assert_eq!(starts, vec!["one", "two", "three"]);
}

#[tokio::test]
async fn test_independent_steps_overlap_when_allowed() {
    let yaml = r#"
version: "1"
steps:
  - name: left
    command: "sleep 0.5"
  - name: right
    command: "sleep 0.5"
"#;

    let result = run_workflow(yaml, run_config(2)).await;

    assert!(result.outcome.is_ok());
    assert_eq!(result.max_running(), 2);
}
