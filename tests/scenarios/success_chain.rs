//! Test: Success Chain - a dependent step runs only after its dependency

use crate::helpers::*;
use procflow::core::StepStatus;
use procflow::execution::EventKind;

#[tokio::test]
async fn test_two_step_chain() {
    let yaml = r#"
version: "1"
steps:
  - name: A
    command: "echo a"
  - name: B
    command: "echo b"
    depends_on: [A]
"#;

    let result = run_workflow(yaml, run_config(1)).await;

    assert!(result.outcome.is_ok(), "run failed: {:?}", result.outcome);
    assert_step_status(&result, "A", StepStatus::Success);
    assert_step_status(&result, "B", StepStatus::Success);

    // Strict ordering across the whole run
    let sequence: Vec<(String, EventKind)> = result
        .events
        .iter()
        .map(|e| (e.step.clone(), e.kind))
        .collect();
    assert_eq!(
        sequence,
        vec![
            ("A".to_string(), EventKind::RunRequested),
            ("A".to_string(), EventKind::RunStarted),
            ("A".to_string(), EventKind::RunSuccess),
            ("B".to_string(), EventKind::RunRequested),
            ("B".to_string(), EventKind::RunStarted),
            ("B".to_string(), EventKind::RunSuccess),
        ]
    );

    assert_eq!(result.stdout_of("A"), "a\n");
    assert_eq!(result.stdout_of("B"), "b\n");
}

#[tokio::test]
async fn test_each_execution_gets_its_own_id() {
    let yaml = r#"
version: "1"
steps:
  - name: first
    command: "true"
  - name: second
    command: "true"
"#;

    let result = run_workflow(yaml, run_config(2)).await;

    let id_of = |step: &str| {
        let ids: Vec<_> = result
            .events
            .iter()
            .filter(|e| e.step == step)
            .map(|e| e.execution_id)
            .collect();
        assert!(ids.windows(2).all(|w| w[0] == w[1]));
        ids[0]
    };
    assert_ne!(id_of("first"), id_of("second"));
}

#[tokio::test]
async fn test_diamond_respects_dependencies() {
    let yaml = r#"
version: "1"
metadata:
  owner: ci
steps:
  - name: fetch
    command: "true"
  - name: lint
    command: "true"
    depends_on: [fetch]
  - name: build
    command: "true"
    depends_on: [fetch]
  - name: package
    command: "echo done"
    depends_on: [lint, build]
"#;

    let result = run_workflow(yaml, run_config(4)).await;

    assert!(result.outcome.is_ok());
    for step in ["fetch", "lint", "build", "package"] {
        assert_step_status(&result, step, StepStatus::Success);
    }
    assert_dependencies_respected(&result);
    assert_lifecycles_well_formed(&result);
}

#[tokio::test]
async fn test_empty_workflow_finishes_immediately() {
    let result = run_workflow("version: \"1\"\nsteps: []\n", run_config(1)).await;

    assert!(result.outcome.is_ok());
    assert!(result.events.is_empty());
}
