//! Test: Load Errors - invalid definitions never reach the engine

use procflow::core::{ConfigError, Violation, Workflow, WorkflowConfig};

#[test]
fn test_ghost_dependency_is_rejected() {
    let yaml = r#"
version: "1"
steps:
  - name: X
    command: "true"
    depends_on: [Y]
"#;

    match Workflow::from_yaml(yaml) {
        Err(ConfigError::Invalid(violations)) => {
            assert_eq!(
                violations,
                vec![Violation::UnknownDependency {
                    step: "X".to_string(),
                    dependency: "Y".to_string(),
                }]
            );
        }
        other => panic!("expected invalid workflow, got {:?}", other.map(|w| w.len())),
    }
}

#[test]
fn test_all_violations_are_reported() {
    let yaml = r#"
version: "2"
steps:
  - name: a
    command: "  "
  - name: a
    command: "true"
"#;

    // Parse without validating so every rule is checked at once
    let config: WorkflowConfig = serde_yaml::from_str(yaml).unwrap();
    let violations = config.violations();

    assert!(violations.contains(&Violation::UnsupportedVersion {
        found: "2".to_string()
    }));
    assert!(violations.contains(&Violation::DuplicateStep {
        name: "a".to_string()
    }));
    assert!(violations.contains(&Violation::EmptyCommand {
        step: "a".to_string()
    }));
}

#[test]
fn test_malformed_yaml_is_a_parse_error() {
    let result = WorkflowConfig::from_yaml("version: [unterminated");
    assert!(matches!(result, Err(ConfigError::Parse(_))));
}

#[test]
fn test_missing_file_is_an_io_error() {
    let result = Workflow::from_file("/nonexistent/procflow/workflow.yaml");
    assert!(matches!(result, Err(ConfigError::Io(_))));
}
