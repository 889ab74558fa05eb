//! `graft mapping check` against mapping files on disk

use std::process::Command;
use tempfile::TempDir;

const COMPANY_MAPPING: &str = include_str!("../../graft-store/tests/fixtures/company.yaml");

fn graft() -> Command {
    Command::new(env!("CARGO_BIN_EXE_graft"))
}

#[test]
fn test_mapping_check_summarizes_orphan_removal() {
    // GIVEN the company mapping on disk
    let temp_dir = TempDir::new().unwrap();
    std::fs::write(temp_dir.path().join("company.yaml"), COMPANY_MAPPING).unwrap();

    // WHEN checking it
    let output = graft()
        .current_dir(temp_dir.path())
        .args(["mapping", "check", "company.yaml"])
        .output()
        .expect("Failed to run CLI");

    // THEN every type is listed and orphan-removal associations are called out
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Employee: 1 attribute(s), 1 association(s) [orphan removal: info]"));
    assert!(stdout.contains(
        "Department: 1 attribute(s), 1 association(s) [orphan removal: positions]"
    ));
    assert!(stdout.contains("Badge: 0 attribute(s), 1 association(s)\n"));
    assert!(stdout.contains("✓ Mapping valid: 6 entity type(s)"));
}

#[test]
fn test_mapping_check_rejects_orphan_removal_on_non_owner_without_inverse() {
    // GIVEN a one-to-one that is not owning and names no inverse
    let temp_dir = TempDir::new().unwrap();
    std::fs::write(
        temp_dir.path().join("broken.yaml"),
        r#"mapping_version: 0
entities:
  - name: Employee
    associations:
      - name: info
        target: EmployeeInfo
        cardinality: one-to-one
        owning: false
        orphan_removal: true
  - name: EmployeeInfo
"#,
    )
    .unwrap();

    // WHEN checking it
    let output = graft()
        .current_dir(temp_dir.path())
        .args(["mapping", "check", "broken.yaml"])
        .output()
        .expect("Failed to run CLI");

    // THEN the CLI fails and names the association
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.starts_with("Error: "), "stderr: {}", stderr);
    assert!(stderr.contains("Employee.info"), "stderr: {}", stderr);
}

#[test]
fn test_mapping_check_missing_file_fails() {
    let temp_dir = TempDir::new().unwrap();

    let output = graft()
        .current_dir(temp_dir.path())
        .args(["mapping", "check", "nope.yaml"])
        .output()
        .expect("Failed to run CLI");

    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("Error:"));
}
