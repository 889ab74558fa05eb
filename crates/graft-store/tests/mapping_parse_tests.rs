// Integration tests for the v0 mapping format

use graft_core::{Cardinality, ExErrorKind};
use graft_store::mapping::{parse_mapping_file, parse_mapping_str};
use std::io::Write;

const COMPANY_MAPPING: &str = include_str!("fixtures/company.yaml");

#[test]
fn test_company_mapping_parses() {
    let registry = parse_mapping_str(COMPANY_MAPPING).unwrap();

    assert_eq!(registry.len(), 6);
    let info = registry.association("Employee", "info").unwrap();
    assert_eq!(info.cardinality, Cardinality::OneToOne);
    assert!(!info.owning);
    assert!(info.orphan_removal);
    assert_eq!(info.inverse.as_deref(), Some("employee"));

    let name = registry
        .entity_type("Department")
        .unwrap()
        .attribute("name")
        .unwrap();
    assert!(!name.nullable);
}

#[test]
fn test_mapping_file_is_read_from_disk() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(COMPANY_MAPPING.as_bytes()).unwrap();

    let registry = parse_mapping_file(file.path()).unwrap();
    assert!(registry.contains("EmployeeInfo"));
}

#[test]
fn test_missing_mapping_file_is_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = parse_mapping_file(&dir.path().join("absent.yaml")).unwrap_err();
    assert_eq!(err.kind(), ExErrorKind::Io);
}

#[test]
fn test_non_owning_side_needs_inverse() {
    let yaml = r#"
mapping_version: 0
entities:
  - name: Employee
    associations:
      - name: info
        target: EmployeeInfo
        cardinality: one-to-one
        owning: false
  - name: EmployeeInfo
"#;
    let err = parse_mapping_str(yaml).unwrap_err();
    assert_eq!(err.kind(), ExErrorKind::InvalidMapping);
    assert!(err.message().contains("Employee.info"));
}

#[test]
fn test_orphan_removal_on_many_to_many_is_rejected() {
    let yaml = r#"
mapping_version: 0
entities:
  - name: Team
    associations:
      - name: members
        target: Employee
        cardinality: many-to-many
        orphan_removal: true
  - name: Employee
"#;
    let err = parse_mapping_str(yaml).unwrap_err();
    assert_eq!(err.kind(), ExErrorKind::InvalidMapping);
    assert_eq!(err.op(), Some("mapping_parse"));
}

#[test]
fn test_unknown_target_is_rejected() {
    let yaml = r#"
mapping_version: 0
entities:
  - name: Employee
    associations:
      - name: info
        target: Nowhere
        cardinality: one-to-one
"#;
    let err = parse_mapping_str(yaml).unwrap_err();
    assert_eq!(err.kind(), ExErrorKind::InvalidMapping);
}
