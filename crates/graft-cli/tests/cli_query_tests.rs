//! `graft query` against a database seeded through the engine

use graft_core::model::EntityId;
use graft_engine::{SessionFactory, SessionFactoryConfig};
use serde_json::json;
use std::path::Path;
use std::process::Command;
use tempfile::TempDir;

const COMPANY_MAPPING: &str = include_str!("../../graft-store/tests/fixtures/company.yaml");

fn config(dir: &Path) -> SessionFactoryConfig {
    SessionFactoryConfig::file(dir.join("graft.db")).with_mapping(dir.join("company.yaml"))
}

fn graft() -> Command {
    Command::new(env!("CARGO_BIN_EXE_graft"))
}

/// Two employees, e1 with info i1 and e2 with info i2
fn seed(dir: &Path) {
    std::fs::write(dir.join("company.yaml"), COMPANY_MAPPING).unwrap();
    let mut factory = SessionFactory::open(config(dir)).unwrap();
    factory
        .in_transaction(|session| {
            for (e, i) in [("e1", "i1"), ("e2", "i2")] {
                let employee = session.instantiate("Employee")?;
                session.set_id(employee, EntityId::new(e))?;
                session.set_attribute(employee, "name", json!(e))?;
                let info = session.instantiate("EmployeeInfo")?;
                session.set_id(info, EntityId::new(i))?;
                session.associate(employee, "info", Some(info))?;
                session.persist(employee)?;
            }
            Ok(())
        })
        .unwrap();
}

fn clear_info(dir: &Path, employee: &str) {
    let mut factory = SessionFactory::open(config(dir)).unwrap();
    factory
        .in_transaction(|session| {
            let handle = session
                .get("Employee", &EntityId::new(employee))?
                .expect("seeded employee");
            session.associate(handle, "info", None)
        })
        .unwrap();
}

fn run(dir: &Path, args: &[&str]) -> std::process::Output {
    graft()
        .current_dir(dir)
        .args(args)
        .output()
        .expect("Failed to run CLI")
}

#[test]
fn test_query_count_sees_orphan_removal() {
    // GIVEN two seeded employees and e1's info cleared
    let temp_dir = TempDir::new().unwrap();
    seed(temp_dir.path());
    clear_info(temp_dir.path(), "e1");

    // WHEN counting both types
    let employees = run(
        temp_dir.path(),
        &["query", "count", "Employee", "--db", "graft.db", "--mapping", "company.yaml"],
    );
    let infos = run(
        temp_dir.path(),
        &["query", "count", "EmployeeInfo", "--db", "graft.db", "--mapping", "company.yaml"],
    );

    // THEN the orphaned info is gone and both employees remain
    assert!(
        employees.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&employees.stderr)
    );
    assert_eq!(String::from_utf8_lossy(&employees.stdout).trim(), "2");
    assert_eq!(String::from_utf8_lossy(&infos.stdout).trim(), "1");
}

#[test]
fn test_query_list_with_config_file() {
    // GIVEN a seeded database and a TOML config pointing at it
    let temp_dir = TempDir::new().unwrap();
    seed(temp_dir.path());
    std::fs::write(
        temp_dir.path().join("graft.toml"),
        "database = \"graft.db\"\nmapping = \"company.yaml\"\nlog_profile = \"test\"\n",
    )
    .unwrap();

    // WHEN listing infos through the config
    let output = run(temp_dir.path(), &["query", "list", "EmployeeInfo", "--config", "graft.toml"]);

    // THEN identities come back oldest first, one per line
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_eq!(stdout.lines().collect::<Vec<_>>(), vec!["i1", "i2"]);
}

#[test]
fn test_query_unknown_type_fails() {
    let temp_dir = TempDir::new().unwrap();
    seed(temp_dir.path());

    let output = run(
        temp_dir.path(),
        &["query", "count", "Nope", "--db", "graft.db", "--mapping", "company.yaml"],
    );

    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).starts_with("Error: "));
}

#[test]
fn test_query_without_source_fails() {
    let temp_dir = TempDir::new().unwrap();

    let output = run(temp_dir.path(), &["query", "count", "Employee"]);

    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("--config"));
}
