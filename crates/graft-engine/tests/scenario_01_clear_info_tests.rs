//! Scenario 1: clearing a one-to-one orphan-removal association
//!
//! An Employee with an EmployeeInfo lets go of it; after commit the info is
//! gone from every query while the employee remains.
mod common;

use common::{factory, id, seed_employee_with_info, stored_count};

#[test]
fn test_scenario_01_happy_cleared_info_is_deleted_on_commit() {
    // GIVEN a committed employee with its info
    let mut factory = factory();
    seed_employee_with_info(&mut factory, "e1", "i1", "v1");

    // WHEN a unit of work sets the info to none
    factory
        .in_transaction(|session| {
            let employee = session.get("Employee", &id("e1"))?.expect("employee e1");
            session.associate(employee, "info", None)
        })
        .unwrap();

    // THEN no info rows remain and the employee does
    assert_eq!(stored_count(&factory, "EmployeeInfo"), 0);
    assert_eq!(stored_count(&factory, "Employee"), 1);
}

#[test]
fn test_scenario_01_happy_orphan_is_unretrievable_by_any_query() {
    // GIVEN a committed employee with its info
    let mut factory = factory();
    seed_employee_with_info(&mut factory, "e1", "i1", "v1");

    // WHEN the info is cleared and flushed
    let (by_id, listed, counted, still_linked) = factory
        .from_transaction(|session| {
            let employee = session.get("Employee", &id("e1"))?.expect("employee e1");
            session.associate(employee, "info", None)?;
            session.flush()?;

            let by_id = session.get("EmployeeInfo", &id("i1"))?;
            let listed = session.list("EmployeeInfo")?;
            let counted = session.count("EmployeeInfo")?;
            let still_linked = session.association(employee, "info")?;
            Ok((by_id, listed, counted, still_linked))
        })
        .unwrap();

    // THEN lookup by identity, list and count all miss it
    assert!(by_id.is_none());
    assert!(listed.is_empty());
    assert_eq!(counted, 0);
    assert!(still_linked.is_none());
}

#[test]
fn test_scenario_01_happy_reloaded_employee_has_no_info() {
    // GIVEN a committed employee whose info was cleared
    let mut factory = factory();
    seed_employee_with_info(&mut factory, "e1", "i1", "v1");
    factory
        .in_transaction(|session| {
            let employee = session.get("Employee", &id("e1"))?.expect("employee e1");
            session.associate(employee, "info", None)
        })
        .unwrap();

    // WHEN the employee is loaded in a new unit of work
    let info = factory
        .from_transaction(|session| {
            let employee = session.get("Employee", &id("e1"))?.expect("employee e1");
            session.association(employee, "info")
        })
        .unwrap();

    // THEN it has no info
    assert!(info.is_none());
}

#[test]
fn test_scenario_01_edge_one_sided_clear_still_deletes() {
    // GIVEN a committed employee with its info
    let mut factory = factory();
    seed_employee_with_info(&mut factory, "e1", "i1", "v1");

    // WHEN only the employee's side is cleared
    factory
        .in_transaction(|session| {
            let employee = session.get("Employee", &id("e1"))?.expect("employee e1");
            session.set_association(employee, "info", None)
        })
        .unwrap();

    // THEN the info is still deleted
    assert_eq!(stored_count(&factory, "EmployeeInfo"), 0);
    assert_eq!(stored_count(&factory, "Employee"), 1);
}

#[test]
fn test_scenario_01_edge_info_cleared_then_employee_removed() {
    // GIVEN two committed employees with their infos
    let mut factory = factory();
    seed_employee_with_info(&mut factory, "e1", "i1", "v1");
    seed_employee_with_info(&mut factory, "e2", "i2", "v1");

    // WHEN e1 clears its info through both sides and e2 only on its own side,
    // and then both employees are removed in the same unit of work
    factory
        .in_transaction(|session| {
            let e1 = session.get("Employee", &id("e1"))?.expect("employee e1");
            session.associate(e1, "info", None)?;
            session.remove(e1)?;

            let e2 = session.get("Employee", &id("e2"))?.expect("employee e2");
            session.set_association(e2, "info", None)?;
            session.remove(e2)
        })
        .unwrap();

    // THEN the abandoned infos went with their owners
    assert_eq!(stored_count(&factory, "EmployeeInfo"), 0);
    assert_eq!(stored_count(&factory, "Employee"), 0);
}

#[test]
fn test_scenario_01_edge_info_replaced_then_employee_removed() {
    // GIVEN a committed employee with its info
    let mut factory = factory();
    seed_employee_with_info(&mut factory, "e1", "i1", "v1");

    // WHEN the info is replaced by a new one and the employee is then removed
    factory
        .in_transaction(|session| {
            let employee = session.get("Employee", &id("e1"))?.expect("employee e1");
            let replacement = session.instantiate("EmployeeInfo")?;
            session.associate(employee, "info", Some(replacement))?;
            session.remove(employee)
        })
        .unwrap();

    // THEN neither the old nor the replacement info is stored
    assert_eq!(stored_count(&factory, "EmployeeInfo"), 0);
    assert_eq!(stored_count(&factory, "Employee"), 0);
}
