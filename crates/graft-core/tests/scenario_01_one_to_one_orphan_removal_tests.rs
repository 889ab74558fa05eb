/// Scenario 1: one-to-one orphan removal
///
/// An Employee owns its EmployeeInfo through a non-owning one-to-one
/// association with orphan removal. Clearing or replacing the info must
/// delete the abandoned row in the same flush.
mod common;

use common::{loaded_employee_with_info, new_context};
use graft_core::{
    complete_flush, plan_flush, EntityId, EntityKey, LinkRow, NoExternalReferences, OrphanDelete,
};
use serde_json::json;

fn key(entity_type: &str, id: &str) -> EntityKey {
    EntityKey::new(entity_type, EntityId::from(id))
}

#[test]
fn test_scenario_01_happy_clearing_info_schedules_orphan_delete() {
    // GIVEN a stored employee with its info
    let mut ctx = new_context();
    let (employee, _info) = loaded_employee_with_info(&mut ctx, "e1", "i1");

    // WHEN the employee lets go of its info
    ctx.associate(employee, "info", None).unwrap();
    let plan = plan_flush(&mut ctx, &NoExternalReferences).unwrap();

    // THEN exactly the abandoned info is deleted and the employee is untouched
    assert_eq!(
        plan.orphan_deletes,
        vec![OrphanDelete {
            key: key("EmployeeInfo", "i1"),
            owner: key("Employee", "e1"),
            association: "info".to_string(),
        }]
    );
    assert!(plan.inserts.is_empty());
    assert!(plan.updates.is_empty());
    assert!(plan.deletes.is_empty());
}

#[test]
fn test_scenario_01_happy_one_sided_clear_still_orphans() {
    // GIVEN a stored employee with its info
    let mut ctx = new_context();
    let (employee, info) = loaded_employee_with_info(&mut ctx, "e1", "i1");

    // WHEN only the non-owning side is cleared
    ctx.set_association(employee, "info", None).unwrap();
    let plan = plan_flush(&mut ctx, &NoExternalReferences).unwrap();

    // THEN the info is still orphaned and marked removed
    assert_eq!(plan.orphan_deletes.len(), 1);
    assert!(ctx.entity(info).unwrap().is_removed());
}

#[test]
fn test_scenario_01_happy_replacing_info_deletes_previous_before_insert() {
    // GIVEN a stored employee with info v1
    let mut ctx = new_context();
    let (employee, _info) = loaded_employee_with_info(&mut ctx, "e1", "i1");

    // WHEN a new info v2 replaces it
    let replacement = ctx.instantiate("EmployeeInfo").unwrap();
    ctx.set_attribute(replacement, "label", json!("v2")).unwrap();
    ctx.associate(employee, "info", Some(replacement)).unwrap();
    let plan = plan_flush(&mut ctx, &NoExternalReferences).unwrap();

    // THEN v1 is an orphan delete and v2 is inserted with the owning link
    assert_eq!(plan.orphan_deletes.len(), 1);
    assert_eq!(plan.orphan_deletes[0].key, key("EmployeeInfo", "i1"));

    assert_eq!(plan.inserts.len(), 1);
    let insert = &plan.inserts[0];
    let replacement_key = ctx.entity(replacement).unwrap().key().unwrap();
    assert_eq!(insert.key, replacement_key);
    assert_eq!(insert.attributes.get("label"), Some(&json!("v2")));
    assert_eq!(
        insert.links,
        Some(vec![LinkRow {
            association: "employee".to_string(),
            target: key("Employee", "e1"),
            position: 0,
            exclusive: true,
        }])
    );
    assert!(plan.deletes.is_empty());
}

#[test]
fn test_scenario_01_edge_replacing_with_same_target_is_a_no_op() {
    // GIVEN a stored employee with its info
    let mut ctx = new_context();
    let (employee, info) = loaded_employee_with_info(&mut ctx, "e1", "i1");

    // WHEN the same info is assigned again
    ctx.associate(employee, "info", Some(info)).unwrap();
    ctx.set_association(employee, "info", Some(info)).unwrap();
    let plan = plan_flush(&mut ctx, &NoExternalReferences).unwrap();

    // THEN nothing is written
    assert!(plan.is_empty());
    assert!(!ctx.entity(info).unwrap().is_removed());
}

#[test]
fn test_scenario_01_edge_second_flush_is_empty() {
    // GIVEN a flushed replacement
    let mut ctx = new_context();
    let (employee, info) = loaded_employee_with_info(&mut ctx, "e1", "i1");
    let replacement = ctx.instantiate("EmployeeInfo").unwrap();
    ctx.associate(employee, "info", Some(replacement)).unwrap();
    let first = plan_flush(&mut ctx, &NoExternalReferences).unwrap();
    assert_eq!(first.orphan_deletes.len(), 1);
    complete_flush(&mut ctx);

    // WHEN flushing again without changes
    let second = plan_flush(&mut ctx, &NoExternalReferences).unwrap();

    // THEN no further deletes (or writes) are produced
    assert!(second.is_empty());
    assert!(ctx.entity(info).is_err());
    assert_eq!(ctx.association(employee, "info").unwrap(), Some(replacement));
}

#[test]
fn test_scenario_01_edge_explicitly_removed_orphan_is_not_scheduled_twice() {
    // GIVEN an employee whose info is cleared and explicitly removed
    let mut ctx = new_context();
    let (employee, info) = loaded_employee_with_info(&mut ctx, "e1", "i1");
    ctx.associate(employee, "info", None).unwrap();
    ctx.remove(info).unwrap();

    // WHEN planning the flush
    let plan = plan_flush(&mut ctx, &NoExternalReferences).unwrap();

    // THEN the explicit delete covers it; no orphan delete is added
    assert!(plan.orphan_deletes.is_empty());
    assert_eq!(plan.deletes, vec![key("EmployeeInfo", "i1")]);
}

#[test]
fn test_scenario_01_edge_removing_owner_cascades_to_info() {
    // GIVEN a stored employee with its info
    let mut ctx = new_context();
    let (employee, _info) = loaded_employee_with_info(&mut ctx, "e1", "i1");

    // WHEN the employee is removed
    ctx.remove(employee).unwrap();
    let plan = plan_flush(&mut ctx, &NoExternalReferences).unwrap();

    // THEN both rows are explicit deletes, in handle order
    assert!(plan.orphan_deletes.is_empty());
    assert_eq!(
        plan.deletes,
        vec![key("Employee", "e1"), key("EmployeeInfo", "i1")]
    );
}

#[test]
fn test_scenario_01_happy_new_employee_cascades_persist_to_info() {
    // GIVEN a fresh employee with a fresh info
    let mut ctx = new_context();
    let employee = ctx.instantiate("Employee").unwrap();
    let info = ctx.instantiate("EmployeeInfo").unwrap();
    ctx.set_id(employee, EntityId::from("e-new")).unwrap();
    ctx.associate(employee, "info", Some(info)).unwrap();

    // WHEN only the employee is persisted and the context flushed
    ctx.persist(employee).unwrap();
    let plan = plan_flush(&mut ctx, &NoExternalReferences).unwrap();

    // THEN both are inserted; only the info carries a link
    assert_eq!(plan.inserts.len(), 2);
    assert_eq!(plan.inserts[0].key, key("Employee", "e-new"));
    assert_eq!(plan.inserts[0].links, Some(Vec::new()));
    let info_links = plan.inserts[1].links.clone().unwrap();
    assert_eq!(info_links.len(), 1);
    assert_eq!(info_links[0].target, key("Employee", "e-new"));

    // AND after completion a second plan is empty
    complete_flush(&mut ctx);
    assert!(plan_flush(&mut ctx, &NoExternalReferences).unwrap().is_empty());
}
