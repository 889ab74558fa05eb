use std::sync::Arc;

use graft_core::{EntityHandle, EntityId, EntityKey, MappingRegistry, PersistenceContext};
use graft_store::mapping::parse_mapping_str;
use graft_store::migrations::apply_migrations;
use graft_store::{db, SqliteReferenceLookup, SqliteRepo};
use rusqlite::Connection;

pub const COMPANY_MAPPING: &str = include_str!("../fixtures/company.yaml");

#[allow(dead_code)]
pub fn registry() -> Arc<MappingRegistry> {
    Arc::new(parse_mapping_str(COMPANY_MAPPING).expect("fixture mapping is valid"))
}

/// Migrated in-memory database with foreign keys on
#[allow(dead_code)]
pub fn setup_test_db() -> Connection {
    let mut conn = db::open_in_memory().expect("open in-memory database");
    db::configure(&conn, true).expect("configure connection");
    apply_migrations(&mut conn).expect("apply migrations");
    conn
}

#[allow(dead_code)]
pub fn key(entity_type: &str, id: &str) -> EntityKey {
    EntityKey::new(entity_type, EntityId::from(id))
}

/// Plan, execute and complete one flush
#[allow(dead_code)]
pub fn flush(conn: &Connection, ctx: &mut PersistenceContext) -> graft_store::FlushStats {
    let plan = graft_core::plan_flush(ctx, &SqliteReferenceLookup::new(conn)).expect("plan flush");
    let stats = SqliteRepo::execute_plan(conn, &plan).expect("execute plan");
    graft_core::complete_flush(ctx);
    stats
}

/// Store employee `employee_id` with info `info_id` (labelled `label`)
#[allow(dead_code)]
pub fn seed_employee_with_info(conn: &Connection, employee_id: &str, info_id: &str, label: &str) {
    let mut ctx = PersistenceContext::new(registry());
    let employee = ctx.instantiate("Employee").expect("instantiate employee");
    ctx.set_id(employee, EntityId::from(employee_id)).expect("set id");
    ctx.set_attribute(employee, "name", serde_json::json!("Ada"))
        .expect("set name");
    let info: EntityHandle = ctx.instantiate("EmployeeInfo").expect("instantiate info");
    ctx.set_id(info, EntityId::from(info_id)).expect("set id");
    ctx.set_attribute(info, "label", serde_json::json!(label))
        .expect("set label");
    ctx.associate(employee, "info", Some(info)).expect("associate");
    ctx.persist(employee).expect("persist");
    flush(conn, &mut ctx);
}
