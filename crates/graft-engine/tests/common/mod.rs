use std::sync::Arc;

use graft_core::{EntityHandle, EntityId, MappingRegistry};
use graft_engine::{Session, SessionFactory, SessionFactoryConfig};
use graft_store::errors::Result;
use graft_store::mapping::parse_mapping_str;
use serde_json::json;

#[allow(dead_code)]
pub const COMPANY_MAPPING: &str =
    include_str!("../../../graft-store/tests/fixtures/company.yaml");

#[allow(dead_code)]
pub fn registry() -> Arc<MappingRegistry> {
    Arc::new(parse_mapping_str(COMPANY_MAPPING).expect("fixture mapping is valid"))
}

/// Factory over a fresh in-memory database
#[allow(dead_code)]
pub fn factory() -> SessionFactory {
    SessionFactory::with_registry(SessionFactoryConfig::in_memory(), registry())
        .expect("open session factory")
}

#[allow(dead_code)]
pub fn id(value: &str) -> EntityId {
    EntityId::from(value)
}

/// New employee `employee_id` with a new info `info_id` labelled `label`
#[allow(dead_code)]
pub fn new_employee_with_info(
    session: &mut Session<'_>,
    employee_id: &str,
    info_id: &str,
    label: &str,
) -> Result<(EntityHandle, EntityHandle)> {
    let employee = session.instantiate("Employee")?;
    session.set_id(employee, id(employee_id))?;
    session.set_attribute(employee, "name", json!("Ada"))?;
    let info = session.instantiate("EmployeeInfo")?;
    session.set_id(info, id(info_id))?;
    session.set_attribute(info, "label", json!(label))?;
    session.associate(employee, "info", Some(info))?;
    session.persist(employee)?;
    Ok((employee, info))
}

/// Commit employee `employee_id` with info `info_id` in its own unit of work
#[allow(dead_code)]
pub fn seed_employee_with_info(
    factory: &mut SessionFactory,
    employee_id: &str,
    info_id: &str,
    label: &str,
) {
    factory
        .in_transaction(|session| {
            new_employee_with_info(session, employee_id, info_id, label).map(|_| ())
        })
        .expect("seed employee with info");
}

/// Row count of a type, read outside any unit of work
#[allow(dead_code)]
pub fn stored_count(factory: &SessionFactory, entity_type: &str) -> u64 {
    graft_store::SqliteRepo::count(factory.connection(), entity_type).expect("count rows")
}
