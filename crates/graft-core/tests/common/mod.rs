use std::sync::Arc;

use graft_core::{
    AssociationDescriptor, AttributeDescriptor, AttributeKind, Cardinality, Cascade, EntityHandle,
    EntityId, EntityTypeDescriptor, MappingRegistry, PersistenceContext,
};
use serde_json::Map;

/// Employee <-> EmployeeInfo one-to-one with orphan removal on the
/// non-owning side, plus a few types used by the edge-case tests
#[allow(dead_code)]
pub fn mapping() -> Vec<EntityTypeDescriptor> {
    vec![
        EntityTypeDescriptor::new("Employee")
            .with_attribute(AttributeDescriptor::new("name", AttributeKind::Text))
            .with_association(
                AssociationDescriptor::new("info", "EmployeeInfo", Cardinality::OneToOne)
                    .mapped_by("employee")
                    .orphan_removal()
                    .cascade(Cascade::all()),
            ),
        EntityTypeDescriptor::new("EmployeeInfo")
            .with_attribute(AttributeDescriptor::new("label", AttributeKind::Text))
            .with_association(
                AssociationDescriptor::new("employee", "Employee", Cardinality::OneToOne)
                    .with_inverse("info"),
            ),
        EntityTypeDescriptor::new("Badge").with_association(AssociationDescriptor::new(
            "info",
            "EmployeeInfo",
            Cardinality::OneToOne,
        )),
        EntityTypeDescriptor::new("Department")
            .with_attribute(AttributeDescriptor::new("name", AttributeKind::Text).required())
            .with_association(
                AssociationDescriptor::new("positions", "Position", Cardinality::OneToMany)
                    .orphan_removal()
                    .cascade(Cascade {
                        persist: true,
                        remove: false,
                    }),
            ),
        EntityTypeDescriptor::new("Position")
            .with_attribute(AttributeDescriptor::new("title", AttributeKind::Text))
            .with_association(
                AssociationDescriptor::new("desk", "Desk", Cardinality::OneToOne)
                    .cascade(Cascade::all()),
            ),
        EntityTypeDescriptor::new("Desk"),
    ]
}

#[allow(dead_code)]
pub fn registry() -> Arc<MappingRegistry> {
    Arc::new(MappingRegistry::new(mapping()).expect("fixture mapping is valid"))
}

#[allow(dead_code)]
pub fn new_context() -> PersistenceContext {
    PersistenceContext::new(registry())
}

/// Register a row as if it had been read from storage
#[allow(dead_code)]
pub fn load(ctx: &mut PersistenceContext, entity_type: &str, id: &str) -> EntityHandle {
    ctx.register_loaded(entity_type, EntityId::from(id), Map::new())
        .expect("register loaded entity")
}

/// A stored Employee `employee_id` with its EmployeeInfo `info_id`, both sides loaded
#[allow(dead_code)]
pub fn loaded_employee_with_info(
    ctx: &mut PersistenceContext,
    employee_id: &str,
    info_id: &str,
) -> (EntityHandle, EntityHandle) {
    let employee = load(ctx, "Employee", employee_id);
    let info = load(ctx, "EmployeeInfo", info_id);
    ctx.load_association(employee, "info", vec![info])
        .expect("load inverse side");
    ctx.load_association(info, "employee", vec![employee])
        .expect("load owning side");
    (employee, info)
}
