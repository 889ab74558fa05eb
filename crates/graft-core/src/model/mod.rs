pub mod descriptor;
pub mod identity;
pub mod registry;
pub mod snapshot;

pub use descriptor::{
    AssociationDescriptor, AttributeDescriptor, AttributeKind, Cardinality, Cascade,
    EntityTypeDescriptor,
};
pub use identity::{EntityHandle, EntityId, EntityKey};
pub use registry::MappingRegistry;
pub use snapshot::AssociationSnapshot;
