//! Graft Core - mapping model, unit of work and orphan removal
//!
//! This crate holds everything that does not touch storage:
//! - Entity type and association descriptors, validated into a registry
//! - The persistence context (managed entities, association snapshots)
//! - The orphan-removal resolver run at flush time
//! - The flush planner that turns a context into an ordered flush plan
//!
//! Storage execution lives in `graft-store`; sessions live in `graft-engine`.

pub mod errors;
pub mod flush;
pub mod logging_facility;
pub mod model;
pub mod orphan;
pub mod policy;
pub mod uow;

#[doc(hidden)]
pub use graft_core_types::schema as __schema;

// Re-export commonly used types
pub use errors::{ExError, ExErrorKind, GraftError, Result};
pub use flush::{complete_flush, plan_flush, FlushPlan, LinkRow, OrphanDelete, RowWrite};
pub use model::{
    AssociationDescriptor, AssociationSnapshot, AttributeDescriptor, AttributeKind, Cardinality,
    Cascade, EntityHandle, EntityId, EntityKey, EntityTypeDescriptor, MappingRegistry,
};
pub use orphan::{resolve_orphans, AssociationChange, TargetState};
pub use policy::{FixedReferences, NoExternalReferences, ReferenceLookup, StoredReference};
pub use uow::{AssociationValue, LifecycleState, ManagedEntity, PersistenceContext};
