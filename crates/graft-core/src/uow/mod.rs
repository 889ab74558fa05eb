//! Unit of work: the persistence context and its managed entities

pub mod context;
pub mod entity;

pub use context::PersistenceContext;
pub use entity::{AssociationValue, LifecycleState, ManagedEntity};
