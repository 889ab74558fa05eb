//! Orphan-removal resolver
//!
//! At flush time every managed owner's orphan-removal associations are
//! diffed against their snapshots. Targets the owner let go of become
//! `OrphanDelete`s, which the flush plan executes before any insert.

pub mod change;
pub mod resolver;

pub use change::{AssociationChange, TargetState};
pub use resolver::{resolve_orphans, OrphanDelete};
