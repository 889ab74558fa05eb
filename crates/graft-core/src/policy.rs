//! Reference lookup seam
//!
//! The orphan resolver knows every managed entity, but storage may still hold
//! links from entities this unit of work never loaded. A `ReferenceLookup`
//! answers which persisted links point at a given entity, so the resolver
//! can refuse to delete an orphan that is still shared.

use crate::errors::ExError;
use crate::model::EntityKey;

/// A persisted link pointing at some entity
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct StoredReference {
    pub source: EntityKey,
    pub association: String,
}

/// Lookup of persisted references to an entity
///
/// Implementations only report owning links; inverse sides are never stored.
pub trait ReferenceLookup {
    /// All persisted links whose target is `target`
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying storage cannot be read.
    #[allow(clippy::result_large_err)]
    fn references_to(&self, target: &EntityKey)
        -> std::result::Result<Vec<StoredReference>, ExError>;
}

/// Lookup for contexts without storage (or tests): nothing is referenced
///
/// # Example
/// ```
/// use graft_core::model::{EntityId, EntityKey};
/// use graft_core::policy::{NoExternalReferences, ReferenceLookup};
///
/// let lookup = NoExternalReferences;
/// let key = EntityKey::new("EmployeeInfo", EntityId::new("i1"));
/// assert!(lookup.references_to(&key).unwrap().is_empty());
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct NoExternalReferences;

impl ReferenceLookup for NoExternalReferences {
    fn references_to(
        &self,
        _target: &EntityKey,
    ) -> std::result::Result<Vec<StoredReference>, ExError> {
        Ok(Vec::new())
    }
}

/// Lookup answering from a fixed list of links
///
/// Used to model rows written by other units of work.
#[derive(Debug, Clone, Default)]
pub struct FixedReferences {
    links: Vec<(EntityKey, StoredReference)>,
}

impl FixedReferences {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `source.association` points at `target`
    pub fn with_link(
        mut self,
        source: EntityKey,
        association: impl Into<String>,
        target: EntityKey,
    ) -> Self {
        self.links.push((
            target,
            StoredReference {
                source,
                association: association.into(),
            },
        ));
        self
    }
}

impl ReferenceLookup for FixedReferences {
    fn references_to(
        &self,
        target: &EntityKey,
    ) -> std::result::Result<Vec<StoredReference>, ExError> {
        Ok(self
            .links
            .iter()
            .filter(|(t, _)| t == target)
            .map(|(_, r)| r.clone())
            .collect())
    }
}
