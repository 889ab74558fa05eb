use crate::model::identity::EntityId;

/// Last synchronized state of one association of one managed entity
///
/// Captured at load time and after every successful flush; the orphan
/// resolver diffs the live association against it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssociationSnapshot {
    One(Option<EntityId>),
    /// Targets in stored link order
    Many(Vec<EntityId>),
}

impl AssociationSnapshot {
    /// Snapshot of an association that had no targets
    pub fn empty(collection: bool) -> Self {
        if collection {
            AssociationSnapshot::Many(Vec::new())
        } else {
            AssociationSnapshot::One(None)
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            AssociationSnapshot::One(id) => id.is_none(),
            AssociationSnapshot::Many(ids) => ids.is_empty(),
        }
    }

    pub fn contains(&self, id: &EntityId) -> bool {
        match self {
            AssociationSnapshot::One(current) => current.as_ref() == Some(id),
            AssociationSnapshot::Many(ids) => ids.contains(id),
        }
    }

    /// Every identity recorded, in stored order
    pub fn ids(&self) -> Vec<&EntityId> {
        match self {
            AssociationSnapshot::One(id) => id.iter().collect(),
            AssociationSnapshot::Many(ids) => ids.iter().collect(),
        }
    }
}
