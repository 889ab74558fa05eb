use std::collections::BTreeSet;

use crate::model::{AssociationSnapshot, EntityId};

/// What a live association target looks like at flush time
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetState {
    /// The handle no longer resolves to a managed entity
    Absent,
    /// Managed but never persisted, so it has no identity yet
    Unsaved,
    Saved(EntityId),
}

impl TargetState {
    fn id(&self) -> Option<&EntityId> {
        match self {
            TargetState::Saved(id) => Some(id),
            TargetState::Absent | TargetState::Unsaved => None,
        }
    }
}

/// Difference between an association snapshot and its live value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssociationChange {
    Unchanged,
    /// A target appeared where the snapshot had none
    Assigned,
    Cleared { previous: EntityId },
    Replaced { previous: EntityId },
    /// Collection lost members
    Shrunk { removed: Vec<EntityId> },
}

impl AssociationChange {
    /// Compare a single-valued association
    pub fn single(snapshot: Option<&EntityId>, current: Option<&TargetState>) -> Self {
        let current = current.filter(|t| **t != TargetState::Absent);
        match (snapshot, current) {
            (None, None) => AssociationChange::Unchanged,
            (None, Some(_)) => AssociationChange::Assigned,
            (Some(previous), None) => AssociationChange::Cleared {
                previous: previous.clone(),
            },
            (Some(previous), Some(target)) => {
                if target.id() == Some(previous) {
                    AssociationChange::Unchanged
                } else {
                    AssociationChange::Replaced {
                        previous: previous.clone(),
                    }
                }
            }
        }
    }

    /// Compare a collection-valued association
    ///
    /// Order of the snapshot does not matter; removals are reported sorted.
    pub fn collection(snapshot: &[EntityId], current: &[TargetState]) -> Self {
        let live: BTreeSet<&EntityId> = current.iter().filter_map(TargetState::id).collect();
        let removed: BTreeSet<&EntityId> =
            snapshot.iter().filter(|id| !live.contains(id)).collect();
        let removed: Vec<EntityId> = removed.into_iter().cloned().collect();

        if !removed.is_empty() {
            return AssociationChange::Shrunk { removed };
        }
        let grew = current.iter().any(|t| match t {
            TargetState::Saved(id) => !snapshot.contains(id),
            TargetState::Unsaved => true,
            TargetState::Absent => false,
        });
        if grew {
            AssociationChange::Assigned
        } else {
            AssociationChange::Unchanged
        }
    }

    /// Compare any association; a missing snapshot counts as empty
    pub fn diff(
        snapshot: Option<&AssociationSnapshot>,
        current: &[TargetState],
        collection: bool,
    ) -> Self {
        if collection {
            let ids: &[EntityId] = match snapshot {
                Some(AssociationSnapshot::Many(ids)) => ids,
                _ => &[],
            };
            Self::collection(ids, current)
        } else {
            let previous = match snapshot {
                Some(AssociationSnapshot::One(id)) => id.as_ref(),
                _ => None,
            };
            Self::single(previous, current.first())
        }
    }

    /// Identities abandoned by this change, in identity order
    pub fn orphaned(&self) -> Vec<&EntityId> {
        match self {
            AssociationChange::Cleared { previous } | AssociationChange::Replaced { previous } => {
                vec![previous]
            }
            AssociationChange::Shrunk { removed } => removed.iter().collect(),
            AssociationChange::Unchanged | AssociationChange::Assigned => Vec::new(),
        }
    }
}
