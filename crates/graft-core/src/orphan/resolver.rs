#![allow(clippy::result_large_err)]

use std::collections::BTreeSet;

use crate::errors::{ExError, GraftError};
use crate::model::{EntityHandle, EntityKey};
use crate::orphan::change::{AssociationChange, TargetState};
use crate::policy::ReferenceLookup;
use crate::uow::{AssociationValue, LifecycleState, ManagedEntity, PersistenceContext};

/// A delete scheduled because an orphan-removal association abandoned it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrphanDelete {
    pub key: EntityKey,
    /// The entity whose association let go of the orphan
    pub owner: EntityKey,
    pub association: String,
}

/// Find every entity abandoned by an orphan-removal association
///
/// Owners (removed ones included) are visited in handle order, their
/// orphan-removal associations in name order and abandoned identities in
/// identity order. Targets already removed in this unit of work, or already
/// scheduled by an earlier owner, are skipped.
///
/// The context is not modified; the flush planner marks the returned
/// orphans removed.
///
/// # Errors
///
/// Returns `ConfigurationViolation` when an orphan is still referenced by a
/// managed association other than the one that abandoned it, or by a stored
/// link from an entity this unit of work does not manage.
pub fn resolve_orphans(
    context: &PersistenceContext,
    lookup: &dyn ReferenceLookup,
) -> Result<Vec<OrphanDelete>, ExError> {
    let registry = context.registry();
    let mut scheduled: BTreeSet<EntityKey> = BTreeSet::new();
    let mut orphans = Vec::new();

    for owner in context.managed() {
        // A removed owner still abandons whatever it let go of before removal;
        // its remaining targets are covered by the remove cascade.
        if owner.state() == LifecycleState::Transient {
            continue;
        }
        let Some(owner_key) = owner.key() else {
            continue;
        };
        let descriptor = registry.entity_type(owner.entity_type())?;
        let mut associations: Vec<_> = descriptor.orphan_removal_associations().collect();
        associations.sort_by(|a, b| a.name.cmp(&b.name));

        for association in associations {
            let current = owner
                .association(&association.name)
                .map(|value| target_states(context, value))
                .unwrap_or_default();
            let change = AssociationChange::diff(
                owner.snapshot(&association.name),
                &current,
                association.is_collection(),
            );

            for id in change.orphaned() {
                let key = EntityKey::new(association.target_type.clone(), id.clone());
                if scheduled.contains(&key) {
                    continue;
                }
                let handle = context.lookup(&key);
                if let Some(handle) = handle {
                    if context.entity(handle)?.is_removed() {
                        continue;
                    }
                }

                ensure_exclusive(
                    context,
                    lookup,
                    &key,
                    handle,
                    owner,
                    &association.name,
                    &scheduled,
                )?;

                tracing::debug!(
                    op = "resolve_orphans",
                    entity_type = %key.entity_type,
                    entity_id = %key.id,
                    association = %format!("{}.{}", owner.entity_type(), association.name),
                    "orphan scheduled for delete"
                );
                scheduled.insert(key.clone());
                orphans.push(OrphanDelete {
                    key,
                    owner: owner_key.clone(),
                    association: association.name.clone(),
                });
            }
        }
    }

    Ok(orphans)
}

fn target_states(context: &PersistenceContext, value: &AssociationValue) -> Vec<TargetState> {
    value
        .handles()
        .into_iter()
        .map(|handle| match context.entity(handle) {
            Err(_) => TargetState::Absent,
            Ok(entity) => match entity.id() {
                Some(id) => TargetState::Saved(id.clone()),
                None => TargetState::Unsaved,
            },
        })
        .collect()
}

/// The abandoning association must have been the orphan's only referrer
fn ensure_exclusive(
    context: &PersistenceContext,
    lookup: &dyn ReferenceLookup,
    orphan: &EntityKey,
    orphan_handle: Option<EntityHandle>,
    owner: &ManagedEntity,
    association: &str,
    scheduled: &BTreeSet<EntityKey>,
) -> Result<(), ExError> {
    if let Some(orphan_handle) = orphan_handle {
        for other in context.managed() {
            if other.handle() == orphan_handle
                || !matches!(other.state(), LifecycleState::New | LifecycleState::Persistent)
            {
                continue;
            }
            for (name, value) in &other.associations {
                if other.handle() == owner.handle() && name == association {
                    continue;
                }
                if value.contains(orphan_handle) {
                    let referenced_by = match other.key() {
                        Some(key) => format!("{}.{}", key, name),
                        None => format!("{}{}.{}", other.entity_type(), other.handle(), name),
                    };
                    return Err(violation(orphan, owner, association, referenced_by));
                }
            }
        }
    }

    for reference in lookup.references_to(orphan)? {
        let managed = context.lookup(&reference.source).is_some();
        if managed || scheduled.contains(&reference.source) {
            continue;
        }
        let referenced_by = format!("{}.{}", reference.source, reference.association);
        return Err(violation(orphan, owner, association, referenced_by));
    }
    Ok(())
}

fn violation(
    orphan: &EntityKey,
    owner: &ManagedEntity,
    association: &str,
    referenced_by: String,
) -> ExError {
    GraftError::ConfigurationViolation {
        entity_type: orphan.entity_type.clone(),
        entity_id: orphan.id.to_string(),
        owner_type: owner.entity_type().to_string(),
        association: association.to_string(),
        referenced_by,
    }
    .into()
}
