#![allow(clippy::result_large_err)]

use std::collections::HashSet;

use crate::errors::{ExError, GraftError};
use crate::flush::plan::{FlushPlan, LinkRow, RowWrite};
use crate::model::{AssociationSnapshot, EntityId, EntityKey};
use crate::orphan::{resolve_orphans, OrphanDelete};
use crate::policy::ReferenceLookup;
use crate::uow::{LifecycleState, ManagedEntity, PersistenceContext};

/// Build the plan for the next flush
///
/// Steps, in order: cascade persist, transient reference check, required
/// attribute check, orphan resolution, removal of orphans (cascading), then
/// row writes for new and changed entities and deletes for removed ones.
///
/// Orphans and everything their removal cascades to land in
/// `orphan_deletes`; explicit removals land in `deletes`.
///
/// # Errors
///
/// Returns `TransientReference`, `AttributeViolation`, a
/// `ConfigurationViolation` from the resolver, or any lookup error. Nothing
/// is marked removed unless orphan resolution succeeded.
pub fn plan_flush(
    context: &mut PersistenceContext,
    lookup: &dyn ReferenceLookup,
) -> Result<FlushPlan, ExError> {
    context.cascade_persist_all()?;
    check_transient_references(context)?;
    check_required_attributes(context)?;

    let resolved = resolve_orphans(context, lookup)?;
    let orphan_deletes = remove_orphans(context, resolved)?;
    let orphan_keys: HashSet<&EntityKey> = orphan_deletes.iter().map(|o| &o.key).collect();

    let mut plan = FlushPlan::default();
    for entity in context.managed() {
        match entity.state() {
            LifecycleState::Transient => {}
            LifecycleState::New => {
                let key = entity_key(entity)?;
                plan.inserts.push(RowWrite {
                    key,
                    attributes: entity.attributes().clone(),
                    links: Some(owning_links(context, entity)?),
                });
            }
            LifecycleState::Persistent => {
                let links = owning_links(context, entity)?;
                let links_changed = links_differ(context, entity, &links)?;
                if entity.is_dirty() || links_changed {
                    plan.updates.push(RowWrite {
                        key: entity_key(entity)?,
                        attributes: entity.attributes().clone(),
                        links: links_changed.then_some(links),
                    });
                }
            }
            LifecycleState::Removed => {
                let key = entity_key(entity)?;
                if entity.is_stored() && !orphan_keys.contains(&key) {
                    plan.deletes.push(key);
                }
            }
        }
    }
    plan.orphan_deletes = orphan_deletes;
    Ok(plan)
}

/// Resynchronize the context once a plan has been executed
///
/// Removed entities are dropped, new ones become persistent and every
/// snapshot is re-captured, so planning again without changes yields an
/// empty plan.
pub fn complete_flush(context: &mut PersistenceContext) {
    context.synchronize();
}

fn entity_key(entity: &ManagedEntity) -> Result<EntityKey, ExError> {
    entity.key().ok_or_else(|| {
        GraftError::Internal {
            message: format!(
                "{} {} is scheduled without an identity",
                entity.entity_type(),
                entity.handle()
            ),
        }
        .into()
    })
}

fn check_transient_references(context: &PersistenceContext) -> Result<(), ExError> {
    for entity in context.managed() {
        if !matches!(entity.state(), LifecycleState::New | LifecycleState::Persistent) {
            continue;
        }
        for (name, value) in &entity.associations {
            for target in value.handles() {
                let Ok(target_entity) = context.entity(target) else {
                    continue;
                };
                if target_entity.state() == LifecycleState::Transient {
                    return Err(GraftError::TransientReference {
                        entity_type: entity.entity_type().to_string(),
                        association: name.clone(),
                        target_type: target_entity.entity_type().to_string(),
                    }
                    .into());
                }
            }
        }
    }
    Ok(())
}

fn check_required_attributes(context: &PersistenceContext) -> Result<(), ExError> {
    let registry = context.registry();
    for entity in context.managed() {
        let needs_check = match entity.state() {
            LifecycleState::New => true,
            LifecycleState::Persistent => entity.is_dirty(),
            LifecycleState::Transient | LifecycleState::Removed => false,
        };
        if !needs_check {
            continue;
        }
        let descriptor = registry.entity_type(entity.entity_type())?;
        for attribute in descriptor.attributes.iter().filter(|a| !a.nullable) {
            let present = entity
                .attributes()
                .get(&attribute.name)
                .is_some_and(|v| !v.is_null());
            if !present {
                let mut err: ExError = GraftError::AttributeViolation {
                    entity_type: entity.entity_type().to_string(),
                    attribute: attribute.name.clone(),
                    reason: "required attribute is null".to_string(),
                }
                .into();
                if let Some(id) = entity.id() {
                    err = err.with_entity_id(id.to_string());
                }
                return Err(err);
            }
        }
    }
    Ok(())
}

/// Mark orphans removed and collect the cascaded removals behind them
fn remove_orphans(
    context: &mut PersistenceContext,
    resolved: Vec<OrphanDelete>,
) -> Result<Vec<OrphanDelete>, ExError> {
    let mut deletes = Vec::with_capacity(resolved.len());
    let mut seen: HashSet<EntityKey> = HashSet::new();

    for orphan in resolved {
        if !seen.insert(orphan.key.clone()) {
            continue;
        }
        let Some(handle) = context.lookup(&orphan.key) else {
            deletes.push(orphan);
            continue;
        };

        let removals = context.remove_cascading(handle)?;
        deletes.push(orphan);
        for removal in removals.into_iter().filter(|r| r.handle != handle) {
            let child = context.entity(removal.handle)?;
            if !child.is_stored() {
                continue;
            }
            let Some((parent, association)) = removal.cause else {
                continue;
            };
            let child_key = entity_key(child)?;
            let parent_key = entity_key(context.entity(parent)?)?;
            if seen.insert(child_key.clone()) {
                deletes.push(OrphanDelete {
                    key: child_key,
                    owner: parent_key,
                    association,
                });
            }
        }
    }
    Ok(deletes)
}

/// Owning links of an entity as they should be stored after this flush
///
/// Links to removed targets are dropped.
fn owning_links(
    context: &PersistenceContext,
    entity: &ManagedEntity,
) -> Result<Vec<LinkRow>, ExError> {
    let descriptor = context.registry().entity_type(entity.entity_type())?;
    let mut associations: Vec<_> = descriptor.owning_associations().collect();
    associations.sort_by(|a, b| a.name.cmp(&b.name));

    let mut links = Vec::new();
    for association in associations {
        let Some(value) = entity.association(&association.name) else {
            continue;
        };
        let mut position = 0;
        for target in value.handles() {
            let Ok(target_entity) = context.entity(target) else {
                continue;
            };
            if target_entity.is_removed() {
                continue;
            }
            links.push(LinkRow {
                association: association.name.clone(),
                target: entity_key(target_entity)?,
                position,
                exclusive: association.exclusive_link(),
            });
            position += 1;
        }
    }
    Ok(links)
}

/// True when the owning links, order included, no longer match the snapshot
fn links_differ(
    context: &PersistenceContext,
    entity: &ManagedEntity,
    links: &[LinkRow],
) -> Result<bool, ExError> {
    let descriptor = context.registry().entity_type(entity.entity_type())?;
    for association in descriptor.owning_associations() {
        let current: Vec<&EntityId> = links
            .iter()
            .filter(|l| l.association == association.name)
            .map(|l| &l.target.id)
            .collect();
        let stored: Vec<&EntityId> = entity
            .snapshot(&association.name)
            .map(AssociationSnapshot::ids)
            .unwrap_or_default();
        if current != stored {
            return Ok(true);
        }
    }
    Ok(false)
}
