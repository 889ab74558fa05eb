use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::Arc;

use serde_json::{Map, Value};

use crate::errors::{GraftError, Result};
use crate::model::{
    AssociationDescriptor, AssociationSnapshot, EntityHandle, EntityId, EntityKey,
    MappingRegistry,
};
use crate::uow::entity::{AssociationValue, LifecycleState, ManagedEntity};

/// One entity marked removed by a (possibly cascading) remove
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Removal {
    pub handle: EntityHandle,
    /// Entity and association the removal cascaded through
    pub cause: Option<(EntityHandle, String)>,
}

/// The unit-of-work arena of managed entities
///
/// Entities reference each other by handle only. The identity map
/// guarantees one managed instance per `(entity_type, id)`.
#[derive(Debug)]
pub struct PersistenceContext {
    registry: Arc<MappingRegistry>,
    entities: Vec<Option<ManagedEntity>>,
    identity_map: HashMap<EntityKey, EntityHandle>,
}

impl PersistenceContext {
    pub fn new(registry: Arc<MappingRegistry>) -> Self {
        Self {
            registry,
            entities: Vec::new(),
            identity_map: HashMap::new(),
        }
    }

    pub fn registry(&self) -> &MappingRegistry {
        &self.registry
    }

    /// Get a managed entity
    ///
    /// # Errors
    ///
    /// Returns `NotManaged` if the handle was never issued by this context or
    /// the entity has been dropped after a flushed delete.
    pub fn entity(&self, handle: EntityHandle) -> Result<&ManagedEntity> {
        self.entities
            .get(handle.0)
            .and_then(Option::as_ref)
            .ok_or(GraftError::NotManaged { handle: handle.0 })
    }

    fn entity_mut(&mut self, handle: EntityHandle) -> Result<&mut ManagedEntity> {
        self.entities
            .get_mut(handle.0)
            .and_then(Option::as_mut)
            .ok_or(GraftError::NotManaged { handle: handle.0 })
    }

    /// Managed entity that is not scheduled for removal
    fn active(&self, handle: EntityHandle) -> Result<&ManagedEntity> {
        let entity = self.entity(handle)?;
        if entity.is_removed() {
            return Err(removed_error(entity));
        }
        Ok(entity)
    }

    /// Handles of every managed entity, in issue order
    pub fn handles(&self) -> Vec<EntityHandle> {
        self.managed().map(|e| e.handle).collect()
    }

    pub fn managed(&self) -> impl Iterator<Item = &ManagedEntity> {
        self.entities.iter().filter_map(Option::as_ref)
    }

    /// Identity map lookup
    pub fn lookup(&self, key: &EntityKey) -> Option<EntityHandle> {
        self.identity_map.get(key).copied()
    }

    pub fn len(&self) -> usize {
        self.managed().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // ===== Lifecycle =====

    /// Create a transient instance of a mapped type
    ///
    /// # Errors
    ///
    /// Returns `UnknownEntityType` if the type is not mapped.
    pub fn instantiate(&mut self, entity_type: &str) -> Result<EntityHandle> {
        let descriptor = self.registry.entity_type(entity_type)?;
        let associations = descriptor
            .associations
            .iter()
            .map(|a| (a.name.clone(), AssociationValue::empty(a.is_collection())))
            .collect();

        let handle = EntityHandle(self.entities.len());
        self.entities.push(Some(ManagedEntity {
            handle,
            entity_type: entity_type.to_string(),
            id: None,
            state: LifecycleState::Transient,
            stored: false,
            attributes: Map::new(),
            associations,
            snapshots: BTreeMap::new(),
            dirty: false,
        }));
        Ok(handle)
    }

    /// Assign the identity of a transient instance
    ///
    /// # Errors
    ///
    /// Returns `IdentityImmutable` once the entity has been persisted.
    pub fn set_id(&mut self, handle: EntityHandle, id: EntityId) -> Result<()> {
        let entity = self.entity_mut(handle)?;
        if entity.state != LifecycleState::Transient {
            return Err(GraftError::IdentityImmutable {
                entity_type: entity.entity_type.clone(),
                entity_id: entity
                    .id
                    .as_ref()
                    .map(ToString::to_string)
                    .unwrap_or_default(),
            });
        }
        entity.id = Some(id);
        Ok(())
    }

    /// Schedule an entity for insert and cascade along `persist` associations
    ///
    /// Persisting a removed entity cancels its removal. Persisting a managed
    /// entity only cascades.
    ///
    /// # Errors
    ///
    /// Returns `DuplicateIdentity` if another managed entity already has the
    /// same key.
    pub fn persist(&mut self, handle: EntityHandle) -> Result<()> {
        let registry = Arc::clone(&self.registry);
        let mut pending = vec![handle];

        while let Some(current) = pending.pop() {
            let state = self.entity(current)?.state;
            match state {
                LifecycleState::Transient => self.assign_identity(current)?,
                LifecycleState::Removed => {
                    let entity = self.entity_mut(current)?;
                    entity.state = if entity.stored {
                        LifecycleState::Persistent
                    } else {
                        LifecycleState::New
                    };
                }
                LifecycleState::New | LifecycleState::Persistent => {}
            }

            let entity = self.entity(current)?;
            let descriptor = registry.entity_type(&entity.entity_type)?;
            for association in descriptor.associations.iter().filter(|a| a.cascades_persist()) {
                let Some(value) = entity.associations.get(&association.name) else {
                    continue;
                };
                for target in value.handles() {
                    let target_state = self.entity(target)?.state;
                    if matches!(
                        target_state,
                        LifecycleState::Transient | LifecycleState::Removed
                    ) {
                        pending.push(target);
                    }
                }
            }
        }
        Ok(())
    }

    fn assign_identity(&mut self, handle: EntityHandle) -> Result<()> {
        let entity = self.entity(handle)?;
        let id = entity.id.clone().unwrap_or_else(EntityId::generate);
        let key = EntityKey::new(entity.entity_type.clone(), id.clone());
        if let Some(existing) = self.identity_map.get(&key) {
            if *existing != handle {
                return Err(GraftError::DuplicateIdentity {
                    entity_type: key.entity_type,
                    entity_id: key.id.to_string(),
                });
            }
        }

        self.identity_map.insert(key, handle);
        let entity = self.entity_mut(handle)?;
        entity.id = Some(id);
        entity.state = LifecycleState::New;
        entity.dirty = true;
        Ok(())
    }

    /// Register an entity read from storage
    ///
    /// Associations start empty; fill them with `load_association`.
    ///
    /// # Errors
    ///
    /// Returns `DuplicateIdentity` if the key is already managed; callers
    /// check `lookup` first.
    pub fn register_loaded(
        &mut self,
        entity_type: &str,
        id: EntityId,
        attributes: Map<String, Value>,
    ) -> Result<EntityHandle> {
        let key = EntityKey::new(entity_type, id.clone());
        if self.identity_map.contains_key(&key) {
            return Err(GraftError::DuplicateIdentity {
                entity_type: entity_type.to_string(),
                entity_id: id.to_string(),
            });
        }

        let handle = self.instantiate(entity_type)?;
        let registry = Arc::clone(&self.registry);
        let descriptor = registry.entity_type(entity_type)?;
        let entity = self.entity_mut(handle)?;
        entity.id = Some(id);
        entity.state = LifecycleState::Persistent;
        entity.stored = true;
        entity.attributes = attributes;
        entity.snapshots = descriptor
            .associations
            .iter()
            .map(|a| (a.name.clone(), AssociationSnapshot::empty(a.is_collection())))
            .collect();
        self.identity_map.insert(key, handle);
        Ok(handle)
    }

    /// Set an association of a loaded entity together with its snapshot
    ///
    /// # Errors
    ///
    /// Returns `InverseNotUnique` when a single-valued association is given
    /// more than one target, and the usual target validation errors.
    pub fn load_association(
        &mut self,
        handle: EntityHandle,
        name: &str,
        targets: Vec<EntityHandle>,
    ) -> Result<()> {
        let registry = Arc::clone(&self.registry);
        let entity = self.entity(handle)?;
        let descriptor = registry.association(&entity.entity_type, name)?;

        if !descriptor.is_collection() && targets.len() > 1 {
            return Err(GraftError::InverseNotUnique {
                entity_type: entity.entity_type.clone(),
                entity_id: entity.id.as_ref().map(ToString::to_string).unwrap_or_default(),
                association: name.to_string(),
            });
        }

        let mut ids = Vec::with_capacity(targets.len());
        for target in &targets {
            self.check_target(&entity.entity_type, descriptor, *target)?;
            let target_entity = self.entity(*target)?;
            let id = target_entity
                .id
                .clone()
                .ok_or_else(|| GraftError::TransientReference {
                    entity_type: entity.entity_type.clone(),
                    association: name.to_string(),
                    target_type: target_entity.entity_type.clone(),
                })?;
            ids.push(id);
        }

        let (value, snapshot) = if descriptor.is_collection() {
            (
                AssociationValue::Many(targets),
                AssociationSnapshot::Many(ids.into_iter().collect()),
            )
        } else {
            (
                AssociationValue::One(targets.first().copied()),
                AssociationSnapshot::One(ids.into_iter().next()),
            )
        };

        let entity = self.entity_mut(handle)?;
        entity.associations.insert(name.to_string(), value);
        entity.snapshots.insert(name.to_string(), snapshot);
        Ok(())
    }

    /// Mark an entity removed, cascading along `remove` associations
    ///
    /// Removing a transient or already removed entity is a no-op.
    ///
    /// # Errors
    ///
    /// Returns `NotManaged` for an unknown handle.
    pub fn remove(&mut self, handle: EntityHandle) -> Result<()> {
        self.remove_cascading(handle).map(|_| ())
    }

    /// Breadth-first removal; reports every entity newly marked removed
    pub(crate) fn remove_cascading(&mut self, handle: EntityHandle) -> Result<Vec<Removal>> {
        let registry = Arc::clone(&self.registry);
        let mut removed = Vec::new();
        let mut pending = VecDeque::from([(handle, None)]);

        while let Some((current, cause)) = pending.pop_front() {
            let entity = self.entity_mut(current)?;
            match entity.state {
                LifecycleState::Transient | LifecycleState::Removed => continue,
                LifecycleState::New | LifecycleState::Persistent => {
                    entity.state = LifecycleState::Removed;
                }
            }
            removed.push(Removal {
                handle: current,
                cause,
            });

            let entity = self.entity(current)?;
            for (name, value) in &entity.associations {
                let descriptor = registry.association(&entity.entity_type, name)?;
                if !descriptor.cascades_remove() {
                    continue;
                }
                for target in value.handles() {
                    pending.push_back((target, Some((current, name.clone()))));
                }
            }
        }
        Ok(removed)
    }

    /// Cascade persist from every scheduled entity (first flush step)
    pub(crate) fn cascade_persist_all(&mut self) -> Result<()> {
        for handle in self.handles() {
            let state = self.entity(handle)?.state;
            if matches!(state, LifecycleState::New | LifecycleState::Persistent) {
                self.persist(handle)?;
            }
        }
        Ok(())
    }

    // ===== Attributes =====

    /// Set an attribute value
    ///
    /// # Errors
    ///
    /// Returns `UnknownAttribute`, `AttributeViolation` when the value does
    /// not match the declared kind, or `EntityRemoved`.
    pub fn set_attribute(&mut self, handle: EntityHandle, name: &str, value: Value) -> Result<()> {
        let registry = Arc::clone(&self.registry);
        let entity = self.active(handle)?;
        let descriptor = registry.entity_type(&entity.entity_type)?;
        let attribute = descriptor
            .attribute(name)
            .ok_or_else(|| GraftError::UnknownAttribute {
                entity_type: entity.entity_type.clone(),
                attribute: name.to_string(),
            })?;
        if !attribute.kind.accepts(&value) {
            return Err(GraftError::AttributeViolation {
                entity_type: entity.entity_type.clone(),
                attribute: name.to_string(),
                reason: format!("expected {:?} value", attribute.kind),
            });
        }

        let entity = self.entity_mut(handle)?;
        if entity.attributes.get(name) != Some(&value) {
            entity.attributes.insert(name.to_string(), value);
            entity.dirty = true;
        }
        Ok(())
    }

    /// Read an attribute value; `None` when never set
    ///
    /// # Errors
    ///
    /// Returns `UnknownAttribute` if the attribute is not mapped.
    pub fn attribute(&self, handle: EntityHandle, name: &str) -> Result<Option<&Value>> {
        let entity = self.entity(handle)?;
        let descriptor = self.registry.entity_type(&entity.entity_type)?;
        if descriptor.attribute(name).is_none() {
            return Err(GraftError::UnknownAttribute {
                entity_type: entity.entity_type.clone(),
                attribute: name.to_string(),
            });
        }
        Ok(entity.attributes.get(name))
    }

    // ===== Associations =====

    fn check_target(
        &self,
        owner_type: &str,
        descriptor: &AssociationDescriptor,
        target: EntityHandle,
    ) -> Result<()> {
        let target_entity = self.active(target)?;
        if target_entity.entity_type != descriptor.target_type {
            return Err(GraftError::WrongTargetType {
                entity_type: owner_type.to_string(),
                association: descriptor.name.clone(),
                expected: descriptor.target_type.clone(),
                actual: target_entity.entity_type.clone(),
            });
        }
        Ok(())
    }

    fn single_valued<'r>(
        registry: &'r MappingRegistry,
        entity_type: &str,
        name: &str,
    ) -> Result<&'r AssociationDescriptor> {
        let descriptor = registry.association(entity_type, name)?;
        if descriptor.is_collection() {
            return Err(GraftError::CardinalityMismatch {
                entity_type: entity_type.to_string(),
                association: name.to_string(),
                reason: "association is collection-valued".to_string(),
            });
        }
        Ok(descriptor)
    }

    fn collection_valued<'r>(
        registry: &'r MappingRegistry,
        entity_type: &str,
        name: &str,
    ) -> Result<&'r AssociationDescriptor> {
        let descriptor = registry.association(entity_type, name)?;
        if !descriptor.is_collection() {
            return Err(GraftError::CardinalityMismatch {
                entity_type: entity_type.to_string(),
                association: name.to_string(),
                reason: "association is single-valued".to_string(),
            });
        }
        Ok(descriptor)
    }

    fn value_mut(&mut self, handle: EntityHandle, name: &str) -> Result<&mut AssociationValue> {
        let entity = self.entity_mut(handle)?;
        let entity_type = entity.entity_type.clone();
        entity
            .associations
            .get_mut(name)
            .ok_or(GraftError::UnknownAssociation {
                entity_type,
                association: name.to_string(),
            })
    }

    /// Set one side of a single-valued association
    ///
    /// The other side of a bidirectional pair is left untouched; use
    /// `associate` to maintain both.
    ///
    /// # Errors
    ///
    /// Returns `CardinalityMismatch` for collection associations and the
    /// target validation errors.
    pub fn set_association(
        &mut self,
        handle: EntityHandle,
        name: &str,
        target: Option<EntityHandle>,
    ) -> Result<()> {
        let registry = Arc::clone(&self.registry);
        let entity = self.active(handle)?;
        let descriptor = Self::single_valued(&registry, &entity.entity_type, name)?;
        if let Some(target) = target {
            self.check_target(&entity.entity_type, descriptor, target)?;
        }
        *self.value_mut(handle, name)? = AssociationValue::One(target);
        Ok(())
    }

    /// Append a target to a collection association
    ///
    /// # Errors
    ///
    /// Returns `CardinalityMismatch` for single-valued associations and the
    /// target validation errors.
    pub fn add_to_association(
        &mut self,
        handle: EntityHandle,
        name: &str,
        target: EntityHandle,
    ) -> Result<()> {
        let registry = Arc::clone(&self.registry);
        let entity = self.active(handle)?;
        let descriptor = Self::collection_valued(&registry, &entity.entity_type, name)?;
        self.check_target(&entity.entity_type, descriptor, target)?;
        self.value_mut(handle, name)?.link(target);
        Ok(())
    }

    /// Drop a target from a collection association
    ///
    /// # Errors
    ///
    /// Returns `CardinalityMismatch` for single-valued associations.
    pub fn remove_from_association(
        &mut self,
        handle: EntityHandle,
        name: &str,
        target: EntityHandle,
    ) -> Result<()> {
        let registry = Arc::clone(&self.registry);
        let entity = self.active(handle)?;
        Self::collection_valued(&registry, &entity.entity_type, name)?;
        self.value_mut(handle, name)?.unlink(target);
        Ok(())
    }

    /// Set a single-valued association and keep its counterpart consistent
    ///
    /// The previous target stops pointing back at `handle`. A new target that
    /// pointed back at some other entity is taken away from it.
    ///
    /// # Errors
    ///
    /// Same as `set_association`.
    pub fn associate(
        &mut self,
        handle: EntityHandle,
        name: &str,
        target: Option<EntityHandle>,
    ) -> Result<()> {
        let registry = Arc::clone(&self.registry);
        let entity = self.active(handle)?;
        let entity_type = entity.entity_type.clone();
        let descriptor = Self::single_valued(&registry, &entity_type, name)?;
        if let Some(target) = target {
            self.check_target(&entity_type, descriptor, target)?;
        }

        let previous = match entity.associations.get(name) {
            Some(AssociationValue::One(previous)) => *previous,
            _ => None,
        };
        if previous == target {
            return Ok(());
        }

        let inverse = registry.inverse_association(&entity_type, descriptor);

        if let (Some(previous), Some(inverse)) = (previous, inverse) {
            if self.entity(previous).is_ok() {
                self.value_mut(previous, &inverse.name)?.unlink(handle);
            }
        }

        *self.value_mut(handle, name)? = AssociationValue::One(target);

        if let (Some(target), Some(inverse)) = (target, inverse) {
            if !inverse.is_collection() {
                let displaced = match self.entity(target)?.associations.get(&inverse.name) {
                    Some(AssociationValue::One(Some(other))) if *other != handle => Some(*other),
                    _ => None,
                };
                if let Some(other) = displaced {
                    self.value_mut(other, name)?.unlink(target);
                }
            }
            self.value_mut(target, &inverse.name)?.link(handle);
        }
        Ok(())
    }

    /// Current target of a single-valued association
    ///
    /// # Errors
    ///
    /// Returns `CardinalityMismatch` for collection associations.
    pub fn association(&self, handle: EntityHandle, name: &str) -> Result<Option<EntityHandle>> {
        let entity = self.entity(handle)?;
        Self::single_valued(&self.registry, &entity.entity_type, name)?;
        Ok(match entity.associations.get(name) {
            Some(AssociationValue::One(target)) => *target,
            _ => None,
        })
    }

    /// Current targets of a collection association, in insertion order
    ///
    /// # Errors
    ///
    /// Returns `CardinalityMismatch` for single-valued associations.
    pub fn association_many(&self, handle: EntityHandle, name: &str) -> Result<Vec<EntityHandle>> {
        let entity = self.entity(handle)?;
        Self::collection_valued(&self.registry, &entity.entity_type, name)?;
        Ok(entity
            .associations
            .get(name)
            .map(AssociationValue::handles)
            .unwrap_or_default())
    }

    // ===== Flush support =====

    /// Resynchronize after a successful flush
    ///
    /// Drops removed entities, promotes new ones, clears dirty flags and
    /// re-captures every association snapshot.
    pub(crate) fn synchronize(&mut self) {
        for slot in self.entities.iter_mut() {
            let drop_slot = matches!(slot, Some(e) if e.is_removed());
            if drop_slot {
                if let Some(key) = slot.as_ref().and_then(ManagedEntity::key) {
                    self.identity_map.remove(&key);
                }
                *slot = None;
            }
        }
        self.scrub_dangling();

        let ids: Vec<Option<EntityId>> = self
            .entities
            .iter()
            .map(|slot| slot.as_ref().and_then(|e| e.id.clone()))
            .collect();

        for entity in self.entities.iter_mut().flatten() {
            if entity.state == LifecycleState::Transient {
                continue;
            }
            if entity.state == LifecycleState::New {
                entity.state = LifecycleState::Persistent;
                entity.stored = true;
            }
            entity.dirty = false;
            entity.snapshots = entity
                .associations
                .iter()
                .map(|(name, value)| {
                    let snapshot = match value {
                        AssociationValue::One(target) => AssociationSnapshot::One(
                            target.and_then(|h| ids.get(h.0).cloned().flatten()),
                        ),
                        AssociationValue::Many(targets) => AssociationSnapshot::Many(
                            targets
                                .iter()
                                .filter_map(|h| ids.get(h.0).cloned().flatten())
                                .collect(),
                        ),
                    };
                    (name.clone(), snapshot)
                })
                .collect();
        }
    }

    /// Forget every managed entity of a type whose rows were bulk deleted
    ///
    /// References to the detached entities are removed from both the live
    /// associations and the snapshots, so they never surface as orphans.
    pub fn detach_type(&mut self, entity_type: &str) -> usize {
        let mut detached_ids = Vec::new();
        for slot in self.entities.iter_mut() {
            let matches_type = matches!(slot, Some(e) if e.entity_type == entity_type);
            if matches_type {
                if let Some(key) = slot.as_ref().and_then(ManagedEntity::key) {
                    self.identity_map.remove(&key);
                    detached_ids.push(key.id);
                }
                *slot = None;
            }
        }
        self.scrub_dangling();

        let registry = Arc::clone(&self.registry);
        for entity in self.entities.iter_mut().flatten() {
            for (name, snapshot) in entity.snapshots.iter_mut() {
                let targets_type = registry
                    .association(&entity.entity_type, name)
                    .map(|a| a.target_type == entity_type)
                    .unwrap_or(false);
                if !targets_type {
                    continue;
                }
                match snapshot {
                    AssociationSnapshot::One(id) => {
                        if id.as_ref().is_some_and(|id| detached_ids.contains(id)) {
                            *id = None;
                        }
                    }
                    AssociationSnapshot::Many(ids) => ids.retain(|id| !detached_ids.contains(id)),
                }
            }
        }
        detached_ids.len()
    }

    fn scrub_dangling(&mut self) {
        let live: Vec<bool> = self.entities.iter().map(Option::is_some).collect();
        let is_live = |h: &EntityHandle| live.get(h.0).copied().unwrap_or(false);
        for entity in self.entities.iter_mut().flatten() {
            for value in entity.associations.values_mut() {
                match value {
                    AssociationValue::One(target) => {
                        if target.as_ref().is_some_and(|h| !is_live(h)) {
                            *target = None;
                        }
                    }
                    AssociationValue::Many(targets) => targets.retain(is_live),
                }
            }
        }
    }
}

fn removed_error(entity: &ManagedEntity) -> GraftError {
    GraftError::EntityRemoved {
        entity_type: entity.entity_type.clone(),
        entity_id: entity
            .id
            .as_ref()
            .map(ToString::to_string)
            .unwrap_or_default(),
    }
}
