use std::collections::BTreeMap;

use serde_json::{Map, Value};

use crate::model::{AssociationSnapshot, EntityHandle, EntityId, EntityKey};

/// Where a managed entity is in its unit-of-work lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    /// Instantiated, not yet scheduled for insert
    Transient,
    /// Scheduled for insert at the next flush
    New,
    /// Loaded from or already written to storage
    Persistent,
    /// Scheduled for delete at the next flush
    Removed,
}

/// Live value of one association
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssociationValue {
    One(Option<EntityHandle>),
    Many(Vec<EntityHandle>),
}

impl AssociationValue {
    pub fn empty(collection: bool) -> Self {
        if collection {
            AssociationValue::Many(Vec::new())
        } else {
            AssociationValue::One(None)
        }
    }

    pub fn handles(&self) -> Vec<EntityHandle> {
        match self {
            AssociationValue::One(handle) => handle.iter().copied().collect(),
            AssociationValue::Many(handles) => handles.clone(),
        }
    }

    pub fn contains(&self, handle: EntityHandle) -> bool {
        match self {
            AssociationValue::One(current) => *current == Some(handle),
            AssociationValue::Many(handles) => handles.contains(&handle),
        }
    }

    pub(crate) fn link(&mut self, handle: EntityHandle) {
        match self {
            AssociationValue::One(current) => *current = Some(handle),
            AssociationValue::Many(handles) => {
                if !handles.contains(&handle) {
                    handles.push(handle);
                }
            }
        }
    }

    pub(crate) fn unlink(&mut self, handle: EntityHandle) {
        match self {
            AssociationValue::One(current) => {
                if *current == Some(handle) {
                    *current = None;
                }
            }
            AssociationValue::Many(handles) => handles.retain(|h| *h != handle),
        }
    }
}

/// One entity instance tracked by a persistence context
#[derive(Debug, Clone)]
pub struct ManagedEntity {
    pub(crate) handle: EntityHandle,
    pub(crate) entity_type: String,
    pub(crate) id: Option<EntityId>,
    pub(crate) state: LifecycleState,
    /// A row for this identity exists in storage
    pub(crate) stored: bool,
    pub(crate) attributes: Map<String, Value>,
    pub(crate) associations: BTreeMap<String, AssociationValue>,
    pub(crate) snapshots: BTreeMap<String, AssociationSnapshot>,
    pub(crate) dirty: bool,
}

impl ManagedEntity {
    pub fn handle(&self) -> EntityHandle {
        self.handle
    }

    pub fn entity_type(&self) -> &str {
        &self.entity_type
    }

    pub fn id(&self) -> Option<&EntityId> {
        self.id.as_ref()
    }

    /// Storage key; `None` while the entity has no identity
    pub fn key(&self) -> Option<EntityKey> {
        self.id
            .as_ref()
            .map(|id| EntityKey::new(self.entity_type.clone(), id.clone()))
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    pub fn is_removed(&self) -> bool {
        self.state == LifecycleState::Removed
    }

    pub fn is_stored(&self) -> bool {
        self.stored
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn attributes(&self) -> &Map<String, Value> {
        &self.attributes
    }

    pub fn association(&self, name: &str) -> Option<&AssociationValue> {
        self.associations.get(name)
    }

    pub fn snapshot(&self, name: &str) -> Option<&AssociationSnapshot> {
        self.snapshots.get(name)
    }
}
