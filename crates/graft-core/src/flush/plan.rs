use serde_json::{Map, Value};

use crate::model::EntityKey;
use crate::orphan::OrphanDelete;

/// One owning link row written for an entity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkRow {
    pub association: String,
    pub target: EntityKey,
    /// Order inside a collection; 0 for single-valued associations
    pub position: i64,
    /// At most one source may hold a link to this target through this association
    pub exclusive: bool,
}

/// Insert or update of one entity row
#[derive(Debug, Clone, PartialEq)]
pub struct RowWrite {
    pub key: EntityKey,
    pub attributes: Map<String, Value>,
    /// Full replacement of the entity's owning links; `None` leaves them as stored
    pub links: Option<Vec<LinkRow>>,
}

/// Ordered work for one flush
///
/// Executed as: orphan deletes, inserts, updates, explicit deletes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FlushPlan {
    pub orphan_deletes: Vec<OrphanDelete>,
    pub inserts: Vec<RowWrite>,
    pub updates: Vec<RowWrite>,
    pub deletes: Vec<EntityKey>,
}

impl FlushPlan {
    pub fn is_empty(&self) -> bool {
        self.orphan_deletes.is_empty()
            && self.inserts.is_empty()
            && self.updates.is_empty()
            && self.deletes.is_empty()
    }

    /// Keys of every entity this plan deletes, orphans first
    pub fn deleted_keys(&self) -> impl Iterator<Item = &EntityKey> {
        self.orphan_deletes
            .iter()
            .map(|o| &o.key)
            .chain(self.deletes.iter())
    }

    pub fn is_orphan(&self, key: &EntityKey) -> bool {
        self.orphan_deletes.iter().any(|o| &o.key == key)
    }
}
