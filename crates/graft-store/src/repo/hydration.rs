//! Hydration: load stored entities into a persistence context
//!
//! Loading is eager. Starting from one row, every entity reachable through
//! an association is registered, so the graph is read at most once per
//! context; entities already managed are reused through the identity map.

#![allow(clippy::result_large_err)]

use std::collections::VecDeque;

use crate::errors::Result;
use crate::repo::sqlite_repo::SqliteRepo;
use graft_core::model::{EntityHandle, EntityKey};
use graft_core::uow::PersistenceContext;
use rusqlite::Connection;

/// Load `key` and everything reachable from it
///
/// Returns the handle of `key`, or `None` when no such row is stored and the
/// context does not already manage it.
pub fn load_graph(
    conn: &Connection,
    context: &mut PersistenceContext,
    key: &EntityKey,
) -> Result<Option<EntityHandle>> {
    if let Some(handle) = context.lookup(key) {
        return Ok(Some(handle));
    }
    let Some(root) = register_row(conn, context, key)? else {
        return Ok(None);
    };

    let mut pending = VecDeque::from([(root, key.clone())]);
    while let Some((handle, source)) = pending.pop_front() {
        let descriptor = context.registry().entity_type(&source.entity_type)?.clone();

        for association in &descriptor.associations {
            let target_keys = if association.owning {
                SqliteRepo::outgoing_links(conn, &source, &association.name)?
            } else {
                let Some(inverse) = association.inverse.as_deref() else {
                    continue;
                };
                SqliteRepo::incoming_links(conn, &source, &association.target_type, inverse)?
            };

            let mut targets = Vec::with_capacity(target_keys.len());
            for target_key in target_keys {
                let target = match context.lookup(&target_key) {
                    Some(target) => {
                        if context.entity(target)?.is_removed() {
                            continue;
                        }
                        target
                    }
                    None => match register_row(conn, context, &target_key)? {
                        Some(target) => {
                            pending.push_back((target, target_key));
                            target
                        }
                        None => continue,
                    },
                };
                targets.push(target);
            }
            context.load_association(handle, &association.name, targets)?;
        }
    }

    tracing::debug!(
        op = "load_graph",
        entity_type = %key.entity_type,
        entity_id = %key.id,
        "entity graph loaded"
    );
    Ok(Some(root))
}

/// Register the stored row for `key`, without its associations
fn register_row(
    conn: &Connection,
    context: &mut PersistenceContext,
    key: &EntityKey,
) -> Result<Option<EntityHandle>> {
    let Some(row) = SqliteRepo::load_row(conn, key)? else {
        return Ok(None);
    };
    let handle = context.register_loaded(&key.entity_type, key.id.clone(), row.attributes)?;
    Ok(Some(handle))
}
