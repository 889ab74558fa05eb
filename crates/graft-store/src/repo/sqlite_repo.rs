//! SQLite repository
//!
//! Executes flush plans against the `entities` and `association_links`
//! tables and answers the row-level queries hydration and sessions need.
//! Every function takes a `&Connection`; pass a `Transaction` or savepoint
//! to run inside one.

#![allow(clippy::result_large_err)]

use crate::errors::{attributes_error, from_rusqlite, row_missing, Result};
use graft_core::flush::{FlushPlan, LinkRow, RowWrite};
use graft_core::model::{EntityId, EntityKey};
use graft_core::policy::StoredReference;
use rusqlite::{Connection, OptionalExtension};
use serde_json::{Map, Value};

/// SQLite repository for entity rows and association links
pub struct SqliteRepo;

/// A stored entity row
#[derive(Debug, Clone, PartialEq)]
pub struct StoredRow {
    pub key: EntityKey,
    pub attributes: Map<String, Value>,
    pub version: i64,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Row counts from executing one flush plan
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlushStats {
    pub orphans_deleted: usize,
    pub inserted: usize,
    pub updated: usize,
    pub deleted: usize,
    /// Deletes whose row was already gone
    pub stale: usize,
}

impl SqliteRepo {
    /// Execute a flush plan
    ///
    /// Order: orphan links and rows, inserted rows, updated rows, replaced
    /// and deleted links, new links, explicitly deleted rows. Orphans go
    /// first so a replacement target can take over an exclusive link slot.
    /// Deleting a row that no longer exists is absorbed.
    pub fn execute_plan(conn: &Connection, plan: &FlushPlan) -> Result<FlushStats> {
        let mut stats = FlushStats::default();
        let now = chrono::Utc::now().timestamp_millis();

        for orphan in &plan.orphan_deletes {
            Self::delete_links_touching(conn, &orphan.key)?;
        }
        for orphan in &plan.orphan_deletes {
            if Self::delete_row(conn, &orphan.key)? {
                stats.orphans_deleted += 1;
            } else {
                stats.stale += 1;
            }
        }

        for write in &plan.inserts {
            Self::insert_row(conn, write, now)?;
            stats.inserted += 1;
        }
        for write in &plan.updates {
            Self::update_row(conn, write, now)?;
            stats.updated += 1;
        }

        for write in plan.updates.iter().filter(|w| w.links.is_some()) {
            Self::delete_links_from(conn, &write.key)?;
        }
        for key in &plan.deletes {
            Self::delete_links_from(conn, key)?;
        }
        for write in plan.inserts.iter().chain(plan.updates.iter()) {
            if let Some(links) = &write.links {
                Self::insert_links(conn, &write.key, links)?;
            }
        }

        for key in &plan.deletes {
            if Self::delete_row(conn, key)? {
                stats.deleted += 1;
            } else {
                stats.stale += 1;
            }
        }

        Ok(stats)
    }

    /// Insert a new entity row (version 1)
    pub fn insert_row(conn: &Connection, write: &RowWrite, now: i64) -> Result<()> {
        let attributes = encode_attributes("insert_row", write)?;
        conn.execute(
            "INSERT INTO entities (entity_type, id, attributes, version, created_at, updated_at)
             VALUES (?1, ?2, ?3, 1, ?4, ?4)",
            rusqlite::params![write.key.entity_type, write.key.id.as_str(), attributes, now],
        )
        .map_err(from_rusqlite)?;
        Ok(())
    }

    /// Overwrite an entity's attributes and bump its version
    pub fn update_row(conn: &Connection, write: &RowWrite, now: i64) -> Result<()> {
        let attributes = encode_attributes("update_row", write)?;
        let changed = conn
            .execute(
                "UPDATE entities SET attributes = ?3, version = version + 1, updated_at = ?4
                 WHERE entity_type = ?1 AND id = ?2",
                rusqlite::params![write.key.entity_type, write.key.id.as_str(), attributes, now],
            )
            .map_err(from_rusqlite)?;
        if changed == 0 {
            return Err(row_missing("update_row", &write.key));
        }
        Ok(())
    }

    /// Delete an entity row; `false` when it was already gone
    pub fn delete_row(conn: &Connection, key: &EntityKey) -> Result<bool> {
        let deleted = conn
            .execute(
                "DELETE FROM entities WHERE entity_type = ?1 AND id = ?2",
                rusqlite::params![key.entity_type, key.id.as_str()],
            )
            .map_err(from_rusqlite)?;
        if deleted == 0 {
            tracing::debug!(
                op = "delete_row",
                entity_type = %key.entity_type,
                entity_id = %key.id,
                "stale identity, row already deleted"
            );
        }
        Ok(deleted > 0)
    }

    /// Delete every link the entity owns
    pub fn delete_links_from(conn: &Connection, source: &EntityKey) -> Result<usize> {
        conn.execute(
            "DELETE FROM association_links WHERE source_type = ?1 AND source_id = ?2",
            rusqlite::params![source.entity_type, source.id.as_str()],
        )
        .map_err(from_rusqlite)
    }

    /// Delete every link the entity owns or is the target of
    pub fn delete_links_touching(conn: &Connection, key: &EntityKey) -> Result<usize> {
        conn.execute(
            "DELETE FROM association_links
             WHERE (source_type = ?1 AND source_id = ?2)
                OR (target_type = ?1 AND target_id = ?2)",
            rusqlite::params![key.entity_type, key.id.as_str()],
        )
        .map_err(from_rusqlite)
    }

    /// Insert owning links for a source entity
    pub fn insert_links(conn: &Connection, source: &EntityKey, links: &[LinkRow]) -> Result<()> {
        let mut stmt = conn
            .prepare_cached(
                "INSERT INTO association_links
                    (source_type, source_id, association, target_type, target_id, position, exclusive)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            )
            .map_err(from_rusqlite)?;
        for link in links {
            stmt.execute(rusqlite::params![
                source.entity_type,
                source.id.as_str(),
                link.association,
                link.target.entity_type,
                link.target.id.as_str(),
                link.position,
                link.exclusive,
            ])
            .map_err(from_rusqlite)?;
        }
        Ok(())
    }

    /// Load one entity row
    pub fn load_row(conn: &Connection, key: &EntityKey) -> Result<Option<StoredRow>> {
        let row: Option<(String, i64, i64, i64)> = conn
            .query_row(
                "SELECT attributes, version, created_at, updated_at
                 FROM entities WHERE entity_type = ?1 AND id = ?2",
                rusqlite::params![key.entity_type, key.id.as_str()],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
            )
            .optional()
            .map_err(from_rusqlite)?;

        let Some((attributes, version, created_at, updated_at)) = row else {
            return Ok(None);
        };
        let attributes = match serde_json::from_str::<Value>(&attributes) {
            Ok(Value::Object(map)) => map,
            Ok(other) => {
                return Err(attributes_error(
                    "load_row",
                    key,
                    &format!("expected a JSON object, found {}", other),
                ))
            }
            Err(e) => return Err(attributes_error("load_row", key, &e.to_string())),
        };

        Ok(Some(StoredRow {
            key: key.clone(),
            attributes,
            version,
            created_at,
            updated_at,
        }))
    }

    /// Targets of one owning association, in position order
    pub fn outgoing_links(
        conn: &Connection,
        source: &EntityKey,
        association: &str,
    ) -> Result<Vec<EntityKey>> {
        let mut stmt = conn
            .prepare_cached(
                "SELECT target_type, target_id FROM association_links
                 WHERE source_type = ?1 AND source_id = ?2 AND association = ?3
                 ORDER BY position, target_id",
            )
            .map_err(from_rusqlite)?;
        let keys = stmt
            .query_map(
                rusqlite::params![source.entity_type, source.id.as_str(), association],
                |row| {
                    Ok(EntityKey::new(
                        row.get::<_, String>(0)?,
                        EntityId::new(row.get::<_, String>(1)?),
                    ))
                },
            )
            .map_err(from_rusqlite)?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(from_rusqlite)?;
        Ok(keys)
    }

    /// Sources of `source_type.association` links pointing at `target`
    ///
    /// This is how the inverse side of an association is read back.
    pub fn incoming_links(
        conn: &Connection,
        target: &EntityKey,
        source_type: &str,
        association: &str,
    ) -> Result<Vec<EntityKey>> {
        let mut stmt = conn
            .prepare_cached(
                "SELECT source_id FROM association_links
                 WHERE target_type = ?1 AND target_id = ?2
                   AND source_type = ?3 AND association = ?4
                 ORDER BY source_id",
            )
            .map_err(from_rusqlite)?;
        let keys = stmt
            .query_map(
                rusqlite::params![
                    target.entity_type,
                    target.id.as_str(),
                    source_type,
                    association
                ],
                |row| {
                    Ok(EntityKey::new(
                        source_type,
                        EntityId::new(row.get::<_, String>(0)?),
                    ))
                },
            )
            .map_err(from_rusqlite)?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(from_rusqlite)?;
        Ok(keys)
    }

    /// Every stored link pointing at `target`, whatever its source
    pub fn references_to(conn: &Connection, target: &EntityKey) -> Result<Vec<StoredReference>> {
        let mut stmt = conn
            .prepare_cached(
                "SELECT source_type, source_id, association FROM association_links
                 WHERE target_type = ?1 AND target_id = ?2
                 ORDER BY source_type, source_id, association",
            )
            .map_err(from_rusqlite)?;
        let refs = stmt
            .query_map(
                rusqlite::params![target.entity_type, target.id.as_str()],
                |row| {
                    Ok(StoredReference {
                        source: EntityKey::new(
                            row.get::<_, String>(0)?,
                            EntityId::new(row.get::<_, String>(1)?),
                        ),
                        association: row.get(2)?,
                    })
                },
            )
            .map_err(from_rusqlite)?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(from_rusqlite)?;
        Ok(refs)
    }

    /// Identities of a type, oldest first
    pub fn list_ids(conn: &Connection, entity_type: &str) -> Result<Vec<EntityId>> {
        let mut stmt = conn
            .prepare_cached(
                "SELECT id FROM entities WHERE entity_type = ?1 ORDER BY created_at, rowid",
            )
            .map_err(from_rusqlite)?;
        let ids = stmt
            .query_map([entity_type], |row| {
                Ok(EntityId::new(row.get::<_, String>(0)?))
            })
            .map_err(from_rusqlite)?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(from_rusqlite)?;
        Ok(ids)
    }

    /// Number of stored rows of a type
    pub fn count(conn: &Connection, entity_type: &str) -> Result<u64> {
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM entities WHERE entity_type = ?1",
                [entity_type],
                |row| row.get(0),
            )
            .map_err(from_rusqlite)?;
        Ok(u64::try_from(count).unwrap_or_default())
    }

    /// Bulk delete every row of a type together with the links those rows own
    ///
    /// Links from other types still pointing at these rows make this fail
    /// with a constraint violation.
    pub fn delete_all(conn: &Connection, entity_type: &str) -> Result<usize> {
        conn.execute(
            "DELETE FROM association_links WHERE source_type = ?1",
            [entity_type],
        )
        .map_err(from_rusqlite)?;
        conn.execute("DELETE FROM entities WHERE entity_type = ?1", [entity_type])
            .map_err(from_rusqlite)
    }
}

fn encode_attributes(op: &str, write: &RowWrite) -> Result<String> {
    serde_json::to_string(&write.attributes)
        .map_err(|e| attributes_error(op, &write.key, &e.to_string()))
}
