//! Session: one unit of work over one SQLite connection
//!
//! A session wraps a `PersistenceContext` and the connection (usually a
//! transaction or savepoint) it reads from and flushes to. Loading is eager
//! and goes through the identity map, so each stored entity is represented
//! by exactly one handle per session.
//!
//! Every flush runs inside its own savepoint. A failed flush rolls that
//! savepoint back; when the failure is fatal for the unit of work, or when
//! it happened after rows were already written, the session becomes
//! rollback-only and every later flush is refused.

#![allow(clippy::result_large_err)]

use std::sync::Arc;
use std::time::Instant;

use graft_core::errors::{ExError, ExErrorKind};
use graft_core::model::{EntityHandle, EntityId, EntityKey, MappingRegistry};
use graft_core::uow::PersistenceContext;
use graft_core::{complete_flush, log_op_end, log_op_error, log_op_start, plan_flush};
use graft_core_types::SessionId;
use graft_store::errors::{from_rusqlite, Result};
use graft_store::repo::load_graph;
use graft_store::{FlushStats, SqliteReferenceLookup, SqliteRepo};
use rusqlite::Connection;
use serde_json::Value;

pub struct Session<'c> {
    conn: &'c Connection,
    context: PersistenceContext,
    session_id: SessionId,
    flushes: u32,
    rollback_only: bool,
}

impl<'c> Session<'c> {
    pub fn new(conn: &'c Connection, registry: Arc<MappingRegistry>) -> Self {
        let session_id = SessionId::new();
        tracing::debug!(op = "session_open", session_id = %session_id, "session opened");
        Self {
            conn,
            context: PersistenceContext::new(registry),
            session_id,
            flushes: 0,
            rollback_only: false,
        }
    }

    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    /// Read access to the managed entities
    pub fn context(&self) -> &PersistenceContext {
        &self.context
    }

    pub fn is_rollback_only(&self) -> bool {
        self.rollback_only
    }

    /// Mark the unit of work as doomed; the enclosing scope will roll back
    pub fn set_rollback_only(&mut self) {
        self.rollback_only = true;
    }

    // ===== Entity lifecycle =====

    /// A new transient entity of `entity_type`
    pub fn instantiate(&mut self, entity_type: &str) -> Result<EntityHandle> {
        self.context
            .instantiate(entity_type)
            .map_err(tag(&self.session_id))
    }

    /// Choose the identity of a transient entity instead of generating one
    pub fn set_id(&mut self, handle: EntityHandle, id: EntityId) -> Result<()> {
        self.context
            .set_id(handle, id)
            .map_err(tag(&self.session_id))
    }

    /// Make a transient entity persistent (or revive a removed one)
    pub fn persist(&mut self, handle: EntityHandle) -> Result<()> {
        self.context.persist(handle).map_err(tag(&self.session_id))
    }

    /// Schedule an entity for deletion at the next flush
    pub fn remove(&mut self, handle: EntityHandle) -> Result<()> {
        self.context.remove(handle).map_err(tag(&self.session_id))
    }

    /// Identity of a managed entity; `None` while it is transient
    pub fn identity(&self, handle: EntityHandle) -> Result<Option<EntityId>> {
        let entity = self.context.entity(handle).map_err(tag(&self.session_id))?;
        Ok(entity.id().cloned())
    }

    // ===== Attributes =====

    pub fn set_attribute(&mut self, handle: EntityHandle, name: &str, value: Value) -> Result<()> {
        self.context
            .set_attribute(handle, name, value)
            .map_err(tag(&self.session_id))
    }

    pub fn attribute(&self, handle: EntityHandle, name: &str) -> Result<Option<Value>> {
        let value = self
            .context
            .attribute(handle, name)
            .map_err(tag(&self.session_id))?;
        Ok(value.cloned())
    }

    // ===== Associations =====

    /// Set one side of a single-valued association
    pub fn set_association(
        &mut self,
        handle: EntityHandle,
        name: &str,
        target: Option<EntityHandle>,
    ) -> Result<()> {
        self.context
            .set_association(handle, name, target)
            .map_err(tag(&self.session_id))
    }

    /// Set a single-valued association and keep the other side in step
    pub fn associate(
        &mut self,
        handle: EntityHandle,
        name: &str,
        target: Option<EntityHandle>,
    ) -> Result<()> {
        self.context
            .associate(handle, name, target)
            .map_err(tag(&self.session_id))
    }

    pub fn add_to_association(
        &mut self,
        handle: EntityHandle,
        name: &str,
        target: EntityHandle,
    ) -> Result<()> {
        self.context
            .add_to_association(handle, name, target)
            .map_err(tag(&self.session_id))
    }

    pub fn remove_from_association(
        &mut self,
        handle: EntityHandle,
        name: &str,
        target: EntityHandle,
    ) -> Result<()> {
        self.context
            .remove_from_association(handle, name, target)
            .map_err(tag(&self.session_id))
    }

    pub fn association(&self, handle: EntityHandle, name: &str) -> Result<Option<EntityHandle>> {
        self.context
            .association(handle, name)
            .map_err(tag(&self.session_id))
    }

    pub fn association_many(&self, handle: EntityHandle, name: &str) -> Result<Vec<EntityHandle>> {
        self.context
            .association_many(handle, name)
            .map_err(tag(&self.session_id))
    }

    // ===== Queries =====

    /// Load an entity by identity
    ///
    /// Managed entities are answered from the identity map; a removed one is
    /// `None`. Otherwise the stored row and its graph are loaded.
    pub fn get(&mut self, entity_type: &str, id: &EntityId) -> Result<Option<EntityHandle>> {
        self.context
            .registry()
            .entity_type(entity_type)
            .map_err(tag(&self.session_id))?;

        let key = EntityKey::new(entity_type, id.clone());
        if let Some(handle) = self.context.lookup(&key) {
            let entity = self.context.entity(handle).map_err(tag(&self.session_id))?;
            return Ok((!entity.is_removed()).then_some(handle));
        }
        load_graph(self.conn, &mut self.context, &key).map_err(tag(&self.session_id))
    }

    /// Every stored entity of a type, oldest first
    ///
    /// Pending changes are flushed first so the result reflects them.
    pub fn list(&mut self, entity_type: &str) -> Result<Vec<EntityHandle>> {
        self.ensure_mapped(entity_type)?;
        self.flush()?;

        let ids = SqliteRepo::list_ids(self.conn, entity_type).map_err(tag(&self.session_id))?;
        let mut handles = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(handle) = self.get(entity_type, &id)? {
                handles.push(handle);
            }
        }
        Ok(handles)
    }

    /// Number of stored entities of a type, after flushing pending changes
    pub fn count(&mut self, entity_type: &str) -> Result<u64> {
        self.ensure_mapped(entity_type)?;
        self.flush()?;
        SqliteRepo::count(self.conn, entity_type).map_err(tag(&self.session_id))
    }

    /// Bulk delete every row of a type, bypassing the unit of work
    ///
    /// Pending changes are flushed first; managed entities of the type are
    /// detached afterwards. No orphan removal or cascades apply.
    pub fn delete_all(&mut self, entity_type: &str) -> Result<usize> {
        self.ensure_mapped(entity_type)?;
        self.flush()?;

        let name = format!("graft_bulk_{}", self.flushes);
        let conn = self.conn;
        let deleted = with_savepoint(conn, &name, || SqliteRepo::delete_all(conn, entity_type))
            .map_err(tag(&self.session_id))?;
        let detached = self.context.detach_type(entity_type);

        tracing::debug!(
            op = "delete_all",
            session_id = %self.session_id,
            entity_type,
            deleted,
            detached,
            "bulk delete executed"
        );
        Ok(deleted)
    }

    // ===== Flush =====

    /// Write pending changes, orphan removals included
    pub fn flush(&mut self) -> Result<FlushStats> {
        let flush_id = self.session_id.flush(self.flushes + 1);
        log_op_start!("flush", session_id = %self.session_id, flush_id = %flush_id);
        let start = Instant::now();

        let result = self.flush_impl().map_err(|e| {
            log_op_error!(
                "flush",
                e.clone(),
                duration_ms = start.elapsed().as_millis() as u64,
                session_id = %self.session_id,
                rollback_only = self.rollback_only
            );
            e
        })?;

        log_op_end!(
            "flush",
            duration_ms = start.elapsed().as_millis() as u64,
            session_id = %self.session_id,
            orphan_deletes = result.orphans_deleted as u64,
            inserts = result.inserted as u64,
            updates = result.updated as u64,
            deletes = result.deleted as u64
        );
        Ok(result)
    }

    fn flush_impl(&mut self) -> Result<FlushStats> {
        if self.rollback_only {
            return Err(ExError::new(ExErrorKind::RollbackOnly)
                .with_op("flush")
                .with_session_id(self.session_id.clone())
                .with_message("unit of work is marked rollback-only"));
        }
        self.flushes += 1;

        let conn = self.conn;
        let context = &mut self.context;
        let name = format!("graft_flush_{}", self.flushes);
        let mut executing = false;

        let outcome = with_savepoint(conn, &name, || {
            let plan = plan_flush(context, &SqliteReferenceLookup::new(conn))?;
            if plan.is_empty() {
                return Ok(FlushStats::default());
            }
            executing = true;
            SqliteRepo::execute_plan(conn, &plan)
        });

        match outcome {
            Ok(stats) => {
                complete_flush(&mut self.context);
                Ok(stats)
            }
            Err(err) => {
                if executing || err.kind().is_fatal_for_unit_of_work() {
                    self.rollback_only = true;
                }
                Err(err.with_session_id(self.session_id.clone()))
            }
        }
    }

    fn ensure_mapped(&self, entity_type: &str) -> Result<()> {
        self.context
            .registry()
            .entity_type(entity_type)
            .map(|_| ())
            .map_err(tag(&self.session_id))
    }
}

/// Attach the session id to an error on its way out
fn tag<E: Into<ExError>>(session_id: &SessionId) -> impl Fn(E) -> ExError + '_ {
    move |err| {
        let err: ExError = err.into();
        if err.session_id().is_some() {
            err
        } else {
            err.with_session_id(session_id.clone())
        }
    }
}

/// Run `f` inside a named savepoint, rolling it back on error
fn with_savepoint<T>(
    conn: &Connection,
    name: &str,
    f: impl FnOnce() -> Result<T>,
) -> Result<T> {
    conn.execute_batch(&format!("SAVEPOINT {}", name))
        .map_err(from_rusqlite)?;

    match f() {
        Ok(value) => {
            conn.execute_batch(&format!("RELEASE {}", name))
                .map_err(from_rusqlite)?;
            Ok(value)
        }
        Err(err) => {
            if let Err(rollback_err) =
                conn.execute_batch(&format!("ROLLBACK TO {0}; RELEASE {0}", name))
            {
                tracing::warn!(
                    op = "savepoint_rollback",
                    savepoint = name,
                    error = %rollback_err,
                    "savepoint rollback failed"
                );
            }
            Err(err)
        }
    }
}
