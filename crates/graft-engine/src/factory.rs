//! Session factory and scoped units of work
//!
//! `in_transaction`, `from_transaction` and `within_transaction` all run a
//! closure against a fresh `Session`, flush it when the closure succeeds and
//! commit only if that flush succeeds and nobody marked the session
//! rollback-only. Every other path rolls back. Rollback on unwind comes from the rusqlite
//! transaction and savepoint guards, which roll back when dropped.

#![allow(clippy::result_large_err)]

use std::sync::Arc;
use std::time::Instant;

use graft_core::errors::{ExError, ExErrorKind};
use graft_core::model::MappingRegistry;
use graft_core::{log_op_end, log_op_error, log_op_start};
use graft_store::errors::{from_rusqlite, Result};
use graft_store::db;
use graft_store::mapping::parse_mapping_file;
use graft_store::migrations::apply_migrations;
use rusqlite::{Connection, Transaction};

use crate::config::{DatabaseLocation, SessionFactoryConfig};
use crate::session::Session;

/// Owns the connection and the mapping every session shares
pub struct SessionFactory {
    conn: Connection,
    registry: Arc<MappingRegistry>,
    config: SessionFactoryConfig,
}

impl SessionFactory {
    /// Open the configured database and load the configured mapping file
    pub fn open(config: SessionFactoryConfig) -> Result<Self> {
        let mapping = config.mapping.clone().ok_or_else(|| {
            ExError::new(ExErrorKind::InvalidInput)
                .with_op("session_factory_open")
                .with_message("no mapping file configured")
        })?;
        let registry = Arc::new(parse_mapping_file(&mapping)?);
        Self::with_registry(config, registry)
    }

    /// Open the configured database with an already validated mapping
    pub fn with_registry(
        config: SessionFactoryConfig,
        registry: Arc<MappingRegistry>,
    ) -> Result<Self> {
        let mut conn = match config.location() {
            DatabaseLocation::Memory => db::open_in_memory()?,
            DatabaseLocation::File(path) => db::open(path)?,
        };
        db::configure(&conn, config.foreign_keys)?;
        apply_migrations(&mut conn)?;

        tracing::debug!(
            op = "session_factory_open",
            database = %config.database,
            entity_types = registry.len(),
            "session factory ready"
        );
        Ok(Self {
            conn,
            registry,
            config,
        })
    }

    pub fn registry(&self) -> &Arc<MappingRegistry> {
        &self.registry
    }

    pub fn config(&self) -> &SessionFactoryConfig {
        &self.config
    }

    /// The underlying connection, for reads outside any unit of work
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Run `f` as one unit of work in its own transaction
    ///
    /// Commits after a successful final flush; otherwise rolls back and
    /// returns the error. A session left rollback-only yields
    /// `RollbackOnly` even when `f` itself succeeded.
    pub fn in_transaction<F>(&mut self, f: F) -> Result<()>
    where
        F: FnOnce(&mut Session<'_>) -> Result<()>,
    {
        self.from_transaction(f)
    }

    /// Like `in_transaction`, handing back what `f` returned once committed
    pub fn from_transaction<T, F>(&mut self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Session<'_>) -> Result<T>,
    {
        log_op_start!("unit_of_work");
        let start = Instant::now();

        let registry = Arc::clone(&self.registry);
        let result = self
            .conn
            .transaction()
            .map_err(from_rusqlite)
            .and_then(|tx| {
                let value = run_unit_of_work(&tx, registry, f)?;
                tx.commit().map_err(from_rusqlite)?;
                Ok(value)
            });

        finish("unit_of_work", start, result)
    }
}

/// Run `f` as one unit of work inside a caller-owned transaction
///
/// The work is wrapped in a savepoint that is released on success and
/// rolled back on failure; committing the transaction stays with the
/// caller.
pub fn within_transaction<T, F>(
    tx: &mut Transaction<'_>,
    registry: Arc<MappingRegistry>,
    f: F,
) -> Result<T>
where
    F: FnOnce(&mut Session<'_>) -> Result<T>,
{
    log_op_start!("unit_of_work_within_transaction");
    let start = Instant::now();

    let result = tx.savepoint().map_err(from_rusqlite).and_then(|sp| {
        let value = run_unit_of_work(&sp, registry, f)?;
        sp.commit().map_err(from_rusqlite)?;
        Ok(value)
    });

    finish("unit_of_work_within_transaction", start, result)
}

fn run_unit_of_work<T, F>(conn: &Connection, registry: Arc<MappingRegistry>, f: F) -> Result<T>
where
    F: FnOnce(&mut Session<'_>) -> Result<T>,
{
    let mut session = Session::new(conn, registry);
    let value = f(&mut session)?;
    if session.is_rollback_only() {
        return Err(ExError::new(ExErrorKind::RollbackOnly)
            .with_op("commit")
            .with_session_id(session.session_id().clone())
            .with_message("unit of work is marked rollback-only"));
    }
    session.flush()?;
    Ok(value)
}

fn finish<T>(op: &'static str, start: Instant, result: Result<T>) -> Result<T> {
    match &result {
        Ok(_) => {
            log_op_end!(op, duration_ms = start.elapsed().as_millis() as u64);
        }
        Err(e) => {
            log_op_error!(op, e.clone(), duration_ms = start.elapsed().as_millis() as u64);
        }
    }
    result
}
