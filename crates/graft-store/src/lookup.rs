//! Reference lookup backed by the association link table

#![allow(clippy::result_large_err)]

use graft_core::errors::ExError;
use graft_core::model::EntityKey;
use graft_core::policy::{ReferenceLookup, StoredReference};
use rusqlite::Connection;

use crate::repo::SqliteRepo;

/// Answers `references_to` from `association_links`
///
/// Sees whatever the wrapped connection sees, including uncommitted writes
/// of the surrounding transaction.
pub struct SqliteReferenceLookup<'c> {
    conn: &'c Connection,
}

impl<'c> SqliteReferenceLookup<'c> {
    pub fn new(conn: &'c Connection) -> Self {
        Self { conn }
    }
}

impl ReferenceLookup for SqliteReferenceLookup<'_> {
    fn references_to(
        &self,
        target: &EntityKey,
    ) -> std::result::Result<Vec<StoredReference>, ExError> {
        SqliteRepo::references_to(self.conn, target)
    }
}
