//! Graft Store - SQLite persistence for the unit of work
//!
//! Provides:
//! - SQLite schema with a checksummed migrations framework
//! - Flush plan execution and eager graph hydration
//! - A reference lookup answering from stored association links
//! - The YAML mapping format (v0) and its parser

pub mod db;
pub mod errors;
pub mod lookup;
pub mod mapping;
pub mod migrations;
pub mod repo;

// Re-export key types
pub use errors::Result;
pub use lookup::SqliteReferenceLookup;
pub use repo::{FlushStats, SqliteRepo};
