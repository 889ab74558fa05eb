//! Repository layer bridging the unit of work to SQLite

pub mod hydration;
pub mod sqlite_repo;

pub use hydration::load_graph;
pub use sqlite_repo::{FlushStats, SqliteRepo, StoredRow};
