//! Graft Engine - sessions and units of work
//!
//! Ties the core unit of work to SQLite:
//! - `Session`: managed entities, queries and flushes over one connection
//! - `SessionFactory`: scoped execution (`in_transaction`, `from_transaction`)
//! - `within_transaction`: the same inside a transaction the caller commits
//! - `SessionFactoryConfig`: database location, mapping file, logging profile
//!
//! ## Logging Ownership
//!
//! The engine owns lifecycle logging for flushes and units of work
//! (`log_op_start!`, `log_op_end!`, `log_op_error!`). Lower layers only
//! emit `tracing::debug!` details.

pub mod config;
pub mod factory;
pub mod session;

pub use config::{DatabaseLocation, SessionFactoryConfig};
pub use factory::{within_transaction, SessionFactory};
pub use session::Session;
