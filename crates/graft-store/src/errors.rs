//! Error handling for graft-store
//!
//! Wraps graft-core ExError with store-specific helpers

use graft_core::errors::{ExError, ExErrorKind};
use graft_core::model::EntityKey;

/// Result type alias using ExError
pub type Result<T> = std::result::Result<T, ExError>;

/// Create a migration error
pub fn migration_error(migration_id: &str, reason: &str) -> ExError {
    ExError::new(ExErrorKind::Persistence)
        .with_op("migration")
        .with_message(format!("Migration {} failed: {}", migration_id, reason))
}

/// Create a checksum mismatch error
pub fn checksum_mismatch(migration_id: &str, expected: &str, actual: &str) -> ExError {
    ExError::new(ExErrorKind::ConstraintViolation)
        .with_op("migration_checksum")
        .with_message(format!(
            "Checksum mismatch for migration {}: expected {}, got {}",
            migration_id, expected, actual
        ))
}

/// Create a mapping validation error
pub fn mapping_error(reason: &str) -> ExError {
    ExError::new(ExErrorKind::InvalidMapping)
        .with_op("mapping_parse")
        .with_message(reason.to_string())
}

/// Create a serialization error for a stored attribute document
pub fn attributes_error(op: &str, key: &EntityKey, reason: &str) -> ExError {
    ExError::new(ExErrorKind::Serialization)
        .with_op(op.to_string())
        .with_entity_type(key.entity_type.clone())
        .with_entity_id(key.id.to_string())
        .with_message(format!("Invalid attributes for {}: {}", key, reason))
}

/// Create an error for a row that should exist but does not
pub fn row_missing(op: &str, key: &EntityKey) -> ExError {
    ExError::new(ExErrorKind::NotFound)
        .with_op(op.to_string())
        .with_entity_type(key.entity_type.clone())
        .with_entity_id(key.id.to_string())
        .with_message(format!("No stored row for {}", key))
}

/// Create a database error from rusqlite::Error
///
/// Foreign key and unique failures become `ConstraintViolation`; everything
/// else is `Persistence`.
pub fn from_rusqlite(err: rusqlite::Error) -> ExError {
    let kind = match &err {
        rusqlite::Error::SqliteFailure(failure, _)
            if failure.code == rusqlite::ErrorCode::ConstraintViolation =>
        {
            ExErrorKind::ConstraintViolation
        }
        _ => ExErrorKind::Persistence,
    };
    ExError::new(kind)
        .with_op("sqlite")
        .with_message(err.to_string())
}

/// Create an IO error
pub fn io_error(operation: &str, err: std::io::Error) -> ExError {
    ExError::new(ExErrorKind::Io)
        .with_op(operation.to_string())
        .with_message(err.to_string())
}
