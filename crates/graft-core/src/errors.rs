use graft_core_types::SessionId;
use thiserror::Error;

/// Result type alias using GraftError
pub type Result<T> = std::result::Result<T, GraftError>;

// ========== Error Facility ==========

/// Canonical error kind taxonomy
///
/// Stable classification of every failure a session can surface. Each kind
/// maps to a stable code used by tests, the CLI and log records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExErrorKind {
    // Mapping
    InvalidMapping,
    UnknownEntityType,
    UnknownAssociation,
    UnknownAttribute,
    CardinalityMismatch,

    // Unit of work
    NotFound,
    NotManaged,
    Removed,
    DuplicateIdentity,
    TransientReference,
    AttributeViolation,

    // Flush
    /// An orphan-removal target is still referenced from somewhere else
    ConfigurationViolation,
    /// Foreign key / unique failure reported by the execution engine
    ConstraintViolation,
    /// The unit of work failed earlier and can only roll back
    RollbackOnly,

    // Integration/IO
    InvalidInput,
    Io,
    Serialization,
    Persistence,

    // Internal
    Internal,
}

impl ExErrorKind {
    /// Get the stable error code for this kind
    pub fn code(&self) -> &'static str {
        match self {
            ExErrorKind::InvalidMapping => "ERR_INVALID_MAPPING",
            ExErrorKind::UnknownEntityType => "ERR_UNKNOWN_ENTITY_TYPE",
            ExErrorKind::UnknownAssociation => "ERR_UNKNOWN_ASSOCIATION",
            ExErrorKind::UnknownAttribute => "ERR_UNKNOWN_ATTRIBUTE",
            ExErrorKind::CardinalityMismatch => "ERR_CARDINALITY_MISMATCH",
            ExErrorKind::NotFound => "ERR_NOT_FOUND",
            ExErrorKind::NotManaged => "ERR_NOT_MANAGED",
            ExErrorKind::Removed => "ERR_REMOVED",
            ExErrorKind::DuplicateIdentity => "ERR_DUPLICATE_IDENTITY",
            ExErrorKind::TransientReference => "ERR_TRANSIENT_REFERENCE",
            ExErrorKind::AttributeViolation => "ERR_ATTRIBUTE_VIOLATION",
            ExErrorKind::ConfigurationViolation => "ERR_CONFIGURATION_VIOLATION",
            ExErrorKind::ConstraintViolation => "ERR_CONSTRAINT_VIOLATION",
            ExErrorKind::RollbackOnly => "ERR_ROLLBACK_ONLY",
            ExErrorKind::InvalidInput => "ERR_INVALID_INPUT",
            ExErrorKind::Io => "ERR_IO",
            ExErrorKind::Serialization => "ERR_SERIALIZATION",
            ExErrorKind::Persistence => "ERR_PERSISTENCE",
            ExErrorKind::Internal => "ERR_INTERNAL",
        }
    }

    /// Whether a failure of this kind leaves the unit of work unusable
    ///
    /// Fatal kinds mark the session rollback-only; the rest are reported to
    /// the caller and the session may continue.
    pub fn is_fatal_for_unit_of_work(&self) -> bool {
        matches!(
            self,
            ExErrorKind::ConfigurationViolation
                | ExErrorKind::ConstraintViolation
                | ExErrorKind::Persistence
                | ExErrorKind::RollbackOnly
                | ExErrorKind::Internal
        )
    }
}

/// Canonical structured error type
///
/// Carries the classification plus the entity context needed to act on it.
#[derive(Debug, Clone)]
pub struct ExError {
    kind: ExErrorKind,
    op: Option<String>,
    entity_type: Option<String>,
    entity_id: Option<String>,
    association: Option<String>,
    session_id: Option<SessionId>,
    message: String,
    source: Option<Box<ExError>>,
}

impl ExError {
    /// Create a new error with the specified kind
    pub fn new(kind: ExErrorKind) -> Self {
        Self {
            kind,
            op: None,
            entity_type: None,
            entity_id: None,
            association: None,
            session_id: None,
            message: String::new(),
            source: None,
        }
    }

    /// Add operation context
    pub fn with_op(mut self, op: impl Into<String>) -> Self {
        self.op = Some(op.into());
        self
    }

    /// Add entity type context
    pub fn with_entity_type(mut self, entity_type: impl Into<String>) -> Self {
        self.entity_type = Some(entity_type.into());
        self
    }

    /// Add entity identity context
    pub fn with_entity_id(mut self, id: impl Into<String>) -> Self {
        self.entity_id = Some(id.into());
        self
    }

    /// Add association name context
    pub fn with_association(mut self, association: impl Into<String>) -> Self {
        self.association = Some(association.into());
        self
    }

    /// Add session correlation context
    pub fn with_session_id(mut self, session_id: SessionId) -> Self {
        self.session_id = Some(session_id);
        self
    }

    /// Add custom message
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    /// Add source error
    pub fn with_source(mut self, source: ExError) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    pub fn kind(&self) -> ExErrorKind {
        self.kind
    }

    /// Get the stable error code
    pub fn code(&self) -> &'static str {
        self.kind.code()
    }

    pub fn op(&self) -> Option<&str> {
        self.op.as_deref()
    }

    pub fn entity_type(&self) -> Option<&str> {
        self.entity_type.as_deref()
    }

    pub fn entity_id(&self) -> Option<&str> {
        self.entity_id.as_deref()
    }

    pub fn association(&self) -> Option<&str> {
        self.association.as_deref()
    }

    pub fn session_id(&self) -> Option<&SessionId> {
        self.session_id.as_ref()
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Get the source error, if any
    pub fn source_error(&self) -> Option<&ExError> {
        self.source.as_deref()
    }
}

impl std::fmt::Display for ExError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}]", self.code())?;
        if let Some(op) = &self.op {
            write!(f, " in operation '{}'", op)?;
        }
        if !self.message.is_empty() {
            write!(f, ": {}", self.message)?;
        }
        match (&self.entity_type, &self.entity_id) {
            (Some(t), Some(id)) => write!(f, " (entity: {}#{})", t, id)?,
            (Some(t), None) => write!(f, " (entity_type: {})", t)?,
            (None, Some(id)) => write!(f, " (entity_id: {})", id)?,
            (None, None) => {}
        }
        if let Some(association) = &self.association {
            write!(f, " (association: {})", association)?;
        }
        Ok(())
    }
}

impl std::error::Error for ExError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_deref()
            .map(|e| e as &(dyn std::error::Error + 'static))
    }
}

// ========== End Error Facility ==========

/// Domain errors raised by the mapping, the persistence context and the
/// flush planner
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GraftError {
    // ===== Mapping Errors =====
    /// Mapping is structurally invalid
    #[error("Invalid mapping: {reason}")]
    InvalidMapping { reason: String },

    /// Entity type is declared twice
    #[error("Entity type declared more than once: {entity_type}")]
    DuplicateEntityType { entity_type: String },

    /// Entity type is not part of the mapping
    #[error("Unknown entity type: {entity_type}")]
    UnknownEntityType { entity_type: String },

    /// Association is not declared on the entity type
    #[error("Unknown association {entity_type}.{association}")]
    UnknownAssociation {
        entity_type: String,
        association: String,
    },

    /// Attribute is not declared on the entity type
    #[error("Unknown attribute {entity_type}.{attribute}")]
    UnknownAttribute {
        entity_type: String,
        attribute: String,
    },

    /// Single-valued operation on a collection association or the reverse
    #[error("Cardinality mismatch on {entity_type}.{association}: {reason}")]
    CardinalityMismatch {
        entity_type: String,
        association: String,
        reason: String,
    },

    /// Association target has the wrong entity type
    #[error("{entity_type}.{association} expects {expected}, got {actual}")]
    WrongTargetType {
        entity_type: String,
        association: String,
        expected: String,
        actual: String,
    },

    // ===== Unit of Work Errors =====
    /// Handle does not belong to this persistence context
    #[error("Entity handle {handle} is not managed by this unit of work")]
    NotManaged { handle: usize },

    /// Entity was removed in this unit of work
    #[error("Entity {entity_type}#{entity_id} was removed")]
    EntityRemoved {
        entity_type: String,
        entity_id: String,
    },

    /// Another managed entity already uses this identity
    #[error("Identity {entity_type}#{entity_id} is already managed")]
    DuplicateIdentity {
        entity_type: String,
        entity_id: String,
    },

    /// Identity can only be assigned before the entity is persisted
    #[error("Identity of {entity_type}#{entity_id} can no longer change")]
    IdentityImmutable {
        entity_type: String,
        entity_id: String,
    },

    /// Association points at an entity that was never persisted
    #[error("{entity_type}.{association} references an unsaved {target_type} instance")]
    TransientReference {
        entity_type: String,
        association: String,
        target_type: String,
    },

    /// Attribute value does not satisfy its descriptor
    #[error("Attribute {entity_type}.{attribute} rejected: {reason}")]
    AttributeViolation {
        entity_type: String,
        attribute: String,
        reason: String,
    },

    /// Storage holds more than one owner for a one-to-one inverse side
    #[error("{entity_type}#{entity_id}.{association} resolves to more than one row")]
    InverseNotUnique {
        entity_type: String,
        entity_id: String,
        association: String,
    },

    // ===== Flush Errors =====
    /// Orphan-removal target is still referenced outside the abandoning association
    #[error(
        "Orphan {entity_type}#{entity_id} abandoned by {owner_type}.{association} is still referenced by {referenced_by}"
    )]
    ConfigurationViolation {
        entity_type: String,
        entity_id: String,
        owner_type: String,
        association: String,
        referenced_by: String,
    },

    // ===== Internal Errors =====
    /// Serialization error
    #[error("Serialization error: {message}")]
    Serialization { message: String },

    /// Internal error (should never happen)
    #[error("Internal error: {message}")]
    Internal { message: String },
}

/// Conversion from GraftError to ExError
impl From<GraftError> for ExError {
    fn from(err: GraftError) -> Self {
        match err {
            GraftError::InvalidMapping { reason } => {
                ExError::new(ExErrorKind::InvalidMapping).with_message(reason)
            }

            GraftError::DuplicateEntityType { entity_type } => {
                ExError::new(ExErrorKind::InvalidMapping)
                    .with_entity_type(entity_type)
                    .with_message("Entity type declared more than once")
            }

            GraftError::UnknownEntityType { entity_type } => {
                ExError::new(ExErrorKind::UnknownEntityType)
                    .with_entity_type(entity_type)
                    .with_message("Entity type is not mapped")
            }

            GraftError::UnknownAssociation {
                entity_type,
                association,
            } => ExError::new(ExErrorKind::UnknownAssociation)
                .with_entity_type(entity_type)
                .with_association(association)
                .with_message("Association is not mapped"),

            GraftError::UnknownAttribute {
                entity_type,
                attribute,
            } => ExError::new(ExErrorKind::UnknownAttribute)
                .with_entity_type(entity_type)
                .with_message(format!("Attribute '{}' is not mapped", attribute)),

            GraftError::CardinalityMismatch {
                entity_type,
                association,
                reason,
            } => ExError::new(ExErrorKind::CardinalityMismatch)
                .with_entity_type(entity_type)
                .with_association(association)
                .with_message(reason),

            GraftError::WrongTargetType {
                entity_type,
                association,
                expected,
                actual,
            } => ExError::new(ExErrorKind::InvalidInput)
                .with_entity_type(entity_type)
                .with_association(association)
                .with_message(format!("Expected target {}, got {}", expected, actual)),

            GraftError::NotManaged { handle } => ExError::new(ExErrorKind::NotManaged)
                .with_message(format!("Handle {} is not managed", handle)),

            GraftError::EntityRemoved {
                entity_type,
                entity_id,
            } => ExError::new(ExErrorKind::Removed)
                .with_entity_type(entity_type)
                .with_entity_id(entity_id)
                .with_message("Entity was removed in this unit of work"),

            GraftError::DuplicateIdentity {
                entity_type,
                entity_id,
            } => ExError::new(ExErrorKind::DuplicateIdentity)
                .with_entity_type(entity_type)
                .with_entity_id(entity_id)
                .with_message("Identity is already managed"),

            GraftError::IdentityImmutable {
                entity_type,
                entity_id,
            } => ExError::new(ExErrorKind::InvalidInput)
                .with_entity_type(entity_type)
                .with_entity_id(entity_id)
                .with_message("Identity is assigned only while the entity is transient"),

            GraftError::TransientReference {
                entity_type,
                association,
                target_type,
            } => ExError::new(ExErrorKind::TransientReference)
                .with_entity_type(entity_type)
                .with_association(association)
                .with_message(format!(
                    "References an unsaved {} instance; persist it first",
                    target_type
                )),

            GraftError::AttributeViolation {
                entity_type,
                attribute,
                reason,
            } => ExError::new(ExErrorKind::AttributeViolation)
                .with_entity_type(entity_type)
                .with_message(format!("Attribute '{}': {}", attribute, reason)),

            GraftError::InverseNotUnique {
                entity_type,
                entity_id,
                association,
            } => ExError::new(ExErrorKind::ConstraintViolation)
                .with_entity_type(entity_type)
                .with_entity_id(entity_id)
                .with_association(association)
                .with_message("One-to-one inverse side resolves to more than one row"),

            GraftError::ConfigurationViolation {
                entity_type,
                entity_id,
                owner_type,
                association,
                referenced_by,
            } => ExError::new(ExErrorKind::ConfigurationViolation)
                .with_op("flush")
                .with_entity_type(entity_type)
                .with_entity_id(entity_id)
                .with_association(format!("{}.{}", owner_type, association))
                .with_message(format!(
                    "Orphan is still referenced by {}; orphan removal requires exclusive ownership",
                    referenced_by
                )),

            GraftError::Serialization { message } => {
                ExError::new(ExErrorKind::Serialization).with_message(message)
            }

            GraftError::Internal { message } => {
                ExError::new(ExErrorKind::Internal).with_message(message)
            }
        }
    }
}

/// Conversion from serde_json::Error to GraftError
impl From<serde_json::Error> for GraftError {
    fn from(err: serde_json::Error) -> Self {
        GraftError::Serialization {
            message: err.to_string(),
        }
    }
}
