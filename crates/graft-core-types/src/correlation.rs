//! Correlation identifiers for unit-of-work tracing
//!
//! Every session gets a `SessionId`; every flush inside that session gets a
//! `FlushId` derived from it. Both appear as structured log fields so the
//! statements of one flush can be grouped after the fact.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifier of one unit-of-work (one session, one transaction)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(String);

impl SessionId {
    /// Generate a new SessionId using UUIDv7 (time ordered)
    pub fn new() -> Self {
        Self(Uuid::now_v7().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Wrap an existing string, e.g. one read back from a log record
    pub fn from_string(s: String) -> Self {
        Self(s)
    }

    /// The id of the `seq`-th flush of this session (1-based)
    pub fn flush(&self, seq: u32) -> FlushId {
        FlushId {
            session_id: self.clone(),
            seq,
        }
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of a single flush within a session
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FlushId {
    session_id: SessionId,
    seq: u32,
}

impl FlushId {
    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    pub fn seq(&self) -> u32 {
        self.seq
    }
}

impl std::fmt::Display for FlushId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}#{}", self.session_id, self.seq)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_id_generation() {
        let id1 = SessionId::new();
        let id2 = SessionId::new();

        assert_ne!(id1, id2);
        assert!(!id1.as_str().is_empty());
    }

    #[test]
    fn test_session_id_display() {
        let id = SessionId::from_string("s-1".to_string());
        assert_eq!(format!("{}", id), "s-1");
    }

    #[test]
    fn test_flush_id_carries_session() {
        let session = SessionId::from_string("s-1".to_string());
        let flush = session.flush(3);

        assert_eq!(flush.session_id(), &session);
        assert_eq!(flush.seq(), 3);
        assert_eq!(flush.to_string(), "s-1#3");
    }

    #[test]
    fn test_serialization() {
        let id = SessionId::new();
        let json = serde_json::to_string(&id).unwrap();
        let deserialized: SessionId = serde_json::from_str(&json).unwrap();
        assert_eq!(id, deserialized);
    }
}
