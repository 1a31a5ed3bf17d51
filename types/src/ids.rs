use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Globally unique identifier for a checkpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CheckpointId(Uuid);

#[derive(Debug, Error)]
#[error("invalid checkpoint id: {raw}")]
pub struct InvalidCheckpointId {
    pub raw: String,
}

impl CheckpointId {
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn parse(raw: &str) -> Result<Self, InvalidCheckpointId> {
        Uuid::parse_str(raw.trim())
            .map(Self)
            .map_err(|_| InvalidCheckpointId {
                raw: raw.to_string(),
            })
    }
}

impl FromStr for CheckpointId {
    type Err = InvalidCheckpointId;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for CheckpointId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

/// Missing or blank conversation coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CoordinateError {
    #[error("session id must not be empty")]
    EmptySession,
    #[error("message id must not be empty")]
    EmptyMessage,
}

/// Session identifier owned by the external session store.
///
/// Never empty or whitespace-only. The engine does not check that the session exists.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SessionId(String);

impl SessionId {
    pub fn new(value: impl Into<String>) -> Result<Self, CoordinateError> {
        let value = value.into();
        if value.trim().is_empty() {
            Err(CoordinateError::EmptySession)
        } else {
            Ok(Self(value))
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for SessionId {
    type Error = CoordinateError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<SessionId> for String {
    fn from(value: SessionId) -> Self {
        value.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Message identifier within a session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MessageId(String);

impl MessageId {
    pub fn new(value: impl Into<String>) -> Result<Self, CoordinateError> {
        let value = value.into();
        if value.trim().is_empty() {
            Err(CoordinateError::EmptyMessage)
        } else {
            Ok(Self(value))
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for MessageId {
    type Error = CoordinateError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<MessageId> for String {
    fn from(value: MessageId) -> Self {
        value.0
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A position in the conversation: `(session, message)`.
///
/// Holding a value proves both ids were validated at the boundary.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Coordinates {
    pub session: SessionId,
    pub message: MessageId,
}

impl Coordinates {
    pub fn new(session: &str, message: &str) -> Result<Self, CoordinateError> {
        Ok(Self {
            session: SessionId::new(session)?,
            message: MessageId::new(message)?,
        })
    }
}

impl fmt::Display for Coordinates {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.session, self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coordinates_reject_blank_ids() {
        assert_eq!(
            Coordinates::new("", "m1").unwrap_err(),
            CoordinateError::EmptySession
        );
        assert_eq!(
            Coordinates::new("s1", "   ").unwrap_err(),
            CoordinateError::EmptyMessage
        );
        let coords = Coordinates::new("s1", "m1").unwrap();
        assert_eq!(coords.to_string(), "s1/m1");
    }

    #[test]
    fn checkpoint_id_display_parses_back() {
        let id = CheckpointId::generate();
        assert_eq!(CheckpointId::parse(&id.to_string()).unwrap(), id);
        assert!(CheckpointId::parse("not-a-uuid").is_err());
    }

    #[test]
    fn session_id_deserialize_validates() {
        let ok: SessionId = serde_json::from_str("\"abc\"").unwrap();
        assert_eq!(ok.as_str(), "abc");
        assert!(serde_json::from_str::<SessionId>("\"\"").is_err());
    }
}
