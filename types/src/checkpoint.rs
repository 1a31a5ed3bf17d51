//! The checkpoint record and its component types.
//!
//! # Invariants
//!
//! - `old_content` empty means the file did not exist before the change.
//! - `new_content` is [`CheckpointContent::Pending`] until the tool that produced it has
//!   finished; it transitions to `Resolved` at most once.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ids::{CheckpointId, MessageId, SessionId};

/// Creation time in milliseconds since the Unix epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(i64);

impl Timestamp {
    #[must_use]
    pub const fn from_millis(millis: i64) -> Self {
        Self(millis)
    }

    #[must_use]
    pub fn now() -> Self {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| i64::try_from(d.as_millis()).unwrap_or(i64::MAX))
            .unwrap_or(0);
        Self(millis)
    }

    #[must_use]
    pub const fn as_millis(self) -> i64 {
        self.0
    }

    /// The smallest timestamp strictly after `self`.
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0.saturating_add(1))
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// When the final content of a tool's change becomes known.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitPhase {
    /// The invocation carries the complete final content.
    Single,
    /// The invocation carries a transformation; content is known after execution.
    TwoPhase,
}

/// Which tool produced a checkpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ToolType {
    Write,
    Edit,
    MultiEdit,
    NotebookEdit,
}

#[derive(Debug, Error)]
#[error("unknown tool type: {0}")]
pub struct UnknownToolType(pub String);

impl ToolType {
    pub const ALL: [Self; 4] = [Self::Write, Self::Edit, Self::MultiEdit, Self::NotebookEdit];

    /// Map an assistant tool name to a checkpointable tool, if it is one.
    #[must_use]
    pub fn from_tool_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.as_str() == name)
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Write => "Write",
            Self::Edit => "Edit",
            Self::MultiEdit => "MultiEdit",
            Self::NotebookEdit => "NotebookEdit",
        }
    }

    #[must_use]
    pub const fn commit_phase(self) -> CommitPhase {
        match self {
            Self::Write => CommitPhase::Single,
            Self::Edit | Self::MultiEdit | Self::NotebookEdit => CommitPhase::TwoPhase,
        }
    }

    /// Whether the tool replaces the whole file rather than editing part of it.
    #[must_use]
    pub const fn is_full_replacement(self) -> bool {
        matches!(self, Self::Write)
    }

    /// Input field holding the target path.
    #[must_use]
    pub const fn path_field(self) -> &'static str {
        match self {
            Self::NotebookEdit => "notebook_path",
            Self::Write | Self::Edit | Self::MultiEdit => "file_path",
        }
    }
}

impl FromStr for ToolType {
    type Err = UnknownToolType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_tool_name(s).ok_or_else(|| UnknownToolType(s.to_string()))
    }
}

impl fmt::Display for ToolType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Post-change content of a checkpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "content", rename_all = "snake_case")]
pub enum CheckpointContent {
    /// The tool has not finished; the final content is unknown.
    Pending,
    Resolved(String),
}

impl CheckpointContent {
    #[must_use]
    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Pending)
    }

    #[must_use]
    pub fn resolved(&self) -> Option<&str> {
        match self {
            Self::Pending => None,
            Self::Resolved(content) => Some(content),
        }
    }

    /// Decode from a nullable storage column (`NULL` = pending).
    #[must_use]
    pub fn from_column(value: Option<String>) -> Self {
        value.map_or(Self::Pending, Self::Resolved)
    }

    #[must_use]
    pub fn as_column(&self) -> Option<&str> {
        self.resolved()
    }
}

/// One durable record of a single tool-driven file modification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub id: CheckpointId,
    pub session_id: SessionId,
    pub message_id: MessageId,
    pub file_path: PathBuf,
    pub timestamp: Timestamp,
    pub patch_path: PathBuf,
    pub full_snapshot: bool,
    pub old_content: String,
    pub new_content: CheckpointContent,
    pub tool_type: ToolType,
}

impl Checkpoint {
    /// The file did not exist before this change.
    #[must_use]
    pub fn created_file(&self) -> bool {
        self.old_content.is_empty()
    }

    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.new_content.is_pending()
    }
}
