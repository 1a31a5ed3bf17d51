//! Core domain types for Rollback.
//!
//! This crate contains pure domain types with no IO, no async, and minimal dependencies.
//! Everything here can be used from any layer of the application.

// Pedantic lint configuration - these are intentional design choices
#![allow(clippy::missing_errors_doc)] // Result-returning functions are self-explanatory
#![allow(clippy::missing_panics_doc)] // Panics are documented in assertions

mod checkpoint;
mod ids;
mod report;

pub use checkpoint::{
    Checkpoint, CheckpointContent, CommitPhase, Timestamp, ToolType, UnknownToolType,
};
pub use ids::{
    CheckpointId, CoordinateError, Coordinates, InvalidCheckpointId, MessageId, SessionId,
};
pub use report::{FileFailure, RevertDirection, RevertReport};

use serde::{Deserialize, Serialize};

/// A decoded tool invocation from the assistant's output stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolInvocation {
    /// The name of the tool being called.
    pub name: String,
    /// The arguments to the tool, as parsed JSON.
    #[serde(default)]
    pub input: serde_json::Value,
}

impl ToolInvocation {
    pub fn new(name: impl Into<String>, input: serde_json::Value) -> Self {
        Self {
            name: name.into(),
            input,
        }
    }

    /// The checkpointable tool this invocation names, if any.
    #[must_use]
    pub fn tool_type(&self) -> Option<ToolType> {
        ToolType::from_tool_name(&self.name)
    }
}
