//! Tool-call classification.
//!
//! [`classify`] decides, without touching the filesystem, whether an invocation
//! modifies a file and which commit protocol its checkpoint follows. Reading the
//! file's current content happens afterwards, in [`read_existing`].

use std::io;
use std::path::{Component, Path, PathBuf};

use rollback_types::{CommitPhase, ToolInvocation, ToolType};
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClassifyError {
    #[error("{tool} invocation is missing `{field}`")]
    MissingField {
        tool: ToolType,
        field: &'static str,
    },
    #[error("{} is not valid UTF-8; binary files are not checkpointed", path.display())]
    BinaryContent { path: PathBuf },
    #[error("failed to read {}: {source}", path.display())]
    SourceRead {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// The final content of a classified change, as far as it is known up front.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlannedChange {
    /// The invocation carries the whole new file.
    Replace { content: String },
    /// The tool computes the new content; read it back once the tool has run.
    Deferred,
}

/// A checkpoint to be recorded for one tool invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckpointPlan {
    pub tool_type: ToolType,
    /// Absolute path of the file the tool modifies.
    pub file_path: PathBuf,
    pub change: PlannedChange,
}

impl CheckpointPlan {
    #[must_use]
    pub fn commit_phase(&self) -> CommitPhase {
        match self.change {
            PlannedChange::Replace { .. } => CommitPhase::Single,
            PlannedChange::Deferred => CommitPhase::TwoPhase,
        }
    }
}

/// Decide whether `invocation` needs a checkpoint.
///
/// Tools that do not modify files give `Ok(None)`. Relative paths are resolved
/// against `project_root`.
pub fn classify(
    invocation: &ToolInvocation,
    project_root: &Path,
) -> Result<Option<CheckpointPlan>, ClassifyError> {
    let Some(tool_type) = invocation.tool_type() else {
        tracing::debug!(tool = %invocation.name, "Tool does not modify files; no checkpoint");
        return Ok(None);
    };

    let input = &invocation.input;
    let raw_path = required_str(input, tool_type, tool_type.path_field())?;
    let file_path = resolve_path(project_root, raw_path);

    let change = match tool_type {
        ToolType::Write => PlannedChange::Replace {
            content: required_str(input, tool_type, "content")?.to_string(),
        },
        ToolType::Edit | ToolType::NotebookEdit => PlannedChange::Deferred,
        ToolType::MultiEdit => {
            let edits = input
                .get("edits")
                .and_then(Value::as_array)
                .ok_or(ClassifyError::MissingField {
                    tool: tool_type,
                    field: "edits",
                })?;
            if edits.is_empty() {
                tracing::debug!(
                    path = %file_path.display(),
                    "MultiEdit with no edits; no checkpoint"
                );
                return Ok(None);
            }
            // All edits of one invocation land together, so they share one checkpoint.
            PlannedChange::Deferred
        }
    };

    Ok(Some(CheckpointPlan {
        tool_type,
        file_path,
        change,
    }))
}

/// Current text content of `path`. A missing file reads as empty.
pub fn read_existing(path: &Path) -> Result<String, ClassifyError> {
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(String::new()),
        Err(source) => {
            return Err(ClassifyError::SourceRead {
                path: path.to_path_buf(),
                source,
            });
        }
    };
    String::from_utf8(bytes).map_err(|_| ClassifyError::BinaryContent {
        path: path.to_path_buf(),
    })
}

fn required_str<'a>(
    input: &'a Value,
    tool: ToolType,
    field: &'static str,
) -> Result<&'a str, ClassifyError> {
    input
        .get(field)
        .and_then(Value::as_str)
        .filter(|s| field == "content" || !s.trim().is_empty())
        .ok_or(ClassifyError::MissingField { tool, field })
}

/// Join `raw` onto `root` when relative and drop `.`/`..` components lexically.
fn resolve_path(root: &Path, raw: &str) -> PathBuf {
    let joined = root.join(raw);
    let mut out = PathBuf::new();
    for component in joined.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}
