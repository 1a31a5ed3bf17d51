use std::fmt;
use std::path::PathBuf;

use serde::Serialize;

/// Which way a rewind moves file state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RevertDirection {
    /// Restore the content each file had before the window.
    Revert,
    /// Re-apply the content each file had after the window.
    Unrevert,
}

impl RevertDirection {
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Revert => "revert",
            Self::Unrevert => "unrevert",
        }
    }
}

impl fmt::Display for RevertDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A file that could not be rewritten.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileFailure {
    pub path: PathBuf,
    pub error: String,
}

/// Outcome of a revert or unrevert over one window.
///
/// Always carries both lists; callers never need to distinguish result shapes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RevertReport {
    pub direction: RevertDirection,
    pub succeeded: Vec<PathBuf>,
    pub failed: Vec<FileFailure>,
}

impl RevertReport {
    #[must_use]
    pub fn new(direction: RevertDirection) -> Self {
        Self {
            direction,
            succeeded: Vec::new(),
            failed: Vec::new(),
        }
    }

    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }

    /// Some files changed and some did not.
    #[must_use]
    pub fn is_partial(&self) -> bool {
        !self.failed.is_empty() && !self.succeeded.is_empty()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.succeeded.is_empty() && self.failed.is_empty()
    }

    #[must_use]
    pub fn summary_line(&self) -> String {
        if self.failed.is_empty() {
            format!("{}: {} file(s) restored", self.direction, self.succeeded.len())
        } else {
            format!(
                "{}: {} file(s) restored, {} failed",
                self.direction,
                self.succeeded.len(),
                self.failed.len()
            )
        }
    }
}
