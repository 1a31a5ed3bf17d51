//! Unified diff patches and stats.

use std::fmt::Write as _;

use similar::{ChangeTag, TextDiff};

/// Lines of unchanged context around each hunk.
const CONTEXT_RADIUS: usize = 3;

const DEV_NULL: &str = "/dev/null";

/// Lines added and removed between two texts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DiffStats {
    pub additions: u32,
    pub deletions: u32,
}

/// Produce a unified diff patch from `before` to `after`.
///
/// An empty `before` is a file creation (`--- /dev/null`); an empty `after` is a
/// deletion (`+++ /dev/null`). Identical inputs produce the two header lines only.
#[must_use]
pub fn unified_patch(display_name: &str, before: &str, after: &str) -> String {
    let mut out = patch_header(display_name, before.is_empty(), after.is_empty());

    let diff = TextDiff::from_lines(before, after);
    let mut unified = diff.unified_diff();
    unified.context_radius(CONTEXT_RADIUS);
    for hunk in unified.iter_hunks() {
        let _ = write!(out, "{hunk}");
    }
    out
}

/// Placeholder patch for a change whose final content is not yet known.
#[must_use]
pub fn pending_patch(display_name: &str) -> String {
    let mut out = patch_header(display_name, false, false);
    out.push_str("# pending: final content not yet recorded\n");
    out
}

fn patch_header(display_name: &str, created: bool, deleted: bool) -> String {
    let old = if created { DEV_NULL } else { display_name };
    let new = if deleted { DEV_NULL } else { display_name };
    format!("--- {old}\n+++ {new}\n")
}

/// Count added and removed lines between `before` and `after`.
#[must_use]
pub fn diff_stats(before: &str, after: &str) -> DiffStats {
    let diff = TextDiff::from_lines(before, after);

    let mut stats = DiffStats::default();
    for change in diff.iter_all_changes() {
        match change.tag() {
            ChangeTag::Insert => stats.additions = stats.additions.saturating_add(1),
            ChangeTag::Delete => stats.deletions = stats.deletions.saturating_add(1),
            ChangeTag::Equal => {}
        }
    }
    stats
}
