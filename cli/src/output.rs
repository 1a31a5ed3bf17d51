//! Plain-text rendering of engine results.

use std::fmt::Write as _;

use chrono::{DateTime, Local};
use rollback_engine::ResolveOutcome;
use rollback_types::{Checkpoint, CheckpointContent, RevertReport, Timestamp};
use rollback_utils::diff_stats;

fn format_timestamp(ts: Timestamp) -> String {
    DateTime::from_timestamp_millis(ts.as_millis()).map_or_else(
        || ts.to_string(),
        |dt| {
            dt.with_timezone(&Local)
                .format("%Y-%m-%d %H:%M:%S")
                .to_string()
        },
    )
}

pub(crate) fn checkpoint_line(checkpoint: &Checkpoint) -> String {
    let change = match &checkpoint.new_content {
        CheckpointContent::Pending => "pending".to_string(),
        CheckpointContent::Resolved(new) => {
            let stats = diff_stats(&checkpoint.old_content, new);
            format!("+{} -{}", stats.additions, stats.deletions)
        }
    };
    format!(
        "{}  {}  {:<12} {:<10} {}",
        checkpoint.id,
        format_timestamp(checkpoint.timestamp),
        checkpoint.tool_type.as_str(),
        change,
        checkpoint.file_path.display()
    )
}

pub(crate) fn outcome_line(outcome: &ResolveOutcome) -> String {
    match outcome {
        ResolveOutcome::Resolved(checkpoint) => {
            format!("resolved {}", checkpoint_line(checkpoint))
        }
        ResolveOutcome::Orphaned { id, path, reason } => {
            format!("orphaned {id}  {}: {reason}", path.display())
        }
    }
}

pub(crate) fn report(report: &RevertReport) -> String {
    let mut out = report.summary_line();
    out.push('\n');
    for path in &report.succeeded {
        let _ = writeln!(out, "  ok      {}", path.display());
    }
    for failure in &report.failed {
        let _ = writeln!(out, "  failed  {}: {}", failure.path.display(), failure.error);
    }
    out
}
