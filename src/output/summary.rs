//! Run summary accumulation and rendering
//!
//! The engine fills a `RunSummary` as it walks the range; the binary prints
//! it once the run ends.

use crate::config::IssueState;
use crate::range::ResolvedRange;
use chrono::{DateTime, Utc};
use std::fmt::Write as _;
use std::path::PathBuf;

/// Counters collected over one extraction run
#[derive(Debug, Clone)]
pub struct RunSummary {
    /// Repository the run mined, as `owner/name`
    pub repo: String,

    pub state: IssueState,

    /// Output document the run merged into
    pub output_path: PathBuf,

    /// Indices and numbers the requested range resolved to
    pub resolved: Option<ResolvedRange>,

    /// Items whose records were added to the output
    pub items_written: u64,

    /// Items dropped because they were closed, unmerged pull requests
    pub items_skipped: u64,

    /// Checkpoint writes, including the final one
    pub flushes: u64,

    /// Quota backoffs taken
    pub rate_limit_waits: u64,

    /// Retries after connection-level failures
    pub network_retries: u64,

    /// Number of the first item processed
    pub first_number: Option<u64>,

    /// Number of the last item processed
    pub last_number: Option<u64>,

    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl RunSummary {
    pub fn new(repo: impl Into<String>, state: IssueState, output_path: PathBuf) -> Self {
        Self {
            repo: repo.into(),
            state,
            output_path,
            resolved: None,
            items_written: 0,
            items_skipped: 0,
            flushes: 0,
            rate_limit_waits: 0,
            network_retries: 0,
            first_number: None,
            last_number: None,
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    /// Records a processed item, written or skipped
    pub fn record_item(&mut self, number: u64, written: bool) {
        if written {
            self.items_written += 1;
        } else {
            self.items_skipped += 1;
        }
        self.first_number.get_or_insert(number);
        self.last_number = Some(number);
    }

    /// Items processed in total
    pub fn items_processed(&self) -> u64 {
        self.items_written + self.items_skipped
    }

    pub fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
    }

    /// Wall-clock seconds between start and finish (or now, if unfinished)
    pub fn duration_seconds(&self) -> i64 {
        let end = self.finished_at.unwrap_or_else(Utc::now);
        (end - self.started_at).num_seconds().max(0)
    }
}

/// Renders a summary as the human-readable block printed at the end of a run
pub fn render_summary(summary: &RunSummary) -> String {
    let mut out = String::new();

    let _ = writeln!(out, "=== Extraction Summary ===\n");
    let _ = writeln!(out, "Repository: {} ({} issues)", summary.repo, summary.state);
    let _ = writeln!(out, "Output: {}", summary.output_path.display());

    if let Some(resolved) = &summary.resolved {
        let _ = writeln!(
            out,
            "Range: #{} to #{} (indices {}..={}){}",
            resolved.start_number,
            resolved.end_number,
            resolved.start_index,
            resolved.end_index,
            if resolved.clamped { ", clamped" } else { "" }
        );
    }
    let _ = writeln!(out);

    let _ = writeln!(out, "Items:");
    let _ = writeln!(out, "  Written: {}", summary.items_written);
    let _ = writeln!(out, "  Skipped: {}", summary.items_skipped);
    if let (Some(first), Some(last)) = (summary.first_number, summary.last_number) {
        let _ = writeln!(out, "  Processed: #{} to #{}", first, last);
    }
    let _ = writeln!(out);

    let _ = writeln!(out, "Recovery:");
    let _ = writeln!(out, "  Rate limit waits: {}", summary.rate_limit_waits);
    let _ = writeln!(out, "  Network retries: {}", summary.network_retries);
    let _ = writeln!(out, "  Checkpoint flushes: {}", summary.flushes);
    let _ = writeln!(out);

    let _ = write!(out, "Duration: {}s", summary.duration_seconds());
    out
}

/// Prints a summary to stdout
pub fn print_summary(summary: &RunSummary) {
    println!("{}", render_summary(summary));
}
