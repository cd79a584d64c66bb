//! Output module for run summaries
//!
//! This module handles:
//! - Counting written, skipped and retried items during a run
//! - Rendering the end-of-run summary for the console

mod summary;

pub use summary::{print_summary, render_summary, RunSummary};
