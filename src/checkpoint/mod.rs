//! Checkpoint module for persisting extraction results
//!
//! This module handles:
//! - Recursively merging partial results into the accumulated document
//! - Reading the document leniently (missing or corrupt files start empty)
//! - Rewriting the document on every flush

mod merge;
mod store;

pub use merge::merge_into;
pub use store::CheckpointStore;

use thiserror::Error;

/// Errors that can occur while flushing a checkpoint
#[derive(Debug, Error)]
pub enum CheckpointError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
