//! JSON checkpoint file persistence
//!
//! The output document is the checkpoint: every flush reads it, merges the
//! new records in and writes it back.

use crate::checkpoint::{merge_into, CheckpointError};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};

/// Reads and rewrites the merged output document at a fixed path
#[derive(Debug, Clone)]
pub struct CheckpointStore {
    path: PathBuf,
}

impl CheckpointStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the current document
    ///
    /// A missing file, unreadable file, or malformed JSON reads as an empty map.
    pub fn load(&self) -> Map<String, Value> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) => {
                if e.kind() != std::io::ErrorKind::NotFound {
                    tracing::warn!("Could not read {}: {}", self.path.display(), e);
                }
                return Map::new();
            }
        };

        match serde_json::from_str::<Value>(&content) {
            Ok(Value::Object(map)) => map,
            Ok(_) => {
                tracing::warn!(
                    "{} does not hold a JSON object, starting from an empty document",
                    self.path.display()
                );
                Map::new()
            }
            Err(e) => {
                tracing::warn!(
                    "{} is not valid JSON ({}), starting from an empty document",
                    self.path.display(),
                    e
                );
                Map::new()
            }
        }
    }

    /// Merges `partial` into the document on disk and rewrites it
    ///
    /// The merged document is written to a sibling temporary file that then
    /// replaces the target, so earlier results survive an interrupted write.
    pub fn flush_merge(&self, partial: &Map<String, Value>) -> Result<(), CheckpointError> {
        let mut document = self.load();
        merge_into(&mut document, partial);

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let json = serde_json::to_string_pretty(&Value::Object(document))?;
        let tmp = self.tmp_path();
        std::fs::write(&tmp, json)?;
        std::fs::rename(&tmp, &self.path)?;

        tracing::debug!(
            "Flushed {} records to {}",
            partial.len(),
            self.path.display()
        );
        Ok(())
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}
