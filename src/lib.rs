//! Repo-Miner: a resumable miner for rate-limited repository APIs
//!
//! This crate extracts issues, pull requests, commits and comments from the
//! GitHub REST API into a JSON document that is merged incrementally, so an
//! interrupted or rate-limited run can always be resumed.

pub mod checkpoint;
pub mod config;
pub mod engine;
pub mod github;
pub mod output;
pub mod quota;
pub mod range;
pub mod schema;
pub mod state;
pub mod transport;

use std::path::PathBuf;
use thiserror::Error;
use transport::{FailureKind, TransportError};

/// Main error type for Repo-Miner operations
#[derive(Debug, Error)]
pub enum MinerError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Invalid credentials: {0}")]
    Auth(String),

    #[error("Repository not found or inaccessible: {0}")]
    UnknownResource(String),

    #[error("No {state} issues found in {repo}")]
    NoItems { repo: String, state: String },

    #[error("Transport error: {0}")]
    Transport(TransportError),

    #[error("Giving up after {attempts} consecutive network failures: {source}")]
    RetriesExhausted {
        attempts: u32,
        source: TransportError,
    },

    #[error("Checkpoint error: {0}")]
    Checkpoint(#[from] checkpoint::CheckpointError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("Extraction cancelled by operator")]
    Cancelled,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl MinerError {
    /// Classifies this error for the extraction state machine
    ///
    /// Only transport failures can be recovered locally; everything else ends the run.
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::Transport(e) => e.kind(),
            _ => FailureKind::Fatal,
        }
    }

    /// Quota reset epoch carried by a rate-limit failure
    pub fn reset_epoch(&self) -> Option<i64> {
        match self {
            Self::Transport(e) => e.reset_epoch(),
            _ => None,
        }
    }
}

impl From<TransportError> for MinerError {
    fn from(e: TransportError) -> Self {
        match e {
            TransportError::Unauthorized(msg) => Self::Auth(msg),
            TransportError::NotFound(url) | TransportError::Forbidden(url) => {
                Self::UnknownResource(url)
            }
            other => Self::Transport(other),
        }
    }
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("Unknown {entity} field '{field}' (allowed: {allowed})")]
    UnknownField {
        entity: schema::EntityType,
        field: String,
        allowed: String,
    },

    #[error("No credential found in {}", .0.display())]
    MissingToken(PathBuf),
}

/// Result type alias for Repo-Miner operations
pub type Result<T> = std::result::Result<T, MinerError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use config::Config;
pub use engine::Extractor;
pub use schema::{EntityType, SchemaRegistry};
pub use state::ExtractionState;
