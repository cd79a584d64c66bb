//! Configuration module for Repo-Miner
//!
//! This module handles loading, parsing, and validating TOML configuration
//! files, and reading the credential file they point to.
//!
//! # Example
//!
//! ```no_run
//! use repo_miner::config::load_config;
//! use repo_miner::SchemaRegistry;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("miner.toml"), &SchemaRegistry::new()).unwrap();
//! println!("Mining items {:?} of {}", config.range, config.repo);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{Config, EngineConfig, IssueState};

// Re-export parser functions
pub use parser::{
    compute_config_hash, load_config, load_config_with_hash, parse_config, read_auth_token,
};
