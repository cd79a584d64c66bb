use crate::config::types::Config;
use crate::config::validation::validate;
use crate::schema::SchemaRegistry;
use crate::ConfigError;
use sha2::{Digest, Sha256};
use std::path::Path;

/// Loads and parses a configuration file from the given path
///
/// # Arguments
///
/// * `path` - Path to the TOML configuration file
/// * `registry` - Schema the configured field names are checked against
///
/// # Returns
///
/// * `Ok(Config)` - Successfully loaded and validated configuration
/// * `Err(ConfigError)` - Failed to load, parse, or validate the configuration
///
/// # Example
///
/// ```no_run
/// use std::path::Path;
/// use repo_miner::config::load_config;
/// use repo_miner::SchemaRegistry;
///
/// let config = load_config(Path::new("miner.toml"), &SchemaRegistry::new()).unwrap();
/// println!("Mining {}", config.repo);
/// ```
pub fn load_config(path: &Path, registry: &SchemaRegistry) -> Result<Config, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    parse_config(&content, registry)
}

/// Parses and validates configuration text
pub fn parse_config(content: &str, registry: &SchemaRegistry) -> Result<Config, ConfigError> {
    let config: Config = toml::from_str(content)?;
    validate(&config, registry)?;
    Ok(config)
}

/// Computes a SHA-256 hash of the configuration file content
///
/// Logged with every run so output documents can be traced back to the
/// configuration that produced them.
pub fn compute_config_hash(path: &Path) -> Result<String, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    let result = hasher.finalize();
    Ok(hex::encode(result))
}

/// Loads a configuration and returns both the config and its hash
pub fn load_config_with_hash(
    path: &Path,
    registry: &SchemaRegistry,
) -> Result<(Config, String), ConfigError> {
    let config = load_config(path, registry)?;
    let hash = compute_config_hash(path)?;
    Ok((config, hash))
}

/// Reads the bearer credential from the first non-empty line of a file
pub fn read_auth_token(path: &Path) -> Result<String, ConfigError> {
    let content = std::fs::read_to_string(path)
        .map_err(|_| ConfigError::MissingToken(path.to_path_buf()))?;

    content
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .map(String::from)
        .ok_or_else(|| ConfigError::MissingToken(path.to_path_buf()))
}
