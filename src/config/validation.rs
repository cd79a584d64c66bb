use crate::config::types::{Config, EngineConfig};
use crate::schema::SchemaRegistry;
use crate::ConfigError;
use url::Url;

/// Validates the entire configuration, including field names against the schema
pub fn validate(config: &Config, registry: &SchemaRegistry) -> Result<(), ConfigError> {
    validate_repo(&config.repo)?;
    validate_range(config.range)?;
    validate_api_url(&config.api_url)?;
    validate_engine_config(&config.engine)?;

    if config.auth_path.as_os_str().is_empty() {
        return Err(ConfigError::Validation(
            "auth-path cannot be empty".to_string(),
        ));
    }

    let selection = registry.selection(config)?;
    if selection.pr.is_empty() && !selection.commit.is_empty() {
        tracing::warn!("commit-fields are ignored because pr-fields is empty");
    }

    Ok(())
}

/// Validates the `owner/name` repository slug
fn validate_repo(repo: &str) -> Result<(), ConfigError> {
    let parts: Vec<&str> = repo.split('/').collect();
    if parts.len() != 2 || parts.iter().any(|p| p.is_empty()) {
        return Err(ConfigError::Validation(format!(
            "repo must have the form 'owner/name', got '{}'",
            repo
        )));
    }

    let valid = |s: &str| {
        s.chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
    };
    if !parts.iter().all(|p| valid(p)) {
        return Err(ConfigError::Validation(format!(
            "repo contains invalid characters: '{}'",
            repo
        )));
    }

    Ok(())
}

/// Validates the requested number range
fn validate_range((start, end): (u64, u64)) -> Result<(), ConfigError> {
    if start < 1 {
        return Err(ConfigError::Validation(format!(
            "range start must be >= 1, got {}",
            start
        )));
    }

    if start > end {
        return Err(ConfigError::Validation(format!(
            "range start ({}) must not exceed range end ({})",
            start, end
        )));
    }

    Ok(())
}

fn validate_api_url(api_url: &str) -> Result<(), ConfigError> {
    let url = Url::parse(api_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid api-url: {}", e)))?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::InvalidUrl(format!(
            "api-url '{}' must use http or https",
            api_url
        )));
    }

    Ok(())
}

/// Validates engine tuning
fn validate_engine_config(config: &EngineConfig) -> Result<(), ConfigError> {
    if config.per_page < 1 || config.per_page > 100 {
        return Err(ConfigError::Validation(format!(
            "per-page must be between 1 and 100, got {}",
            config.per_page
        )));
    }

    if config.max_network_retries < 1 {
        return Err(ConfigError::Validation(format!(
            "max-network-retries must be >= 1, got {}",
            config.max_network_retries
        )));
    }

    Ok(())
}
