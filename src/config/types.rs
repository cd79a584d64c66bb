use crate::range::RequestedRange;
use crate::schema::EntityType;
use serde::Deserialize;
use std::fmt;
use std::path::PathBuf;

/// Main configuration structure for Repo-Miner
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Repository to mine, as `owner/name`
    pub repo: String,

    /// File holding the bearer credential
    #[serde(rename = "auth-path")]
    pub auth_path: PathBuf,

    /// Which issues to list
    pub state: IssueState,

    /// Inclusive range of item numbers to mine
    pub range: (u64, u64),

    /// Directory the output document is written to
    #[serde(rename = "output-dir", default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Base URL of the REST API
    #[serde(rename = "api-url", default = "default_api_url")]
    pub api_url: String,

    #[serde(rename = "issue-fields", default)]
    pub issue_fields: Vec<String>,

    #[serde(rename = "pr-fields", default)]
    pub pr_fields: Vec<String>,

    #[serde(rename = "commit-fields", default)]
    pub commit_fields: Vec<String>,

    #[serde(rename = "comment-fields", default)]
    pub comment_fields: Vec<String>,

    #[serde(default)]
    pub engine: EngineConfig,
}

impl Config {
    /// The requested item-number range
    pub fn requested_range(&self) -> RequestedRange {
        RequestedRange::new(self.range.0, self.range.1)
    }

    /// Configured field names for an entity type
    pub fn fields_for(&self, entity: EntityType) -> &[String] {
        match entity {
            EntityType::Issue => &self.issue_fields,
            EntityType::Pr => &self.pr_fields,
            EntityType::Commit => &self.commit_fields,
            EntityType::Comment => &self.comment_fields,
        }
    }

    /// Path of the output document: `<output-dir>/<owner>_<name>_issue.json`
    pub fn output_path(&self) -> PathBuf {
        let slug = self.repo.replace('/', "_");
        self.output_dir
            .join(format!("{}_{}.json", slug, EntityType::Issue))
    }
}

/// Extraction loop tuning
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EngineConfig {
    /// Items requested per page from list endpoints
    #[serde(rename = "per-page", default = "default_per_page")]
    pub per_page: u32,

    /// Fixed wait after a connection-level failure (seconds)
    #[serde(rename = "network-retry-delay-secs", default = "default_retry_delay")]
    pub network_retry_delay_secs: u64,

    /// Consecutive connection-level failures tolerated before giving up
    #[serde(rename = "max-network-retries", default = "default_max_retries")]
    pub max_network_retries: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            per_page: default_per_page(),
            network_retry_delay_secs: default_retry_delay(),
            max_network_retries: default_max_retries(),
        }
    }
}

/// Issue state filter applied when listing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IssueState {
    Open,
    Closed,
}

impl IssueState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Closed => "closed",
        }
    }
}

impl fmt::Display for IssueState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn default_output_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_api_url() -> String {
    "https://api.github.com".to_string()
}

fn default_per_page() -> u32 {
    100
}

fn default_retry_delay() -> u64 {
    10
}

fn default_max_retries() -> u32 {
    5
}
