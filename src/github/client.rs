//! GitHub REST client
//!
//! This module handles all HTTP requests to the GitHub API, including:
//! - Building the HTTP client with credential and API headers
//! - Classifying responses into typed transport errors
//! - Tracking the rate-limit headers of every response
//! - Implementing `Transport` on top of paged list endpoints

use crate::config::{Config, IssueState};
use crate::github::list::GitHubList;
use crate::github::{parse_link_header, parse_rate_limit_headers, LinkPagination};
use crate::transport::{RateLimit, Transport, TransportError};
use crate::MinerError;
use async_trait::async_trait;
use chrono::Utc;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, RETRY_AFTER};
use reqwest::{Client, Response, StatusCode};
use serde_json::Value;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use url::Url;

/// Wait assumed for a 429 that names no reset time
const DEFAULT_RETRY_SECS: i64 = 60;

const API_VERSION: &str = "2022-11-28";

/// Client for one repository of a GitHub-compatible REST API
#[derive(Debug, Clone)]
pub struct GitHubClient {
    http: Client,
    api_url: Url,
    repo: String,
    per_page: u32,
    last_rate_limit: Arc<Mutex<Option<RateLimit>>>,
}

impl GitHubClient {
    /// Creates a client for the configured repository
    ///
    /// # Arguments
    ///
    /// * `config` - Supplies the API base URL, the repository and the page size
    /// * `token` - Bearer credential sent with every request
    ///
    /// # Returns
    ///
    /// * `Ok(GitHubClient)` - Successfully built client
    /// * `Err(MinerError)` - The credential is not a valid header value, or the client could not be built
    pub fn new(config: &Config, token: &str) -> Result<Self, MinerError> {
        let api_url = Url::parse(&config.api_url)
            .map_err(|e| MinerError::Config(crate::ConfigError::InvalidUrl(e.to_string())))?;

        let mut auth = HeaderValue::from_str(&format!("Bearer {}", token))
            .map_err(|_| MinerError::Auth("credential contains invalid characters".to_string()))?;
        auth.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, auth);
        headers.insert(ACCEPT, HeaderValue::from_static("application/vnd.github+json"));
        headers.insert("x-github-api-version", HeaderValue::from_static(API_VERSION));

        let http = Client::builder()
            .user_agent(format!("repo-miner/{}", env!("CARGO_PKG_VERSION")))
            .default_headers(headers)
            .timeout(Duration::from_secs(30))
            .connect_timeout(Duration::from_secs(10))
            .gzip(true)
            .brotli(true)
            .build()?;

        Ok(Self {
            http,
            api_url,
            repo: config.repo.clone(),
            per_page: config.engine.per_page,
            last_rate_limit: Arc::new(Mutex::new(None)),
        })
    }

    pub fn repo(&self) -> &str {
        &self.repo
    }

    pub fn per_page(&self) -> usize {
        self.per_page as usize
    }

    /// Builds an absolute endpoint URL from a path relative to the API root
    pub(crate) fn endpoint(
        &self,
        path: &str,
        query: &[(String, String)],
    ) -> Result<Url, TransportError> {
        let base = self.api_url.as_str().trim_end_matches('/');
        let mut url = Url::parse(&format!("{}/{}", base, path.trim_start_matches('/')))
            .map_err(|e| TransportError::Decode {
                url: path.to_string(),
                message: e.to_string(),
            })?;
        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query);
        }
        Ok(url)
    }

    /// Sends a GET request and classifies the response status
    async fn get(&self, url: Url) -> Result<Response, TransportError> {
        tracing::debug!("GET {}", url);

        let response = self
            .http
            .get(url.clone())
            .send()
            .await
            .map_err(|e| from_reqwest(e, url.as_str()))?;

        if let Some(rate_limit) = parse_rate_limit_headers(response.headers()) {
            *self
                .last_rate_limit
                .lock()
                .unwrap_or_else(|e| e.into_inner()) = Some(rate_limit);
        }

        match classify_status(
            response.status(),
            response.headers(),
            url.as_str(),
            Utc::now().timestamp(),
        ) {
            None => Ok(response),
            Some(TransportError::Unauthorized(fallback)) => {
                let message = response
                    .json::<Value>()
                    .await
                    .ok()
                    .and_then(|body| body.get("message")?.as_str().map(str::to_string))
                    .unwrap_or(fallback);
                Err(TransportError::Unauthorized(message))
            }
            Some(error) => Err(error),
        }
    }

    /// Fetches a single JSON document
    pub(crate) async fn get_json(&self, path: &str) -> Result<Value, TransportError> {
        let url = self.endpoint(path, &[])?;
        let response = self.get(url.clone()).await?;
        response
            .json::<Value>()
            .await
            .map_err(|e| from_reqwest(e, url.as_str()))
    }

    /// Fetches one page (1-based) of a list endpoint together with its pagination links
    pub(crate) async fn get_page(
        &self,
        path: &str,
        query: &[(String, String)],
        page: usize,
    ) -> Result<(Vec<Value>, LinkPagination), TransportError> {
        let mut query = query.to_vec();
        query.push(("per_page".to_string(), self.per_page.to_string()));
        query.push(("page".to_string(), page.to_string()));

        let url = self.endpoint(path, &query)?;
        let response = self.get(url.clone()).await?;
        let links = response
            .headers()
            .get("link")
            .and_then(|v| v.to_str().ok())
            .map(parse_link_header)
            .unwrap_or_default();

        match response.json::<Value>().await {
            Ok(Value::Array(items)) => Ok((items, links)),
            Ok(_) => Err(TransportError::Decode {
                url: url.to_string(),
                message: "expected a JSON array".to_string(),
            }),
            Err(e) => Err(from_reqwest(e, url.as_str())),
        }
    }

    fn repo_path(&self, rest: &str) -> String {
        format!("repos/{}/{}", self.repo, rest)
    }
}

/// Maps a response status to a transport error; `None` for success
///
/// A 403 counts as a rate limit only when the quota headers say so.
pub fn classify_status(
    status: StatusCode,
    headers: &HeaderMap,
    url: &str,
    now: i64,
) -> Option<TransportError> {
    if status.is_success() {
        return None;
    }

    let header = |name: &str| headers.get(name).and_then(|v| v.to_str().ok());
    let exhausted = header("x-ratelimit-remaining") == Some("0");
    let retry_after = header(RETRY_AFTER.as_str()).and_then(|v| v.trim().parse::<i64>().ok());
    let reset = header("x-ratelimit-reset").and_then(|v| v.trim().parse::<i64>().ok());

    let error = match status {
        StatusCode::UNAUTHORIZED => TransportError::Unauthorized(url.to_string()),
        StatusCode::FORBIDDEN | StatusCode::TOO_MANY_REQUESTS
            if exhausted || retry_after.is_some() || status == StatusCode::TOO_MANY_REQUESTS =>
        {
            let reset = match (retry_after, reset) {
                (Some(secs), _) => now + secs,
                (None, Some(reset)) if exhausted => reset,
                _ => now + DEFAULT_RETRY_SECS,
            };
            TransportError::RateLimited { reset }
        }
        StatusCode::FORBIDDEN => TransportError::Forbidden(url.to_string()),
        StatusCode::NOT_FOUND => TransportError::NotFound(url.to_string()),
        s if s.is_server_error() => TransportError::Server {
            status: s.as_u16(),
            url: url.to_string(),
        },
        s => TransportError::Status {
            status: s.as_u16(),
            url: url.to_string(),
        },
    };
    Some(error)
}

/// Classifies a reqwest failure
fn from_reqwest(e: reqwest::Error, url: &str) -> TransportError {
    if e.is_decode() {
        TransportError::Decode {
            url: url.to_string(),
            message: e.to_string(),
        }
    } else if e.is_timeout() {
        TransportError::Network(format!("request to {} timed out", url))
    } else if e.is_connect() {
        TransportError::Network(format!("could not connect to {}", url))
    } else {
        TransportError::Network(e.to_string())
    }
}

#[async_trait]
impl Transport for GitHubClient {
    type List = GitHubList;

    async fn authenticated_user(&self) -> Result<String, TransportError> {
        let user = self.get_json("user").await?;
        user.get("login")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| TransportError::Decode {
                url: "user".to_string(),
                message: "missing login".to_string(),
            })
    }

    async fn rate_limit(&self) -> Result<RateLimit, TransportError> {
        let body = self.get_json("rate_limit").await?;
        let core = body
            .pointer("/resources/core")
            .or_else(|| body.get("rate"))
            .ok_or_else(|| TransportError::Decode {
                url: "rate_limit".to_string(),
                message: "missing core resource".to_string(),
            })?;

        let field = |name: &str| core.get(name).and_then(Value::as_i64).unwrap_or(0);
        let rate_limit = RateLimit {
            limit: field("limit").max(0) as u32,
            remaining: field("remaining").max(0) as u32,
            reset: field("reset"),
        };
        *self
            .last_rate_limit
            .lock()
            .unwrap_or_else(|e| e.into_inner()) = Some(rate_limit);
        Ok(rate_limit)
    }

    fn last_rate_limit(&self) -> Option<RateLimit> {
        *self
            .last_rate_limit
            .lock()
            .unwrap_or_else(|e| e.into_inner())
    }

    async fn issues(&self, state: IssueState) -> Result<GitHubList, TransportError> {
        let query = vec![
            ("state".to_string(), state.as_str().to_string()),
            ("sort".to_string(), "created".to_string()),
            ("direction".to_string(), "asc".to_string()),
        ];
        GitHubList::open(self.clone(), self.repo_path("issues"), query).await
    }

    async fn pull_request(&self, number: u64) -> Result<Value, TransportError> {
        self.get_json(&self.repo_path(&format!("pulls/{}", number)))
            .await
    }

    async fn pull_commits(&self, number: u64) -> Result<GitHubList, TransportError> {
        let path = self.repo_path(&format!("pulls/{}/commits", number));
        GitHubList::open(self.clone(), path, Vec::new()).await
    }

    async fn commit(&self, sha: &str) -> Result<Value, TransportError> {
        self.get_json(&self.repo_path(&format!("commits/{}", sha)))
            .await
    }

    async fn issue_comments(&self, number: u64) -> Result<GitHubList, TransportError> {
        let path = self.repo_path(&format!("issues/{}/comments", number));
        GitHubList::open(self.clone(), path, Vec::new()).await
    }
}
