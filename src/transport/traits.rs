//! Transport traits and error types
//!
//! This module defines the trait interface for remote list providers and
//! the error kinds the extraction engine dispatches on.

use crate::config::IssueState;
use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

/// How the extraction engine should react to a failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    /// Quota exhausted: flush, sleep until the reset time, retry the same item
    Quota,

    /// Connection-level failure: flush, wait a fixed interval, retry the same item
    Transient,

    /// Anything else: flush and stop
    Fatal,
}

/// Errors that can occur while talking to the remote API
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    #[error("Rate limit exhausted, resets at epoch {reset}")]
    RateLimited { reset: i64 },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Server error {status} for {url}")]
    Server { status: u16, url: String },

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Unexpected HTTP {status} for {url}")]
    Status { status: u16, url: String },

    #[error("Malformed response from {url}: {message}")]
    Decode { url: String, message: String },

    #[error("Index {index} out of range for list of {len} items")]
    OutOfRange { index: usize, len: usize },
}

impl TransportError {
    /// Returns the failure kind the engine uses to pick a recovery
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::RateLimited { .. } => FailureKind::Quota,
            Self::Network(_) | Self::Server { .. } => FailureKind::Transient,
            _ => FailureKind::Fatal,
        }
    }

    /// Returns the quota reset epoch carried by a rate-limit failure
    pub fn reset_epoch(&self) -> Option<i64> {
        match self {
            Self::RateLimited { reset } => Some(*reset),
            _ => None,
        }
    }
}

/// Snapshot of the remote call budget
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimit {
    /// Calls allowed per window
    pub limit: u32,

    /// Calls left in the current window
    pub remaining: u32,

    /// Unix epoch (seconds) at which the window resets
    pub reset: i64,
}

/// A remote entity together with its public number
#[derive(Debug, Clone, PartialEq)]
pub struct Item {
    /// Stable public identifier; not the item's index in a list
    pub number: u64,

    /// The raw payload as returned by the API
    pub raw: Value,
}

impl Item {
    /// Wraps a raw payload, reading its number from `number`, then `id`
    ///
    /// Payloads with neither (commits) get number 0; they are never range-resolved.
    pub fn from_raw(raw: Value) -> Self {
        let number = raw
            .get("number")
            .and_then(Value::as_u64)
            .or_else(|| raw.get("id").and_then(Value::as_u64))
            .unwrap_or(0);
        Self { number, raw }
    }
}

/// A remote collection exposed in fixed-size pages
///
/// Item numbers are strictly ascending across the whole list, but page
/// boundaries carry no relation to number values.
#[async_trait]
pub trait PagedList: Send + Sync {
    /// Total number of items in the list
    fn len(&self) -> usize;

    /// Number of items on every page but the last
    fn page_len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn page_count(&self) -> usize {
        self.len().div_ceil(self.page_len().max(1))
    }

    /// Fetches the page at the given zero-based page index
    async fn page(&self, page: usize) -> Result<Vec<Item>, TransportError>;

    /// Fetches a single item by its zero-based index
    async fn item(&self, index: usize) -> Result<Item, TransportError> {
        let len = self.len();
        if index >= len {
            return Err(TransportError::OutOfRange { index, len });
        }

        let page_len = self.page_len().max(1);
        self.page(index / page_len)
            .await?
            .into_iter()
            .nth(index % page_len)
            .ok_or(TransportError::OutOfRange { index, len })
    }
}

/// The remote API as seen by the extraction engine
///
/// Every method performs at most a bounded number of remote calls; lists
/// fetch their pages lazily.
#[async_trait]
pub trait Transport: Send + Sync {
    type List: PagedList;

    /// Probes the credential and returns the authenticated login
    async fn authenticated_user(&self) -> Result<String, TransportError>;

    /// Queries the authoritative quota state
    async fn rate_limit(&self) -> Result<RateLimit, TransportError>;

    /// Quota state observed on the most recent response, if any
    fn last_rate_limit(&self) -> Option<RateLimit>;

    /// Lists issues in the given state, oldest first
    async fn issues(&self, state: IssueState) -> Result<Self::List, TransportError>;

    /// Fetches the pull request behind an issue number
    async fn pull_request(&self, number: u64) -> Result<Value, TransportError>;

    /// Lists the commits of a pull request, oldest first
    async fn pull_commits(&self, number: u64) -> Result<Self::List, TransportError>;

    /// Fetches a single commit including its changed files
    async fn commit(&self, sha: &str) -> Result<Value, TransportError>;

    /// Lists the comments of an issue, oldest first
    async fn issue_comments(&self, number: u64) -> Result<Self::List, TransportError>;
}
