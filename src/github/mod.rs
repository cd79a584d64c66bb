//! GitHub module implementing the transport over the REST API
//!
//! This module handles:
//! - Authenticated requests and response classification (`GitHubClient`)
//! - Lazily fetched, cached pages of list endpoints (`GitHubList`)
//! - Parsing `Link` pagination and `x-ratelimit-*` headers

mod client;
mod list;

pub use client::{classify_status, GitHubClient};
pub use list::GitHubList;

use crate::transport::RateLimit;
use reqwest::header::HeaderMap;
use url::Url;

/// Page numbers announced by a `Link` header
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LinkPagination {
    pub next_page: Option<usize>,
    pub last_page: Option<usize>,
}

/// Parses a GitHub `Link` header
///
/// Format: `<https://api.github.com/...?page=2>; rel="next", <...?page=5>; rel="last"`
pub fn parse_link_header(link_header: &str) -> LinkPagination {
    let mut info = LinkPagination::default();

    for part in link_header.split(',') {
        let mut url = None;
        let mut rel = None;

        for segment in part.split(';') {
            let segment = segment.trim();
            if let Some(inner) = segment.strip_prefix('<').and_then(|s| s.strip_suffix('>')) {
                url = Some(inner);
            } else if let Some(value) = segment.strip_prefix("rel=") {
                rel = Some(value.trim_matches('"'));
            }
        }

        if let (Some(url), Some(rel)) = (url, rel) {
            if let Some(page) = page_from_url(url) {
                match rel {
                    "next" => info.next_page = Some(page),
                    "last" => info.last_page = Some(page),
                    _ => {}
                }
            }
        }
    }

    info
}

fn page_from_url(url: &str) -> Option<usize> {
    Url::parse(url)
        .ok()?
        .query_pairs()
        .find(|(key, _)| key == "page")
        .and_then(|(_, value)| value.parse().ok())
}

/// Reads the `x-ratelimit-*` headers of a response
pub fn parse_rate_limit_headers(headers: &HeaderMap) -> Option<RateLimit> {
    let header = |name: &str| headers.get(name).and_then(|v| v.to_str().ok());

    Some(RateLimit {
        limit: header("x-ratelimit-limit")?.parse().ok()?,
        remaining: header("x-ratelimit-remaining")?.parse().ok()?,
        reset: header("x-ratelimit-reset")?.parse().ok()?,
    })
}
