//! Paged access to GitHub list endpoints
//!
//! The total length is derived when the list is opened: the first page gives
//! the page count through its `Link` header, and the last page gives the
//! remainder. Those two pages stay cached; of the others only the most
//! recently fetched one is kept.

use crate::github::GitHubClient;
use crate::transport::{Item, PagedList, TransportError};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

/// A GitHub list endpoint exposed as a `PagedList`
#[derive(Debug)]
pub struct GitHubList {
    client: GitHubClient,
    path: String,
    query: Vec<(String, String)>,
    len: usize,
    page_len: usize,

    /// First, last and most recent page, keyed by zero-based page index
    cache: Mutex<HashMap<usize, Vec<Item>>>,
}

impl GitHubList {
    /// Opens a list, fetching at most its first and last page
    pub async fn open(
        client: GitHubClient,
        path: String,
        query: Vec<(String, String)>,
    ) -> Result<Self, TransportError> {
        let page_len = client.per_page().max(1);
        let (first, links) = client.get_page(&path, &query, 1).await?;
        let first: Vec<Item> = first.into_iter().map(Item::from_raw).collect();

        let mut cache = HashMap::new();
        let len = match links.last_page {
            Some(last) if last > 1 => {
                let (tail, _) = client.get_page(&path, &query, last).await?;
                let tail: Vec<Item> = tail.into_iter().map(Item::from_raw).collect();
                let len = (last - 1) * page_len + tail.len();
                cache.insert(last - 1, tail);
                len
            }
            _ => first.len(),
        };
        cache.insert(0, first);

        tracing::debug!("Opened {} with {} items", path, len);

        Ok(Self {
            client,
            path,
            query,
            len,
            page_len,
            cache: Mutex::new(cache),
        })
    }

    fn cached(&self, page: usize) -> Option<Vec<Item>> {
        self.cache
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(&page)
            .cloned()
    }

    fn pinned(&self, page: usize) -> bool {
        page == 0 || page + 1 == self.page_count()
    }
}

#[async_trait]
impl PagedList for GitHubList {
    fn len(&self) -> usize {
        self.len
    }

    fn page_len(&self) -> usize {
        self.page_len
    }

    async fn page(&self, page: usize) -> Result<Vec<Item>, TransportError> {
        if page >= self.page_count() {
            return Ok(Vec::new());
        }
        if let Some(items) = self.cached(page) {
            return Ok(items);
        }

        let (raw, _) = self.client.get_page(&self.path, &self.query, page + 1).await?;
        let items: Vec<Item> = raw.into_iter().map(Item::from_raw).collect();
        let mut cache = self.cache.lock().unwrap_or_else(|e| e.into_inner());
        cache.retain(|&cached, _| self.pinned(cached));
        cache.insert(page, items.clone());
        Ok(items)
    }
}
