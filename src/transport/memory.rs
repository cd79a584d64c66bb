//! In-memory transport
//!
//! Serves fixed payloads through the same traits as the GitHub client, records
//! every call it receives, and can be told to fail specific calls. Used to run
//! the engine without a network.

use crate::config::IssueState;
use crate::transport::{Item, PagedList, RateLimit, Transport, TransportError};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Which list a paged call was made against
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListName {
    Issues,
    Commits(u64),
    Comments(u64),
}

/// A call observed by the in-memory transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    AuthenticatedUser,
    RateLimit,
    Issues,
    PullRequest(u64),
    PullCommits(u64),
    Commit(String),
    IssueComments(u64),
    Page { list: ListName, page: usize },
    Item { list: ListName, index: usize },
}

#[derive(Debug)]
struct Shared {
    calls: Mutex<Vec<Call>>,
    faults: Mutex<Vec<(Call, TransportError)>>,
    quota: Mutex<RateLimit>,
}

impl Shared {
    /// Records a call and returns the first pending fault scheduled for it
    fn enter(&self, call: Call) -> Result<(), TransportError> {
        {
            let mut quota = self.quota.lock().unwrap_or_else(|e| e.into_inner());
            quota.remaining = quota.remaining.saturating_sub(1);
        }
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(call.clone());

        let mut faults = self.faults.lock().unwrap_or_else(|e| e.into_inner());
        match faults.iter().position(|(c, _)| *c == call) {
            Some(pos) => Err(faults.remove(pos).1),
            None => Ok(()),
        }
    }
}

/// A paged list backed by a vector
pub struct MemoryList {
    name: ListName,
    items: Vec<Item>,
    page_len: usize,
    shared: Arc<Shared>,
}

impl MemoryList {
    /// Numbers of all items, in list order
    pub fn numbers(&self) -> Vec<u64> {
        self.items.iter().map(|i| i.number).collect()
    }
}

#[async_trait]
impl PagedList for MemoryList {
    fn len(&self) -> usize {
        self.items.len()
    }

    fn page_len(&self) -> usize {
        self.page_len
    }

    async fn page(&self, page: usize) -> Result<Vec<Item>, TransportError> {
        self.shared.enter(Call::Page {
            list: self.name.clone(),
            page,
        })?;
        Ok(self
            .items
            .chunks(self.page_len)
            .nth(page)
            .map(<[Item]>::to_vec)
            .unwrap_or_default())
    }

    async fn item(&self, index: usize) -> Result<Item, TransportError> {
        self.shared.enter(Call::Item {
            list: self.name.clone(),
            index,
        })?;
        self.items
            .get(index)
            .cloned()
            .ok_or(TransportError::OutOfRange {
                index,
                len: self.items.len(),
            })
    }
}

/// Transport serving canned payloads from memory
///
/// Clones share the call log, the fault schedule and the quota.
#[derive(Clone)]
pub struct MemoryTransport {
    page_len: usize,
    login: Option<String>,
    issues: Vec<Value>,
    pulls: HashMap<u64, Value>,
    pull_commits: HashMap<u64, Vec<Value>>,
    commits: HashMap<String, Value>,
    comments: HashMap<u64, Vec<Value>>,
    shared: Arc<Shared>,
}

impl MemoryTransport {
    /// Creates an empty transport whose lists use the given page length
    pub fn new(page_len: usize) -> Self {
        Self {
            page_len: page_len.max(1),
            login: Some("octocat".to_string()),
            issues: Vec::new(),
            pulls: HashMap::new(),
            pull_commits: HashMap::new(),
            commits: HashMap::new(),
            comments: HashMap::new(),
            shared: Arc::new(Shared {
                calls: Mutex::new(Vec::new()),
                faults: Mutex::new(Vec::new()),
                quota: Mutex::new(RateLimit {
                    limit: 5000,
                    remaining: 5000,
                    reset: 0,
                }),
            }),
        }
    }

    /// Sets the issue payloads, which must be sorted by ascending number
    pub fn with_issues(mut self, issues: Vec<Value>) -> Self {
        self.issues = issues;
        self
    }

    /// Registers a pull request and the summary entries of its commits
    pub fn with_pull(mut self, number: u64, pull: Value, commits: Vec<Value>) -> Self {
        self.pulls.insert(number, pull);
        self.pull_commits.insert(number, commits);
        self
    }

    /// Registers a full commit payload, keyed by its `sha`
    pub fn with_commit(mut self, commit: Value) -> Self {
        let sha = commit
            .get("sha")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        self.commits.insert(sha, commit);
        self
    }

    /// Registers the comments of an issue
    pub fn with_comments(mut self, number: u64, comments: Vec<Value>) -> Self {
        self.comments.insert(number, comments);
        self
    }

    /// Makes the identity probe fail as if the credential were invalid
    pub fn without_credentials(mut self) -> Self {
        self.login = None;
        self
    }

    /// Sets the quota snapshot reported by the transport
    pub fn set_quota(&self, quota: RateLimit) {
        *self.shared.quota.lock().unwrap_or_else(|e| e.into_inner()) = quota;
    }

    /// Schedules `error` to be returned the next time `call` is made
    ///
    /// Each scheduled fault fires once; schedule it repeatedly to fail repeatedly.
    pub fn fail_on(&self, call: Call, error: TransportError) {
        self.shared
            .faults
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push((call, error));
    }

    /// Returns every call made so far, in order
    pub fn calls(&self) -> Vec<Call> {
        self.shared
            .calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Counts the calls matching a predicate
    pub fn count(&self, pred: impl Fn(&Call) -> bool) -> usize {
        self.calls().iter().filter(|c| pred(c)).count()
    }

    fn list(&self, name: ListName, payloads: &[Value]) -> MemoryList {
        MemoryList {
            name,
            items: payloads.iter().cloned().map(Item::from_raw).collect(),
            page_len: self.page_len,
            shared: Arc::clone(&self.shared),
        }
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    type List = MemoryList;

    async fn authenticated_user(&self) -> Result<String, TransportError> {
        self.shared.enter(Call::AuthenticatedUser)?;
        self.login
            .clone()
            .ok_or_else(|| TransportError::Unauthorized("Bad credentials".to_string()))
    }

    async fn rate_limit(&self) -> Result<RateLimit, TransportError> {
        self.shared.enter(Call::RateLimit)?;
        Ok(*self.shared.quota.lock().unwrap_or_else(|e| e.into_inner()))
    }

    fn last_rate_limit(&self) -> Option<RateLimit> {
        Some(*self.shared.quota.lock().unwrap_or_else(|e| e.into_inner()))
    }

    async fn issues(&self, _state: IssueState) -> Result<MemoryList, TransportError> {
        self.shared.enter(Call::Issues)?;
        Ok(self.list(ListName::Issues, &self.issues))
    }

    async fn pull_request(&self, number: u64) -> Result<Value, TransportError> {
        self.shared.enter(Call::PullRequest(number))?;
        self.pulls
            .get(&number)
            .cloned()
            .ok_or_else(|| TransportError::NotFound(format!("pulls/{}", number)))
    }

    async fn pull_commits(&self, number: u64) -> Result<MemoryList, TransportError> {
        self.shared.enter(Call::PullCommits(number))?;
        let commits = self.pull_commits.get(&number).cloned().unwrap_or_default();
        Ok(self.list(ListName::Commits(number), &commits))
    }

    async fn commit(&self, sha: &str) -> Result<Value, TransportError> {
        self.shared.enter(Call::Commit(sha.to_string()))?;
        self.commits
            .get(sha)
            .cloned()
            .ok_or_else(|| TransportError::NotFound(format!("commits/{}", sha)))
    }

    async fn issue_comments(&self, number: u64) -> Result<MemoryList, TransportError> {
        self.shared.enter(Call::IssueComments(number))?;
        let comments = self.comments.get(&number).cloned().unwrap_or_default();
        Ok(self.list(ListName::Comments(number), &comments))
    }
}
