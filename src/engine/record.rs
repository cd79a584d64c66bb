//! Nested record construction
//!
//! Expands one issue into its record: the configured issue fields, then the
//! pull request (with its latest file-touching commit) and the comments, each
//! fetched only when fields for it are configured.

use crate::config::IssueState;
use crate::schema::FieldSelection;
use crate::transport::{Item, PagedList, Transport, TransportError};
use serde_json::{Map, Value};

/// Outcome of looking an issue up as a pull request
#[derive(Debug, Clone, PartialEq)]
pub enum PullRequest {
    /// The issue is a plain issue
    NotApplicable,

    /// The pull request payload
    Found(Value),
}

/// Builds records for issues of one run
pub struct RecordBuilder<'a, T: Transport> {
    transport: &'a T,
    selection: &'a FieldSelection,
    state: IssueState,
}

impl<'a, T: Transport> RecordBuilder<'a, T> {
    pub fn new(transport: &'a T, selection: &'a FieldSelection, state: IssueState) -> Self {
        Self {
            transport,
            selection,
            state,
        }
    }

    /// Builds the complete record for an issue
    ///
    /// # Returns
    ///
    /// * `Ok(Some(record))` - The nested record, ready to be stored under the issue number
    /// * `Ok(None)` - The issue is a closed pull request that was never merged
    /// * `Err(TransportError)` - A remote call failed; nothing of the item is kept
    pub async fn build(&self, issue: &Item) -> Result<Option<Map<String, Value>>, TransportError> {
        let mut record = self.selection.issue.extract(&issue.raw);

        if self.selection.wants_pr() {
            match self.pull_request(issue).await? {
                PullRequest::NotApplicable => {
                    let mut pr = Map::new();
                    pr.insert("is_pr".to_string(), Value::Bool(false));
                    record.insert("pr".to_string(), Value::Object(pr));
                }
                PullRequest::Found(pull) => {
                    let merged = pull.get("merged").and_then(Value::as_bool).unwrap_or(false);
                    if !merged && self.state == IssueState::Closed {
                        tracing::debug!("#{} is a closed, unmerged pull request", issue.number);
                        return Ok(None);
                    }

                    let mut pr = self.selection.pr.extract(&pull);
                    pr.insert("is_pr".to_string(), Value::Bool(true));

                    if self.selection.wants_commit() {
                        if let Some(commit) = self.latest_commit(issue.number).await? {
                            let fields = self.selection.commit.extract(&commit);
                            pr.insert("commit".to_string(), Value::Object(fields));
                        }
                    }
                    record.insert("pr".to_string(), Value::Object(pr));
                }
            }
        }

        if self.selection.wants_comments() && comment_count(issue) > 0 {
            let comments = self.comments(issue.number).await?;
            record.insert("comment".to_string(), Value::Object(comments));
        }

        Ok(Some(record))
    }

    /// Looks the issue up as a pull request
    ///
    /// Issues without a `pull_request` marker are never looked up.
    pub async fn pull_request(&self, issue: &Item) -> Result<PullRequest, TransportError> {
        if issue.raw.get("pull_request").map_or(true, Value::is_null) {
            return Ok(PullRequest::NotApplicable);
        }

        match self.transport.pull_request(issue.number).await {
            Ok(pull) => Ok(PullRequest::Found(pull)),
            Err(TransportError::NotFound(_)) => Ok(PullRequest::NotApplicable),
            Err(e) => Err(e),
        }
    }

    /// The newest commit of a pull request that changed at least one file
    ///
    /// Falls back to the newest commit when none did; `None` only for a pull
    /// request without commits.
    pub async fn latest_commit(&self, number: u64) -> Result<Option<Value>, TransportError> {
        let commits = self.transport.pull_commits(number).await?;
        let mut newest = None;

        for index in (0..commits.len()).rev() {
            let summary = commits.item(index).await?;
            let Some(sha) = summary.raw.get("sha").and_then(Value::as_str) else {
                continue;
            };

            let detail = self.transport.commit(sha).await?;
            let touches_files = detail
                .get("files")
                .and_then(Value::as_array)
                .is_some_and(|files| !files.is_empty());
            if touches_files {
                return Ok(Some(detail));
            }
            if newest.is_none() {
                newest = Some(detail);
            }
        }

        Ok(newest)
    }

    /// The configured fields of every comment, keyed by position
    pub async fn comments(&self, number: u64) -> Result<Map<String, Value>, TransportError> {
        let list = self.transport.issue_comments(number).await?;
        let mut comments = Map::new();

        for page in 0..list.page_count() {
            for item in list.page(page).await? {
                let fields = self.selection.comment.extract(&item.raw);
                comments.insert(comments.len().to_string(), Value::Object(fields));
            }
        }

        Ok(comments)
    }
}

fn comment_count(issue: &Item) -> u64 {
    issue.raw.get("comments").and_then(Value::as_u64).unwrap_or(0)
}
