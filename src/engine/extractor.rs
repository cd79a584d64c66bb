//! Extraction engine - the resumable main loop
//!
//! This module walks the resolved index range one item at a time, including:
//! - Opening the issue list and resolving the requested range
//! - Building each item's nested record and accumulating it
//! - Flushing the accumulator on every quota, network or fatal event
//! - Waiting out quota resets and network faults, then retrying the same index
//! - Honoring operator cancellation

use crate::checkpoint::CheckpointStore;
use crate::config::Config;
use crate::engine::record::RecordBuilder;
use crate::engine::shutdown::Shutdown;
use crate::output::RunSummary;
use crate::quota::QuotaSession;
use crate::range::{self, RangeError, ResolvedRange};
use crate::schema::FieldSelection;
use crate::state::ExtractionState;
use crate::transport::{PagedList, Transport};
use crate::{MinerError, Result};
use chrono::Utc;
use serde_json::{Map, Value};
use std::io::{IsTerminal, Write};
use std::time::Duration;

/// The extraction engine for one configured range
pub struct Extractor<T: Transport> {
    transport: T,
    selection: FieldSelection,
    config: Config,
    store: CheckpointStore,
    quota: QuotaSession,
    shutdown: Shutdown,

    /// Opened lazily on the first Running step
    list: Option<T::List>,
    resolved: Option<ResolvedRange>,
    next_index: usize,

    /// Records built since the last flush, keyed by item number
    accumulator: Map<String, Value>,
    summary: RunSummary,
    consecutive_faults: u32,
}

/// Result of one Running step
enum Step {
    Advanced,
    Exhausted,
}

/// An engine state together with the failure that led into it
enum Phase {
    Running,
    RateLimited { reset: Option<i64> },
    NetworkFault(MinerError),
    Fatal(MinerError),
    Completed,
}

impl Phase {
    fn after_failure(error: MinerError) -> Self {
        match ExtractionState::after_failure(error.kind()) {
            ExtractionState::RateLimited => Self::RateLimited {
                reset: error.reset_epoch(),
            },
            ExtractionState::NetworkFault => Self::NetworkFault(error),
            _ => Self::Fatal(error),
        }
    }

    fn state(&self) -> ExtractionState {
        match self {
            Self::Running => ExtractionState::Running,
            Self::RateLimited { .. } => ExtractionState::RateLimited,
            Self::NetworkFault(_) => ExtractionState::NetworkFault,
            Self::Fatal(_) => ExtractionState::Fatal,
            Self::Completed => ExtractionState::Completed,
        }
    }
}

impl<T: Transport> Extractor<T> {
    /// Creates an engine that writes to `store`
    ///
    /// # Arguments
    ///
    /// * `transport` - The remote API
    /// * `selection` - Validated fields for every entity type
    /// * `config` - The run configuration (repository, state, range, engine tuning)
    /// * `store` - Checkpoint the records are merged into
    /// * `quota` - An authenticated quota session
    /// * `shutdown` - Operator cancellation flag
    pub fn new(
        transport: T,
        selection: FieldSelection,
        config: Config,
        store: CheckpointStore,
        quota: QuotaSession,
        shutdown: Shutdown,
    ) -> Self {
        let summary = RunSummary::new(
            config.repo.clone(),
            config.state,
            store.path().to_path_buf(),
        );
        Self {
            transport,
            selection,
            config,
            store,
            quota,
            shutdown,
            list: None,
            resolved: None,
            next_index: 0,
            accumulator: Map::new(),
            summary,
            consecutive_faults: 0,
        }
    }

    /// Runs the state machine until the range is done or a fatal failure occurs
    ///
    /// Every exit path flushes the accumulated records first.
    pub async fn run(mut self) -> Result<RunSummary> {
        tracing::info!(
            "Starting extraction of {} {} issues #{}..#{}",
            self.config.repo,
            self.config.state,
            self.config.range.0,
            self.config.range.1
        );

        let mut phase = Phase::Running;
        while !phase.state().is_terminal() {
            let previous = phase.state();
            phase = match phase {
                Phase::Running => match self.step().await {
                    Ok(Step::Advanced) => Phase::Running,
                    Ok(Step::Exhausted) => Phase::Completed,
                    Err(e) => Phase::after_failure(e),
                },
                Phase::RateLimited { reset } => match self.wait_for_quota(reset).await {
                    Ok(()) => Phase::Running,
                    Err(e) => Phase::Fatal(e),
                },
                Phase::NetworkFault(cause) => match self.wait_after_fault(cause).await {
                    Ok(()) => Phase::Running,
                    Err(e) => Phase::Fatal(e),
                },
                terminal => terminal,
            };

            if phase.state() != previous {
                tracing::debug!("Extraction state: {} -> {}", previous, phase.state());
            }
        }

        match phase {
            Phase::Fatal(error) => Err(self.abort(error)),
            // the loop only exits on a terminal phase
            _ => self.complete(),
        }
    }

    /// Processes the item at the current index
    async fn step(&mut self) -> Result<Step> {
        if self.shutdown.is_requested() {
            return Err(MinerError::Cancelled);
        }

        if self.list.is_none() {
            self.prepare().await?;
        }
        let (Some(list), Some(resolved)) = (&self.list, self.resolved) else {
            return Err(self.no_items());
        };

        let index = self.next_index;
        if index > resolved.end_index {
            return Ok(Step::Exhausted);
        }

        let builder = RecordBuilder::new(&self.transport, &self.selection, self.config.state);
        let built = tokio::select! {
            biased;
            _ = self.shutdown.requested() => return Err(MinerError::Cancelled),
            built = async {
                let issue = list.item(index).await?;
                let record = builder.build(&issue).await?;
                Ok::<_, MinerError>((issue.number, record))
            } => built,
        };
        let (number, record) = built?;

        let written = record.is_some();
        if let Some(record) = record {
            self.accumulator.insert(number.to_string(), Value::Object(record));
        }
        self.summary.record_item(number, written);
        self.next_index += 1;
        self.consecutive_faults = 0;
        self.quota.sync(&self.transport);

        let done = self.next_index - resolved.start_index;
        if written {
            tracing::info!(
                "Extracted #{} ({}/{}, {} calls left)",
                number,
                done,
                resolved.span(),
                self.quota.remaining_calls()
            );
        } else {
            tracing::info!(
                "Skipped #{}: closed without merging ({}/{})",
                number,
                done,
                resolved.span()
            );
        }

        Ok(Step::Advanced)
    }

    /// Opens the issue list and resolves the requested range
    async fn prepare(&mut self) -> Result<()> {
        let list = self.transport.issues(self.config.state).await?;
        if list.is_empty() {
            return Err(self.no_items());
        }

        let requested = self.config.requested_range();
        let resolved = match range::resolve(&list, requested).await {
            Ok(resolved) => resolved,
            Err(RangeError::NoItems) => return Err(self.no_items()),
            Err(RangeError::Transport(e)) => return Err(e.into()),
        };

        if resolved.clamped {
            tracing::warn!(
                "Requested range #{}..#{} clamped to #{}..#{}",
                requested.start,
                requested.end,
                resolved.start_number,
                resolved.end_number
            );
        }
        tracing::info!(
            "Range resolved to #{}..#{} (indices {}..={} of {})",
            resolved.start_number,
            resolved.end_number,
            resolved.start_index,
            resolved.end_index,
            list.len()
        );

        self.list = Some(list);
        self.resolved = Some(resolved);
        self.summary.resolved = Some(resolved);
        self.next_index = resolved.start_index;
        Ok(())
    }

    /// RateLimited: flush, find out when the quota resets, sleep until then
    async fn wait_for_quota(&mut self, failure_reset: Option<i64>) -> Result<()> {
        self.flush(false)?;
        self.summary.rate_limit_waits += 1;

        if let Err(e) = self.quota.refresh(&self.transport).await {
            tracing::warn!("Could not refresh quota state: {}", e);
        }
        let reset = match failure_reset {
            // calls are available again, so the failure was a short secondary limit
            Some(reset) if self.quota.remaining_calls() > 0 => reset,
            Some(reset) => reset.max(self.quota.reset_epoch()),
            None => self.quota.reset_epoch(),
        };
        self.quota.exhaust(reset);

        let wait = self.quota.backoff(Utc::now());
        tracing::warn!(
            "Rate limit reached at index {}, waiting {}s for the quota to reset",
            self.next_index,
            wait.as_secs()
        );
        self.countdown(wait, "Quota reset").await
    }

    /// NetworkFault: flush, then wait the fixed retry delay unless retries are exhausted
    async fn wait_after_fault(&mut self, cause: MinerError) -> Result<()> {
        self.flush(false)?;
        self.consecutive_faults += 1;

        let max_retries = self.config.engine.max_network_retries;
        if self.consecutive_faults > max_retries {
            return Err(match cause {
                MinerError::Transport(source) => MinerError::RetriesExhausted {
                    attempts: self.consecutive_faults,
                    source,
                },
                other => other,
            });
        }

        self.summary.network_retries += 1;
        let delay = Duration::from_secs(self.config.engine.network_retry_delay_secs);
        tracing::warn!(
            "Network failure at index {} ({}), retry {}/{} in {}s",
            self.next_index,
            cause,
            self.consecutive_faults,
            max_retries,
            delay.as_secs()
        );
        self.countdown(delay, "Network retry").await
    }

    /// Fatal: flush what was built and report where the run stopped
    fn abort(&mut self, error: MinerError) -> MinerError {
        if let Err(e) = self.flush(false) {
            tracing::error!("Failed to save progress: {}", e);
        }

        match self.summary.last_number {
            Some(number) => tracing::error!("Stopped after item #{}: {}", number, error),
            None => tracing::error!("Stopped before any item was processed: {}", error),
        }
        error
    }

    /// Completed: final flush, which always writes the output document
    fn complete(&mut self) -> Result<RunSummary> {
        self.flush(true)?;
        self.summary.finish();
        tracing::info!(
            "Extraction completed: {} written, {} skipped in {}s",
            self.summary.items_written,
            self.summary.items_skipped,
            self.summary.duration_seconds()
        );
        Ok(self.summary.clone())
    }

    /// Merges the accumulator into the checkpoint and clears it
    fn flush(&mut self, always: bool) -> Result<()> {
        if self.accumulator.is_empty() && !always {
            return Ok(());
        }

        self.store.flush_merge(&self.accumulator)?;
        self.summary.flushes += 1;
        tracing::info!(
            "Saved {} records to {}",
            self.accumulator.len(),
            self.store.path().display()
        );
        self.accumulator.clear();
        Ok(())
    }

    /// Sleeps for `wait`, showing a live countdown when stderr is a terminal
    async fn countdown(&self, wait: Duration, label: &str) -> Result<()> {
        if wait.is_zero() {
            return Ok(());
        }

        if !std::io::stderr().is_terminal() {
            tracing::info!("{}: resuming in {}s", label, wait.as_secs());
            return tokio::select! {
                biased;
                _ = self.shutdown.requested() => Err(MinerError::Cancelled),
                _ = tokio::time::sleep(wait) => Ok(()),
            };
        }

        let mut remaining = wait.as_secs().max(1);
        let mut stderr = std::io::stderr();
        while remaining > 0 {
            let _ = write!(stderr, "\r{}: resuming in {:>5}s ", label, remaining);
            let _ = stderr.flush();
            tokio::select! {
                biased;
                _ = self.shutdown.requested() => {
                    let _ = writeln!(stderr);
                    return Err(MinerError::Cancelled);
                }
                _ = tokio::time::sleep(Duration::from_secs(1)) => {}
            }
            remaining -= 1;
        }
        let _ = writeln!(stderr, "\r{}: resuming now          ", label);
        Ok(())
    }

    fn no_items(&self) -> MinerError {
        MinerError::NoItems {
            repo: self.config.repo.clone(),
            state: self.config.state.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::parse_config;
    use crate::engine::shutdown;
    use crate::schema::SchemaRegistry;
    use crate::transport::{Call, ListName, MemoryTransport, TransportError};
    use serde_json::json;
    use tempfile::TempDir;

    fn config(extra: &str) -> Config {
        let content = format!(
            r#"
repo = "octo/widgets"
auth-path = "token.txt"
state = "closed"
range = [1, 10]
issue-fields = ["title"]
{}

[engine]
network-retry-delay-secs = 0
max-network-retries = 2
"#,
            extra
        );
        parse_config(&content, &SchemaRegistry::new()).unwrap()
    }

    fn issues(numbers: &[u64]) -> Vec<Value> {
        numbers
            .iter()
            .map(|n| json!({"number": n, "title": format!("issue {}", n)}))
            .collect()
    }

    fn extractor(
        transport: MemoryTransport,
        config: Config,
        dir: &TempDir,
        shutdown: Shutdown,
    ) -> Extractor<MemoryTransport> {
        let selection = SchemaRegistry::new().selection(&config).unwrap();
        let store = CheckpointStore::new(dir.path().join("out.json"));
        Extractor::new(
            transport,
            selection,
            config,
            store,
            QuotaSession::unlimited(None),
            shutdown,
        )
    }

    fn item_call(index: usize) -> Call {
        Call::Item {
            list: ListName::Issues,
            index,
        }
    }

    fn written(dir: &TempDir) -> Map<String, Value> {
        CheckpointStore::new(dir.path().join("out.json")).load()
    }

    #[tokio::test]
    async fn test_completes_and_writes_every_item() {
        let dir = TempDir::new().unwrap();
        let t = MemoryTransport::new(2).with_issues(issues(&[1, 2, 4, 7, 10]));

        let summary = extractor(t, config(""), &dir, Shutdown::never())
            .run()
            .await
            .unwrap();

        assert_eq!(summary.items_written, 5);
        assert_eq!(summary.flushes, 1);
        let out = written(&dir);
        assert_eq!(out.len(), 5);
        assert_eq!(out["7"], json!({"title": "issue 7"}));
    }

    #[tokio::test]
    async fn test_rate_limit_resumes_without_skip_or_duplicate() {
        let dir = TempDir::new().unwrap();
        let t = MemoryTransport::new(2).with_issues(issues(&[1, 2, 4, 7, 10]));
        t.fail_on(item_call(3), TransportError::RateLimited { reset: 0 });
        let probe = t.clone();

        let summary = extractor(t, config(""), &dir, Shutdown::never())
            .run()
            .await
            .unwrap();

        assert_eq!(summary.items_written, 5);
        assert_eq!(summary.rate_limit_waits, 1);
        let visited: Vec<usize> = probe
            .calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Item { index, .. } => Some(index),
                _ => None,
            })
            .collect();
        assert_eq!(visited, vec![0, 1, 2, 3, 3, 4]);
        // one flush before the wait, one at completion
        assert_eq!(summary.flushes, 2);
        let keys: Vec<_> = written(&dir).keys().cloned().collect();
        assert_eq!(keys.len(), 5);
        for n in ["1", "2", "4", "7", "10"] {
            assert!(keys.iter().any(|k| k == n), "missing #{}", n);
        }
    }

    #[tokio::test]
    async fn test_rate_limit_flushes_items_before_the_failure() {
        let dir = TempDir::new().unwrap();
        let t = MemoryTransport::new(2).with_issues(issues(&[1, 2, 4]));
        t.fail_on(item_call(2), TransportError::RateLimited { reset: 0 });
        // the retried item then fails fatally, so only the pre-limit flush survives
        t.fail_on(item_call(2), TransportError::Unauthorized("revoked".to_string()));

        let err = extractor(t, config(""), &dir, Shutdown::never())
            .run()
            .await
            .unwrap_err();

        assert!(matches!(err, MinerError::Auth(_)));
        let out = written(&dir);
        assert_eq!(out.len(), 2);
        assert!(out.contains_key("1") && out.contains_key("2"));
    }

    #[tokio::test]
    async fn test_network_faults_retry_then_escalate() {
        let dir = TempDir::new().unwrap();
        let t = MemoryTransport::new(10).with_issues(issues(&[1, 2, 3]));
        for _ in 0..3 {
            t.fail_on(item_call(1), TransportError::Network("reset".to_string()));
        }

        let err = extractor(t, config(""), &dir, Shutdown::never())
            .run()
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            MinerError::RetriesExhausted { attempts: 3, .. }
        ));
        assert_eq!(written(&dir).keys().collect::<Vec<_>>(), vec!["1"]);
    }

    #[tokio::test]
    async fn test_network_faults_within_budget_recover() {
        let dir = TempDir::new().unwrap();
        let t = MemoryTransport::new(10).with_issues(issues(&[1, 2, 3]));
        for _ in 0..2 {
            t.fail_on(
                item_call(1),
                TransportError::Server {
                    status: 502,
                    url: "/issues".to_string(),
                },
            );
        }

        let summary = extractor(t, config(""), &dir, Shutdown::never())
            .run()
            .await
            .unwrap();

        assert_eq!(summary.items_written, 3);
        assert_eq!(summary.network_retries, 2);
    }

    #[tokio::test]
    async fn test_fault_while_opening_list_is_recovered() {
        let dir = TempDir::new().unwrap();
        let t = MemoryTransport::new(10).with_issues(issues(&[1, 2]));
        t.fail_on(Call::Issues, TransportError::RateLimited { reset: 0 });

        let summary = extractor(t, config(""), &dir, Shutdown::never())
            .run()
            .await
            .unwrap();

        assert_eq!(summary.items_written, 2);
        assert_eq!(summary.rate_limit_waits, 1);
    }

    #[tokio::test]
    async fn test_empty_list_is_fatal() {
        let dir = TempDir::new().unwrap();
        let t = MemoryTransport::new(10);

        let err = extractor(t, config(""), &dir, Shutdown::never())
            .run()
            .await
            .unwrap_err();

        assert!(matches!(err, MinerError::NoItems { .. }));
        assert!(!dir.path().join("out.json").exists());
    }

    #[tokio::test]
    async fn test_issues_without_pr_fields_never_query_pulls() {
        let dir = TempDir::new().unwrap();
        let payloads = vec![
            json!({"number": 1, "title": "a", "pull_request": {"url": "x"}}),
            json!({"number": 2, "title": "b"}),
        ];
        let t = MemoryTransport::new(10)
            .with_issues(payloads)
            .with_pull(1, json!({"merged": true}), vec![]);
        let probe = t.clone();

        extractor(t, config(""), &dir, Shutdown::never())
            .run()
            .await
            .unwrap();

        assert_eq!(probe.count(|c| matches!(c, Call::PullRequest(_))), 0);
        assert!(!written(&dir)["1"].as_object().unwrap().contains_key("pr"));
    }

    #[tokio::test]
    async fn test_closed_unmerged_pulls_are_skipped() {
        let dir = TempDir::new().unwrap();
        let payloads = vec![
            json!({"number": 1, "title": "a", "pull_request": {"url": "x"}}),
            json!({"number": 2, "title": "b", "pull_request": {"url": "y"}}),
            json!({"number": 3, "title": "c"}),
        ];
        let t = MemoryTransport::new(10)
            .with_issues(payloads)
            .with_pull(1, json!({"merged": true}), vec![])
            .with_pull(2, json!({"merged": false}), vec![]);

        let summary = extractor(t, config(r#"pr-fields = ["merged"]"#), &dir, Shutdown::never())
            .run()
            .await
            .unwrap();

        assert_eq!(summary.items_written, 2);
        assert_eq!(summary.items_skipped, 1);
        let out = written(&dir);
        assert_eq!(out["1"]["pr"], json!({"merged": true, "is_pr": true}));
        assert!(!out.contains_key("2"));
        assert_eq!(out["3"]["pr"], json!({"is_pr": false}));
    }

    #[tokio::test]
    async fn test_cancellation_before_start_flushes_nothing() {
        let dir = TempDir::new().unwrap();
        let t = MemoryTransport::new(10).with_issues(issues(&[1, 2]));
        let (trigger, listener) = shutdown::channel();
        trigger.trigger();

        let err = extractor(t, config(""), &dir, listener)
            .run()
            .await
            .unwrap_err();

        assert!(matches!(err, MinerError::Cancelled));
        assert!(!dir.path().join("out.json").exists());
    }

    #[tokio::test]
    async fn test_cancellation_during_quota_wait_keeps_built_items() {
        let dir = TempDir::new().unwrap();
        let t = MemoryTransport::new(2).with_issues(issues(&[1, 2, 4, 7, 10]));
        let reset = Utc::now().timestamp() + 1000;
        t.fail_on(item_call(2), TransportError::RateLimited { reset });
        let (trigger, listener) = shutdown::channel();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            trigger.trigger();
        });

        let err = extractor(t, config(""), &dir, listener)
            .run()
            .await
            .unwrap_err();

        assert!(matches!(err, MinerError::Cancelled));
        let keys: Vec<_> = written(&dir).keys().cloned().collect();
        assert_eq!(keys, vec!["1", "2"]);
    }

    #[tokio::test]
    async fn test_fatal_failure_reports_its_cause() {
        let dir = TempDir::new().unwrap();
        let t = MemoryTransport::new(2).with_issues(issues(&[1, 2, 4]));
        t.fail_on(item_call(1), TransportError::NotFound("/issues".to_string()));

        let err = extractor(t, config(""), &dir, Shutdown::never())
            .run()
            .await
            .unwrap_err();

        assert!(matches!(err, MinerError::UnknownResource(_)));
        assert_eq!(written(&dir).keys().collect::<Vec<_>>(), vec!["1"]);
    }

    #[tokio::test]
    async fn test_range_is_clamped_and_resolved_lazily() {
        let dir = TempDir::new().unwrap();
        let t = MemoryTransport::new(2).with_issues(issues(&[3, 5, 8, 13, 21]));

        let summary = extractor(t, config(""), &dir, Shutdown::never())
            .run()
            .await
            .unwrap();

        let resolved = summary.resolved.unwrap();
        assert_eq!((resolved.start_number, resolved.end_number), (3, 8));
        assert!(resolved.clamped);
        assert_eq!(summary.items_written, 3);
        assert_eq!(summary.first_number, Some(3));
        assert_eq!(summary.last_number, Some(8));
    }
}
