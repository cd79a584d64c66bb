//! End-to-end extraction tests over the in-memory transport
//!
//! These tests check the resumability guarantees across separate runs that
//! share one output document.

use repo_miner::checkpoint::CheckpointStore;
use repo_miner::config::{parse_config, Config};
use repo_miner::engine::Shutdown;
use repo_miner::output::RunSummary;
use repo_miner::quota::QuotaSession;
use repo_miner::transport::{Call, ListName, MemoryTransport, TransportError};
use repo_miner::{Extractor, MinerError, SchemaRegistry};
use serde_json::{json, Value};
use std::path::Path;
use tempfile::TempDir;

fn create_test_config(output_dir: &Path, range: (u64, u64)) -> Config {
    let content = format!(
        r#"
repo = "octo/widgets"
auth-path = "token.txt"
state = "closed"
range = [{}, {}]
output-dir = "{}"
issue-fields = ["title", "num_comments"]
pr-fields = ["merged", "title"]
commit-fields = ["sha", "files"]
comment-fields = ["userlogin", "body"]

[engine]
network-retry-delay-secs = 0
max-network-retries = 3
"#,
        range.0,
        range.1,
        output_dir.display().to_string().replace('\\', "/")
    );
    parse_config(&content, &SchemaRegistry::new()).expect("test config is valid")
}

/// Issues 1..=12 without 3, 6 and 9; 4 and 8 are pull requests, 8 never merged
fn create_test_transport() -> MemoryTransport {
    let issues = [1, 2, 4, 5, 7, 8, 10, 11, 12]
        .iter()
        .map(|&n| {
            let mut issue = json!({
                "number": n,
                "title": format!("issue {}", n),
                "comments": if n == 5 { 2 } else { 0 }
            });
            if n == 4 || n == 8 {
                issue["pull_request"] = json!({"url": format!("pulls/{}", n)});
            }
            issue
        })
        .collect();

    MemoryTransport::new(4)
        .with_issues(issues)
        .with_pull(
            4,
            json!({"merged": true, "title": "add feature"}),
            vec![json!({"sha": "aaa"}), json!({"sha": "bbb"})],
        )
        .with_commit(json!({"sha": "aaa", "files": [{"filename": "src/lib.rs"}]}))
        .with_commit(json!({"sha": "bbb", "files": []}))
        .with_pull(8, json!({"merged": false, "title": "abandoned"}), vec![])
        .with_comments(
            5,
            vec![
                json!({"id": 50, "user": {"login": "alice"}, "body": "+1"}),
                json!({"id": 51, "user": {"login": "bob"}, "body": "fixed"}),
            ],
        )
}

async fn run(transport: MemoryTransport, config: Config) -> Result<RunSummary, MinerError> {
    let selection = SchemaRegistry::new().selection(&config).unwrap();
    let store = CheckpointStore::new(config.output_path());
    let quota = QuotaSession::authenticate(&transport).await?;
    Extractor::new(transport, selection, config, store, quota, Shutdown::never())
        .run()
        .await
}

fn read_output(dir: &TempDir) -> Value {
    let path = dir.path().join("octo_widgets_issue.json");
    serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap()
}

#[tokio::test]
async fn test_nested_records() {
    let dir = TempDir::new().unwrap();

    let summary = run(create_test_transport(), create_test_config(dir.path(), (1, 12)))
        .await
        .unwrap();

    assert_eq!(summary.items_written, 8);
    assert_eq!(summary.items_skipped, 1);

    let output = read_output(&dir);
    assert_eq!(
        output["4"],
        json!({
            "title": "issue 4",
            "num_comments": 0,
            "pr": {
                "is_pr": true,
                "merged": true,
                "title": "add feature",
                "commit": {"sha": "aaa", "files": ["src/lib.rs"]}
            }
        })
    );
    assert_eq!(
        output["5"]["comment"],
        json!({
            "0": {"userlogin": "alice", "body": "+1"},
            "1": {"userlogin": "bob", "body": "fixed"}
        })
    );
    assert_eq!(output["7"]["pr"], json!({"is_pr": false}));
    assert!(output.get("8").is_none());
}

#[tokio::test]
async fn test_interrupted_run_resumes_into_same_document() {
    let dir = TempDir::new().unwrap();

    // First run dies on index 4 (issue 7) after writing 1, 2, 4 and 5
    let transport = create_test_transport();
    transport.fail_on(
        Call::Item {
            list: ListName::Issues,
            index: 4,
        },
        TransportError::Unauthorized("token revoked".to_string()),
    );
    let err = run(transport, create_test_config(dir.path(), (1, 12)))
        .await
        .unwrap_err();
    assert!(matches!(err, MinerError::Auth(_)));

    let partial = read_output(&dir);
    let mut keys: Vec<_> = partial.as_object().unwrap().keys().cloned().collect();
    keys.sort_by_key(|k| k.parse::<u64>().unwrap());
    assert_eq!(keys, vec!["1", "2", "4", "5"]);

    // Second run covers the remainder, starting from the number after the last one written
    let summary = run(create_test_transport(), create_test_config(dir.path(), (6, 12)))
        .await
        .unwrap();
    // 6 is absent and rounds down to 5, which is re-extracted and merged in place
    assert_eq!(summary.first_number, Some(5));

    let output = read_output(&dir);
    let document = output.as_object().unwrap();
    assert_eq!(document.len(), 8);
    assert_eq!(output["1"], partial["1"]);
    assert_eq!(output["5"], partial["5"]);
    assert_eq!(output["12"]["title"], json!("issue 12"));
}

#[tokio::test]
async fn test_rerun_preserves_foreign_keys_and_is_idempotent() {
    let dir = TempDir::new().unwrap();
    let output_path = dir.path().join("octo_widgets_issue.json");
    std::fs::write(
        &output_path,
        r#"{"2": {"note": "hand annotated"}, "99": {"title": "from elsewhere"}}"#,
    )
    .unwrap();

    run(create_test_transport(), create_test_config(dir.path(), (1, 4)))
        .await
        .unwrap();
    let first = std::fs::read_to_string(&output_path).unwrap();

    run(create_test_transport(), create_test_config(dir.path(), (1, 4)))
        .await
        .unwrap();
    let second = std::fs::read_to_string(&output_path).unwrap();

    assert_eq!(first, second);
    let output = read_output(&dir);
    assert_eq!(output["2"]["note"], json!("hand annotated"));
    assert_eq!(output["2"]["title"], json!("issue 2"));
    assert_eq!(output["99"]["title"], json!("from elsewhere"));
}

#[tokio::test]
async fn test_quota_exhaustion_mid_pull_request() {
    let dir = TempDir::new().unwrap();
    let transport = create_test_transport();
    // the rate limit lands while issue 4's commit is being fetched
    transport.fail_on(
        Call::Commit("bbb".to_string()),
        TransportError::RateLimited { reset: 0 },
    );

    let summary = run(transport, create_test_config(dir.path(), (1, 5)))
        .await
        .unwrap();

    assert_eq!(summary.rate_limit_waits, 1);
    assert_eq!(summary.items_written, 4);
    let output = read_output(&dir);
    assert_eq!(output["4"]["pr"]["commit"]["sha"], json!("aaa"));
}

#[tokio::test]
async fn test_output_written_even_when_nothing_matches() {
    let dir = TempDir::new().unwrap();
    // only issue 8 is in range, and it is dropped
    let summary = run(create_test_transport(), create_test_config(dir.path(), (8, 9)))
        .await
        .unwrap();

    assert_eq!(summary.items_written, 0);
    assert_eq!(summary.items_skipped, 1);
    assert_eq!(read_output(&dir), json!({}));
}
