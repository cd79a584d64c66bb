//! Integration tests for the GitHub transport
//!
//! These tests use wiremock to stand in for the REST API and check paging,
//! status classification and a full extraction run over HTTP.

use repo_miner::checkpoint::CheckpointStore;
use repo_miner::config::{parse_config, Config, IssueState};
use repo_miner::engine::Shutdown;
use repo_miner::github::GitHubClient;
use repo_miner::quota::QuotaSession;
use repo_miner::transport::{PagedList, Transport, TransportError};
use repo_miner::{Extractor, MinerError, SchemaRegistry};
use serde_json::{json, Value};
use tempfile::TempDir;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const ISSUES: &str = "/repos/octo/widgets/issues";

/// Creates a configuration pointing at the mock server
fn create_test_config(api_url: &str, output_dir: &str, extra: &str) -> Config {
    let content = format!(
        r#"
repo = "octo/widgets"
auth-path = "token.txt"
state = "closed"
range = [3, 8]
output-dir = "{}"
api-url = "{}"
issue-fields = ["title", "userlogin"]
{}

[engine]
per-page = 2
network-retry-delay-secs = 0
max-network-retries = 1
"#,
        output_dir.replace('\\', "/"),
        api_url,
        extra
    );
    parse_config(&content, &SchemaRegistry::new()).expect("test config is valid")
}

fn issue(number: u64) -> Value {
    json!({
        "number": number,
        "title": format!("issue {}", number),
        "user": {"login": "hubot", "id": 7},
        "comments": 0
    })
}

fn page_response(numbers: &[u64], last_page: Option<(String, usize)>) -> ResponseTemplate {
    let body: Vec<Value> = numbers.iter().copied().map(issue).collect();
    let mut response = ResponseTemplate::new(200)
        .set_body_json(body)
        .insert_header("x-ratelimit-limit", "5000")
        .insert_header("x-ratelimit-remaining", "4990")
        .insert_header("x-ratelimit-reset", "1700000000");
    if let Some((base, last)) = last_page {
        response = response.insert_header(
            "link",
            format!(
                r#"<{base}{ISSUES}?page=2>; rel="next", <{base}{ISSUES}?page={last}>; rel="last""#
            )
            .as_str(),
        );
    }
    response
}

/// Mounts issues 1, 2, 4, 7, 10 over three pages of two
async fn mount_issue_pages(server: &MockServer) {
    let base = server.uri();
    let pages: [(&str, &[u64]); 3] = [("1", &[1, 2]), ("2", &[4, 7]), ("3", &[10])];

    for (page, numbers) in pages {
        Mock::given(method("GET"))
            .and(path(ISSUES))
            .and(query_param("page", page))
            .and(query_param("state", "closed"))
            .and(query_param("per_page", "2"))
            .respond_with(page_response(numbers, Some((base.clone(), 3))))
            .expect(1)
            .mount(server)
            .await;
    }
}

#[tokio::test]
async fn test_list_length_from_link_header() {
    let server = MockServer::start().await;
    mount_issue_pages(&server).await;
    let dir = TempDir::new().unwrap();
    let config = create_test_config(&server.uri(), dir.path().to_str().unwrap(), "");
    let client = GitHubClient::new(&config, "secret").unwrap();

    let list = client.issues(IssueState::Closed).await.unwrap();

    assert_eq!(list.len(), 5);
    assert_eq!(list.page_count(), 3);
    assert_eq!(list.item(3).await.unwrap().number, 7);
    // page 2 is cached after the first read; `expect(1)` checks it on drop
    assert_eq!(list.item(2).await.unwrap().number, 4);
    assert_eq!(client.last_rate_limit().unwrap().remaining, 4990);
}

#[tokio::test]
async fn test_list_keeps_only_first_last_and_current_page() {
    let server = MockServer::start().await;
    let base = server.uri();
    // (page, numbers, expected fetches)
    let pages: [(&str, &[u64], u64); 4] = [
        ("1", &[1, 2], 1),
        ("2", &[4, 7], 2),
        ("3", &[10, 11], 1),
        ("4", &[13], 1),
    ];
    for (page, numbers, fetches) in pages {
        Mock::given(method("GET"))
            .and(path(ISSUES))
            .and(query_param("page", page))
            .respond_with(page_response(numbers, Some((base.clone(), 4))))
            .expect(fetches)
            .mount(&server)
            .await;
    }
    let dir = TempDir::new().unwrap();
    let config = create_test_config(&server.uri(), dir.path().to_str().unwrap(), "");
    let client = GitHubClient::new(&config, "secret").unwrap();

    let list = client.issues(IssueState::Closed).await.unwrap();

    assert_eq!(list.len(), 7);
    assert_eq!(list.item(2).await.unwrap().number, 4);
    // fetching page 3 drops page 2, so reading it again goes back to the server
    assert_eq!(list.item(4).await.unwrap().number, 10);
    assert_eq!(list.item(3).await.unwrap().number, 7);
    // first and last pages stay cached
    assert_eq!(list.item(6).await.unwrap().number, 13);
    assert_eq!(list.item(0).await.unwrap().number, 1);
}

#[tokio::test]
async fn test_single_page_list_without_link_header() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/repos/octo/widgets/issues/5/comments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"id": 100, "body": "first"},
            {"id": 101, "body": "second"}
        ])))
        .mount(&server)
        .await;
    let dir = TempDir::new().unwrap();
    let config = create_test_config(&server.uri(), dir.path().to_str().unwrap(), "");
    let client = GitHubClient::new(&config, "secret").unwrap();

    let comments = client.issue_comments(5).await.unwrap();

    assert_eq!(comments.len(), 2);
    assert_eq!(comments.item(1).await.unwrap().number, 101);
}

#[tokio::test]
async fn test_sends_credential_and_reads_login() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/user"))
        .and(header("authorization", "Bearer secret"))
        .and(header("accept", "application/vnd.github+json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"login": "octocat"})))
        .expect(1)
        .mount(&server)
        .await;
    let dir = TempDir::new().unwrap();
    let config = create_test_config(&server.uri(), dir.path().to_str().unwrap(), "");
    let client = GitHubClient::new(&config, "secret").unwrap();

    let session = QuotaSession::authenticate(&client).await.unwrap();

    assert_eq!(session.login(), Some("octocat"));
}

#[tokio::test]
async fn test_bad_credentials_are_fatal() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/user"))
        .respond_with(
            ResponseTemplate::new(401).set_body_json(json!({"message": "Bad credentials"})),
        )
        .mount(&server)
        .await;
    let dir = TempDir::new().unwrap();
    let config = create_test_config(&server.uri(), dir.path().to_str().unwrap(), "");
    let client = GitHubClient::new(&config, "wrong").unwrap();

    let err = QuotaSession::authenticate(&client).await.unwrap_err();

    match err {
        MinerError::Auth(message) => assert_eq!(message, "Bad credentials"),
        other => panic!("expected auth error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_exhausted_quota_is_rate_limited() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/repos/octo/widgets/pulls/4"))
        .respond_with(
            ResponseTemplate::new(403)
                .insert_header("x-ratelimit-limit", "5000")
                .insert_header("x-ratelimit-remaining", "0")
                .insert_header("x-ratelimit-reset", "1700003600"),
        )
        .mount(&server)
        .await;
    let dir = TempDir::new().unwrap();
    let config = create_test_config(&server.uri(), dir.path().to_str().unwrap(), "");
    let client = GitHubClient::new(&config, "secret").unwrap();

    let err = client.pull_request(4).await.unwrap_err();

    assert!(matches!(
        err,
        TransportError::RateLimited { reset: 1_700_003_600 }
    ));
    assert_eq!(client.last_rate_limit().unwrap().remaining, 0);
}

#[tokio::test]
async fn test_missing_repository_and_server_errors() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(ISSUES))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/repos/octo/widgets/commits/abc"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;
    let dir = TempDir::new().unwrap();
    let config = create_test_config(&server.uri(), dir.path().to_str().unwrap(), "");
    let client = GitHubClient::new(&config, "secret").unwrap();

    let missing = client.issues(IssueState::Closed).await.unwrap_err();
    assert!(matches!(
        MinerError::from(missing),
        MinerError::UnknownResource(_)
    ));

    let flaky = client.commit("abc").await.unwrap_err();
    assert!(matches!(flaky, TransportError::Server { status: 503, .. }));
}

#[tokio::test]
async fn test_rate_limit_endpoint() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rate_limit"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "resources": {"core": {"limit": 5000, "remaining": 12, "reset": 1700000123}}
        })))
        .mount(&server)
        .await;
    let dir = TempDir::new().unwrap();
    let config = create_test_config(&server.uri(), dir.path().to_str().unwrap(), "");
    let client = GitHubClient::new(&config, "secret").unwrap();

    let rate_limit = client.rate_limit().await.unwrap();

    assert_eq!(rate_limit.remaining, 12);
    assert_eq!(rate_limit.reset, 1_700_000_123);
}

#[tokio::test]
async fn test_full_extraction_over_http() {
    let server = MockServer::start().await;
    mount_issue_pages(&server).await;
    Mock::given(method("GET"))
        .and(path("/user"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"login": "octocat"})))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let config = create_test_config(&server.uri(), dir.path().to_str().unwrap(), "");
    let client = GitHubClient::new(&config, "secret").unwrap();
    let selection = SchemaRegistry::new().selection(&config).unwrap();
    let store = CheckpointStore::new(config.output_path());
    let quota = QuotaSession::authenticate(&client).await.unwrap();

    let summary = Extractor::new(client, selection, config, store, quota, Shutdown::never())
        .run()
        .await
        .unwrap();

    // 3 is absent and rounds down to 2; 8 rounds down to 7
    assert_eq!(summary.items_written, 3);
    let output = dir.path().join("octo_widgets_issue.json");
    let document: Value = serde_json::from_str(&std::fs::read_to_string(output).unwrap()).unwrap();
    assert_eq!(
        document,
        json!({
            "2": {"title": "issue 2", "userlogin": "hubot"},
            "4": {"title": "issue 4", "userlogin": "hubot"},
            "7": {"title": "issue 7", "userlogin": "hubot"}
        })
    );
}
