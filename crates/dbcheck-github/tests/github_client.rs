use std::sync::Arc;
use std::time::Duration;

use dbcheck_core::{
    CommentState, Credential, Metadata, Outcome, PostError, Reconciler, Record, RecordSet,
    Reporter, Status, Summary, SummaryPoster,
};
use dbcheck_github::{GithubClient, GithubConfig, GithubError};
use httpmock::prelude::*;
use serde_json::json;

const REPO: &str = "arduino/arduino-examples";
const COMMENTS_PATH: &str = "/repos/arduino/arduino-examples/issues/42/comments";

fn config(server: &MockServer) -> GithubConfig {
    GithubConfig::new(REPO)
        .with_api_url(&server.base_url())
        .with_token(Credential::new("ghp_test"))
        .with_pull_request(42)
        .with_backoff(Duration::ZERO)
}

fn regression_summary() -> Summary {
    let one = |status| {
        RecordSet::from_records(vec![Record::new(
            "examples/01.Basics/Blink",
            "arduino:avr:uno",
            status,
            Metadata::new(),
        )
        .unwrap()])
        .unwrap()
    };
    let outcome: Outcome = Reconciler::default()
        .reconcile(&one(Status::Pass), &one(Status::Fail))
        .unwrap();
    Summary::from_outcome(&outcome)
}

async fn mock_rate_limit(server: &MockServer, remaining: u64) -> httpmock::Mock<'_> {
    server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/rate_limit")
                .header("authorization", "token ghp_test");
            then.status(200).json_body(json!({
                "resources": { "core": { "limit": 5000, "remaining": remaining, "reset": 1700000000 } }
            }));
        })
        .await
}

#[tokio::test]
async fn posts_markdown_comment_to_pull_request() {
    let server = MockServer::start_async().await;
    let rate_limit = mock_rate_limit(&server, 4999).await;
    let comment = server
        .mock_async(|when, then| {
            when.method(POST)
                .path(COMMENTS_PATH)
                .header("authorization", "token ghp_test")
                .header("user-agent", "arduino")
                .header("accept", "application/vnd.github+json")
                .body_includes("Compilation results database check");
            then.status(201).json_body(json!({
                "id": 1,
                "html_url": "https://github.com/arduino/arduino-examples/pull/42#issuecomment-1"
            }));
        })
        .await;

    let client = GithubClient::new(config(&server)).unwrap();
    client.post_summary(&regression_summary()).await.unwrap();

    rate_limit.assert_async().await;
    comment.assert_async().await;
}

#[tokio::test]
async fn exhausted_quota_skips_the_post() {
    let server = MockServer::start_async().await;
    let rate_limit = mock_rate_limit(&server, 0).await;
    let comment = server
        .mock_async(|when, then| {
            when.method(POST).path(COMMENTS_PATH);
            then.status(201).json_body(json!({ "id": 1 }));
        })
        .await;

    let client = GithubClient::new(config(&server)).unwrap();
    let err = client.post_summary(&regression_summary()).await.unwrap_err();

    assert_eq!(err, PostError::RateLimited);
    rate_limit.assert_async().await;
    comment.assert_calls_async(0).await;
}

#[tokio::test]
async fn rate_limiting_disabled_still_posts() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/rate_limit");
            then.status(404)
                .json_body(json!({ "message": "Rate limiting is not enabled." }));
        })
        .await;
    let comment = server
        .mock_async(|when, then| {
            when.method(POST).path(COMMENTS_PATH);
            then.status(201).json_body(json!({ "id": 7 }));
        })
        .await;

    let client = GithubClient::new(config(&server)).unwrap();
    client.post_summary(&regression_summary()).await.unwrap();
    comment.assert_async().await;
}

#[tokio::test]
async fn server_errors_are_retried_until_exhausted() {
    let server = MockServer::start_async().await;
    let comment = server
        .mock_async(|when, then| {
            when.method(POST).path(COMMENTS_PATH);
            then.status(503).body("Service Unavailable");
        })
        .await;

    let client = GithubClient::new(config(&server).with_max_retries(2)).unwrap();
    let err = client.post_comment("body").await.unwrap_err();

    match err {
        GithubError::RetriesExhausted {
            attempts,
            last_error,
        } => {
            assert_eq!(attempts, 3);
            assert!(last_error.contains("503"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
    comment.assert_calls_async(3).await;
}

#[tokio::test]
async fn retry_after_header_overrides_backoff() {
    let server = MockServer::start_async().await;
    let comment = server
        .mock_async(|when, then| {
            when.method(POST).path(COMMENTS_PATH);
            then.status(429)
                .header("retry-after", "0")
                .json_body(json!({ "message": "Too many requests" }));
        })
        .await;

    // A one-minute backoff would outlast the timeout unless Retry-After wins.
    let client = GithubClient::new(
        config(&server)
            .with_max_retries(1)
            .with_backoff(Duration::from_secs(60)),
    )
    .unwrap();
    let err = tokio::time::timeout(Duration::from_secs(10), client.post_comment("body"))
        .await
        .expect("retry should not wait for the backoff")
        .unwrap_err();

    assert!(matches!(err, GithubError::RetriesExhausted { attempts: 2, .. }));
    comment.assert_calls_async(2).await;
}

#[tokio::test]
async fn client_errors_are_not_retried() {
    let server = MockServer::start_async().await;
    let comment = server
        .mock_async(|when, then| {
            when.method(POST).path(COMMENTS_PATH);
            then.status(403)
                .json_body(json!({ "message": "Resource not accessible by integration" }));
        })
        .await;

    let client = GithubClient::new(config(&server)).unwrap();
    let err = client.post_comment("body").await.unwrap_err();

    match err {
        GithubError::Status { status, message } => {
            assert_eq!(status, 403);
            assert_eq!(message, "Resource not accessible by integration");
        }
        other => panic!("unexpected error: {other:?}"),
    }
    comment.assert_calls_async(1).await;
}

#[tokio::test]
async fn secondary_rate_limit_is_reported_as_rate_limited() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path(COMMENTS_PATH);
            then.status(403)
                .json_body(json!({ "message": "You have exceeded a secondary rate limit." }));
        })
        .await;

    let client = GithubClient::new(config(&server)).unwrap();
    let err = client.post_comment("body").await.unwrap_err();
    assert!(matches!(err, GithubError::RateLimited));
}

#[tokio::test]
async fn no_pull_request_is_skipped_by_reporter() {
    let server = MockServer::start_async().await;
    let rate_limit = mock_rate_limit(&server, 4999).await;

    let mut config = config(&server);
    config.pull_request = None;
    let client = GithubClient::new(config).unwrap();
    let reporter = Reporter::with_poster(Arc::new(client));

    let outcome = Reconciler::default()
        .reconcile(&RecordSet::default(), &RecordSet::default())
        .unwrap();
    let mut log = Vec::new();
    let status = reporter.report(&outcome, &mut log).await.unwrap();

    assert_eq!(status.comment, CommentState::Skipped);
    assert!(!status.ci_should_fail);
    rate_limit.assert_calls_async(0).await;
}

#[tokio::test]
async fn rejected_post_leaves_gate_failing() {
    let server = MockServer::start_async().await;
    mock_rate_limit(&server, 4999).await;
    server
        .mock_async(|when, then| {
            when.method(POST).path(COMMENTS_PATH);
            then.status(404).json_body(json!({ "message": "Not Found" }));
        })
        .await;

    let reporter = Reporter::with_poster(Arc::new(GithubClient::new(config(&server)).unwrap()));
    let one = |status| {
        RecordSet::from_records(vec![
            Record::new("examples/Blink", "arduino:avr:uno", status, Metadata::new()).unwrap(),
        ])
        .unwrap()
    };
    let outcome = Reconciler::default()
        .reconcile(&one(Status::Pass), &one(Status::Skip))
        .unwrap();

    let mut log = Vec::new();
    let status = reporter.report(&outcome, &mut log).await.unwrap();

    assert!(status.ci_should_fail);
    match status.comment {
        CommentState::Failed(reason) => assert!(reason.contains("404")),
        other => panic!("unexpected comment state: {other:?}"),
    }
}
