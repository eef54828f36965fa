#![allow(clippy::expect_used, clippy::unwrap_used)]

//! Command tests against the in-memory transport.

use std::sync::Arc;

use board_cli::{run_cli, CommandOutput};
use board_feed::config::BoardConfig;
use board_feed::error::FeedError;
use board_feed::mock::{test_log, MockCall, MockFeedTransport};
use board_feed::types::FetchKind;

async fn run(args: &[&str], mock: &Arc<MockFeedTransport>) -> CommandOutput {
    let owned: Vec<String> = args.iter().map(|a| (*a).to_string()).collect();
    run_cli(&owned, mock.clone(), &BoardConfig::default()).await
}

#[tokio::test]
async fn no_args_shows_help() {
    let mock = Arc::new(MockFeedTransport::new());
    let out = run(&[], &mock).await;
    assert_eq!(out.exit_code, 0);
    assert!(out.stdout.contains("Available Commands:"));
    assert_eq!(mock.call_count(), 0);
}

#[tokio::test]
async fn unknown_command_fails() {
    let mock = Arc::new(MockFeedTransport::new());
    let out = run(&["frobnicate"], &mock).await;
    assert_eq!(out.exit_code, 1);
    assert!(out.stderr.contains("unknown command \"frobnicate\""));
}

#[tokio::test]
async fn feed_prints_newest_first() {
    let mock = Arc::new(MockFeedTransport::new().with_items(test_log(3)));
    let out = run(&["feed"], &mock).await;
    assert_eq!(out.exit_code, 0, "stderr={}", out.stderr);

    let lines: Vec<&str> = out.stdout.lines().collect();
    assert_eq!(lines.len(), 3);
    assert!(lines[0].ends_with("anonymous: post 3"));
    assert!(lines[2].ends_with("anonymous: post 1"));
    assert!(out.stderr.is_empty());
}

#[tokio::test]
async fn feed_walks_older_pages() {
    let mock = Arc::new(MockFeedTransport::new().with_items(test_log(12)));
    let out = run(&["feed", "-n", "5", "--pages", "4"], &mock).await;
    assert_eq!(out.exit_code, 0);
    assert_eq!(out.stdout.lines().count(), 12);

    // The third page came back short, so the fourth was never requested.
    let kinds: Vec<FetchKind> = mock.page_requests().iter().map(|r| r.kind).collect();
    assert_eq!(
        kinds,
        vec![FetchKind::Freshest, FetchKind::Older, FetchKind::Older]
    );
}

#[tokio::test]
async fn feed_hints_when_older_posts_remain() {
    let mock = Arc::new(MockFeedTransport::new().with_items(test_log(12)));
    let out = run(&["feed", "-n", "5"], &mock).await;
    assert_eq!(out.stdout.lines().count(), 5);
    assert!(out.stderr.contains("older posts available"));
}

#[tokio::test]
async fn feed_json_emits_one_object_per_line() {
    let mock = Arc::new(MockFeedTransport::new().with_items(test_log(2)));
    let out = run(&["feed", "--json"], &mock).await;
    assert_eq!(out.exit_code, 0);

    let first: serde_json::Value = serde_json::from_str(out.stdout.lines().next().unwrap()).unwrap();
    assert_eq!(first["id"], "2");
    assert_eq!(first["body"], "post 2");
}

#[tokio::test]
async fn feed_reports_transport_errors() {
    let mock = Arc::new(MockFeedTransport::new().with_fetch_error(FeedError::Transport {
        message: "connection refused".into(),
    }));
    let out = run(&["feed"], &mock).await;
    assert_eq!(out.exit_code, 1);
    assert!(out.stderr.contains("connection refused"));
    assert!(out.stdout.is_empty());
}

#[tokio::test]
async fn feed_usage_errors_exit_2() {
    let mock = Arc::new(MockFeedTransport::new());
    let out = run(&["feed", "--limit", "zero"], &mock).await;
    assert_eq!(out.exit_code, 2);
    assert_eq!(mock.call_count(), 0);
}

#[tokio::test]
async fn post_publishes_joined_message() {
    let mock = Arc::new(MockFeedTransport::new().with_items(test_log(2)));
    let out = run(&["post", "--as", "kit", "hello", "board"], &mock).await;
    assert_eq!(out.exit_code, 0, "stderr={}", out.stderr);
    assert!(out.stdout.starts_with("posted 3 as kit at "));

    match &mock.calls()[0] {
        MockCall::Publish(post) => {
            assert_eq!(post.body, "hello board");
            assert_eq!(post.author_label.as_deref(), Some("kit"));
        }
        other => panic!("unexpected call: {other:?}"),
    }
}

#[tokio::test]
async fn post_rejects_blank_message() {
    let mock = Arc::new(MockFeedTransport::new());
    let out = run(&["post", "   "], &mock).await;
    assert_eq!(out.exit_code, 2);
    assert!(out.stderr.contains("body is required"));
    assert_eq!(mock.call_count(), 0);
}

#[tokio::test]
async fn post_json_returns_stored_item() {
    let mock = Arc::new(MockFeedTransport::new());
    let out = run(&["post", "--json", "first!"], &mock).await;
    assert_eq!(out.exit_code, 0);
    let item: serde_json::Value = serde_json::from_str(out.stdout.trim()).unwrap();
    assert_eq!(item["author_label"], "anonymous");
    assert_eq!(item["body"], "first!");
}
