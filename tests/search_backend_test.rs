#![cfg(unix)]

use candidate_miner::types::{DiscoveryConstraints, MinerError};
use candidate_miner::{ChannelSearchBackend, SearchAgentConfig, SubprocessSearchBackend};
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::PathBuf;
use std::time::Duration;
use tempfile::TempDir;

/// Writes an executable shell script standing in for the search agent.
fn fake_agent(dir: &TempDir, body: &str) -> PathBuf {
    let path = dir.path().join("fake-search-agent");
    fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
    path
}

fn backend(path: PathBuf) -> SubprocessSearchBackend {
    SubprocessSearchBackend::new(
        SearchAgentConfig::new(path)
            .with_timeout(Duration::from_secs(5))
            .with_grace_period(Duration::from_millis(200)),
    )
}

#[tokio::test]
async fn parses_the_last_line_after_progress_chatter() {
    let dir = TempDir::new().unwrap();
    let path = fake_agent(
        &dir,
        r#"echo "searching the web..."
echo "found a promising community"
echo '{"status": "ok", "channels": [{"channel_type": "search-query", "name": "rust-jobs", "search_query": "site:github.com rust backend", "example": {"name": "Jane Doe", "url": "https://github.com/janedoe"}}]}'"#,
    );

    let channels = backend(path)
        .propose("senior backend engineers", &DiscoveryConstraints::default())
        .await
        .unwrap();

    assert_eq!(channels.len(), 1);
    assert_eq!(channels[0].name, "rust-jobs");
    assert!(channels[0].has_verified_example());
}

#[tokio::test]
async fn reported_error_status_becomes_a_search_error() {
    let dir = TempDir::new().unwrap();
    let path = fake_agent(
        &dir,
        r#"echo '{"status": "error", "error": "search quota exhausted"}'"#,
    );

    let err = backend(path)
        .propose("senior backend engineers", &DiscoveryConstraints::default())
        .await
        .unwrap_err();

    match err {
        MinerError::Search(message) => assert!(message.contains("quota exhausted")),
        other => panic!("expected search error, got {:?}", other),
    }
}

#[tokio::test]
async fn nonzero_exit_carries_the_output_tail() {
    let dir = TempDir::new().unwrap();
    let path = fake_agent(
        &dir,
        r#"echo "something went sideways" >&2
exit 3"#,
    );

    let err = backend(path)
        .propose("senior backend engineers", &DiscoveryConstraints::default())
        .await
        .unwrap_err();

    match err {
        MinerError::Search(message) => {
            assert!(message.contains("something went sideways"));
        }
        other => panic!("expected search error, got {:?}", other),
    }
}

#[tokio::test]
async fn empty_output_is_a_search_error() {
    let dir = TempDir::new().unwrap();
    let path = fake_agent(&dir, "exit 0");

    let err = backend(path)
        .propose("senior backend engineers", &DiscoveryConstraints::default())
        .await
        .unwrap_err();
    assert!(matches!(err, MinerError::Search(_)));
}

#[tokio::test]
async fn malformed_result_line_is_a_search_error() {
    let dir = TempDir::new().unwrap();
    let path = fake_agent(&dir, r#"echo "this is not a result record""#);

    let err = backend(path)
        .propose("senior backend engineers", &DiscoveryConstraints::default())
        .await
        .unwrap_err();

    match err {
        MinerError::Search(message) => assert!(message.contains("malformed")),
        other => panic!("expected search error, got {:?}", other),
    }
}

#[tokio::test]
async fn overrunning_agent_times_out_with_diagnostics() {
    let dir = TempDir::new().unwrap();
    let path = fake_agent(
        &dir,
        r#"echo "still searching..."
exec sleep 30"#,
    );

    let backend = SubprocessSearchBackend::new(
        SearchAgentConfig::new(path)
            .with_timeout(Duration::from_millis(300))
            .with_grace_period(Duration::from_millis(200)),
    );

    let err = backend
        .propose("senior backend engineers", &DiscoveryConstraints::default())
        .await
        .unwrap_err();

    match err {
        MinerError::Timeout {
            seconds,
            output_tail,
        } => {
            assert_eq!(seconds, 0);
            assert!(output_tail.contains("still searching"));
        }
        other => panic!("expected timeout, got {:?}", other),
    }
}
