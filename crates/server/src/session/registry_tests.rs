// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::io::Write;
use std::time::Duration;

use serde_json::json;

use super::*;

fn registry(dir: &tempfile::TempDir) -> SessionRegistry {
    let history = HistoryReader::new(
        dir.path().join("history.jsonl"),
        dir.path().join("legacy.json"),
    );
    SessionRegistry::new(EventPublisher::new(), history)
        .with_poll_interval(Duration::from_millis(20))
}

fn write_log(path: &std::path::Path, uuids: &[&str]) {
    let mut file = std::fs::File::create(path).unwrap();
    for uuid in uuids {
        writeln!(
            file,
            "{}",
            json!({ "type": "user", "uuid": uuid, "message": { "content": "hello" } })
        )
        .unwrap();
    }
}

async fn wait_for_messages(registry: &SessionRegistry, workspace: &str, count: u64) {
    for _ in 0..200 {
        if registry.stats(workspace).await.map(|s| s.total_messages) == Some(count) {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    let got = registry.stats(workspace).await.map(|s| s.total_messages);
    assert_eq!(got, Some(count), "reader never caught up");
}

#[tokio::test]
async fn track_creates_reader_and_serves_snapshots() {
    let dir = tempfile::tempdir().unwrap();
    let log = dir.path().join("s1.jsonl");
    write_log(&log, &["u-1", "u-2"]);

    let registry = registry(&dir);
    registry.track("alpha", &log).await;
    wait_for_messages(&registry, "alpha", 2).await;

    let summary = registry.summary("alpha").await.unwrap();
    assert_eq!(summary.workspace, "alpha");
    assert_eq!(summary.stats.user_messages, 2);
    assert_eq!(summary.session_log, log);

    assert!(registry.summary("unknown").await.is_none());
    assert_eq!(registry.workspaces().await, vec!["alpha".to_owned()]);
}

#[tokio::test]
async fn retrack_same_path_keeps_reader_state() {
    let dir = tempfile::tempdir().unwrap();
    let log = dir.path().join("s1.jsonl");
    write_log(&log, &["u-1"]);

    let registry = registry(&dir);
    registry.track("alpha", &log).await;
    wait_for_messages(&registry, "alpha", 1).await;

    registry.track("alpha", &log).await;
    assert_eq!(registry.stats("alpha").await.unwrap().total_messages, 1);
}

#[tokio::test]
async fn path_change_resets_reader() {
    let dir = tempfile::tempdir().unwrap();
    let first = dir.path().join("s1.jsonl");
    let second = dir.path().join("s2.jsonl");
    write_log(&first, &["u-1", "u-2", "u-3"]);
    write_log(&second, &["u-9"]);

    let registry = registry(&dir);
    registry.track("alpha", &first).await;
    wait_for_messages(&registry, "alpha", 3).await;

    registry.track("alpha", &second).await;
    wait_for_messages(&registry, "alpha", 1).await;
    let summary = registry.summary("alpha").await.unwrap();
    assert_eq!(summary.session_log, second);
}

#[tokio::test]
async fn remove_forgets_workspace() {
    let dir = tempfile::tempdir().unwrap();
    let log = dir.path().join("s1.jsonl");
    write_log(&log, &["u-1"]);

    let registry = registry(&dir);
    registry.track("alpha", &log).await;
    registry.remove("alpha").await;

    assert!(registry.stats("alpha").await.is_none());
    assert!(registry.workspaces().await.is_empty());
}

#[tokio::test]
async fn messages_distinguishes_untracked_from_empty() {
    let dir = tempfile::tempdir().unwrap();
    let log = dir.path().join("absent.jsonl");

    let registry = registry(&dir);
    assert!(registry
        .messages("alpha", &MessageFilter::default_filter())
        .await
        .unwrap()
        .is_none());

    registry.track("alpha", &log).await;
    let messages = registry
        .messages("alpha", &MessageFilter::default_filter())
        .await
        .unwrap()
        .unwrap();
    assert!(messages.is_empty());
}
