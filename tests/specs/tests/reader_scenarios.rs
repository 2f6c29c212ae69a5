// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! End-to-end reader scenarios over the library API.

use std::sync::Arc;

use catnip::session::{MessageFilter, SessionReader};
use serde_json::json;

use catnip_specs::{
    assistant_text, assistant_tool, assistant_usage, sidechain_assistant, sidechain_user, user,
    SessionLog,
};

// -- Scenario A: latest-message skips tool-only -------------------------------

#[test]
fn latest_message_skips_tool_only() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let log = SessionLog::create(dir.path().join("session.jsonl"))?;
    log.append(&[
        user("u-1", "Help me analyze", 0),
        assistant_text("a-1", "u-1", "I'll analyze", 1),
        assistant_tool("a-2", "u-1", "Read", 2),
    ])?;

    let reader = SessionReader::new(log.path());
    reader.read_full()?;

    assert_eq!(reader.latest_message().map(|m| m.uuid), Some("a-1".to_owned()));
    assert!(reader.latest_thought().is_none());
    assert_eq!(reader.stats().assistant_messages, 2);
    Ok(())
}

// -- Scenario B: truncation recovery ------------------------------------------

#[test]
fn truncation_recovery() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let log = SessionLog::create(dir.path().join("session.jsonl"))?;
    log.append(&[user("u-1", "one", 0), user("u-2", "two", 1)])?;

    let reader = SessionReader::new(log.path());
    assert_eq!(reader.read_incremental()?.len(), 2);

    log.rewrite(&[user("u-9", "fresh", 2)])?;

    let batch = reader.read_incremental()?;
    assert_eq!(batch.len(), 1);
    assert_eq!(batch[0].uuid, "u-9");
    assert_eq!(reader.stats().total_messages, 1);

    // Post-truncation state equals a cold full read of the new content.
    let cold = SessionReader::new(log.path());
    cold.read_full()?;
    assert_eq!(reader.stats().total_messages, cold.stats().total_messages);
    assert_eq!(reader.stats().user_messages, cold.stats().user_messages);

    // The offset regrew past the new content.
    log.append(&[user("u-10", "more", 3)])?;
    assert_eq!(reader.read_incremental()?.len(), 1);
    Ok(())
}

// -- Scenario C: warmup filtering ---------------------------------------------

#[test]
fn warmup_filtering() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let log = SessionLog::create(dir.path().join("session.jsonl"))?;
    log.append(&[
        sidechain_user("w-1", "Warmup", 0),
        sidechain_assistant("w-2", "w-1", "ready", 1),
        user("u-1", "Real question", 2),
        assistant_text("a-1", "u-1", "Answer", 3),
    ])?;

    let reader = SessionReader::new(log.path());
    reader.read_full()?;

    let latest = reader.latest_message().expect("latest message");
    assert_eq!(latest.uuid, "a-1");

    let visible = reader.messages_matching(&MessageFilter::default_filter())?;
    // The warmup pair collapses to one skip of the assistant reply.
    assert_eq!(visible.len(), 3);
    assert!(visible.iter().all(|m| m.uuid != "w-2"));
    Ok(())
}

// -- Scenario F: token tallying -----------------------------------------------

#[test]
fn token_tallying() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let log = SessionLog::create(dir.path().join("session.jsonl"))?;
    log.append(&[assistant_usage(
        "a-1",
        "",
        json!({
            "input_tokens": 100.0,
            "output_tokens": 50.0,
            "cache_read_input_tokens": 200,
            "cache_creation_input_tokens": 150
        }),
        0,
    )])?;

    let reader = SessionReader::new(log.path());
    reader.read_full()?;

    let stats = reader.stats();
    assert_eq!(stats.input_tokens, 100);
    assert_eq!(stats.output_tokens, 50);
    assert_eq!(stats.cache_read_tokens, 200);
    assert_eq!(stats.cache_creation_tokens, 150);
    assert_eq!(stats.last_context_size, 200);
    assert_eq!(stats.api_calls, 1);
    Ok(())
}

// -- Invariants ---------------------------------------------------------------

#[test]
fn rereads_are_idempotent() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let log = SessionLog::create(dir.path().join("session.jsonl"))?;
    log.append(&[
        user("u-1", "q", 0),
        assistant_text("a-1", "u-1", "a", 5),
        user("u-2", "q2", 10),
    ])?;

    let reader = SessionReader::new(log.path());
    reader.read_incremental()?;
    let first = reader.stats();

    for _ in 0..5 {
        assert!(reader.read_incremental()?.is_empty());
    }
    let after = reader.stats();
    assert_eq!(first.total_messages, after.total_messages);
    assert_eq!(first.session_duration_ms, after.session_duration_ms);
    assert_eq!(first.active_duration_ms, after.active_duration_ms);
    Ok(())
}

#[test]
fn durations_are_consistent() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let log = SessionLog::create(dir.path().join("session.jsonl"))?;
    let reader = SessionReader::new(log.path());

    let mut last_session_duration = 0;
    for turn in 0..5u32 {
        let base = turn * 20;
        log.append(&[
            user(&format!("u-{turn}"), "prompt", base),
            assistant_text(&format!("a-{turn}"), &format!("u-{turn}"), "reply", base + 7),
        ])?;
        reader.read_incremental()?;

        let stats = reader.stats();
        assert!(stats.session_duration_ms >= last_session_duration);
        assert!(stats.active_duration_ms <= stats.session_duration_ms);
        last_session_duration = stats.session_duration_ms;
    }
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn concurrent_snapshots_are_consistent() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let log = SessionLog::create(dir.path().join("session.jsonl"))?;
    let reader = Arc::new(SessionReader::new(log.path()));

    let writer = {
        let log_path = log.path().to_path_buf();
        let reader = Arc::clone(&reader);
        tokio::task::spawn_blocking(move || -> anyhow::Result<()> {
            let log = SessionLog::create(&log_path)?;
            for i in 0..200u32 {
                log.append(&[
                    user(&format!("u-{i}"), "q", i),
                    assistant_text(&format!("a-{i}"), &format!("u-{i}"), "a", i),
                ])?;
                reader.read_incremental()?;
            }
            Ok(())
        })
    };

    let snapshots = {
        let reader = Arc::clone(&reader);
        tokio::task::spawn_blocking(move || {
            for _ in 0..500 {
                let stats = reader.stats();
                // A snapshot never shows a half-applied pair fold.
                assert!(stats.user_messages >= stats.assistant_messages);
                assert_eq!(stats.total_messages, stats.user_messages + stats.assistant_messages);
            }
        })
    };

    writer.await??;
    snapshots.await?;
    assert_eq!(reader.stats().total_messages, 400);
    Ok(())
}
