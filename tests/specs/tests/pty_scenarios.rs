// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! End-to-end PTY multiplexing scenarios over the library API.

use std::time::Duration;

use bytes::Bytes;
use catnip::events::EventPublisher;
use catnip::pty::manager::{PtyConfig, PtyManager, SubscriberHandle};
use catnip::pty::protocol::{ControlFrame, Frame};
use catnip::pty::{Fanout, PtyInput, SessionKey};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

fn cat_manager() -> PtyManager {
    PtyManager::new(
        PtyConfig {
            cols: 120,
            rows: 40,
            queue_capacity: 256,
            shell_command: vec!["/bin/cat".to_owned()],
            agent_command: vec!["/bin/cat".to_owned()],
        },
        EventPublisher::new(),
        CancellationToken::new(),
    )
}

async fn next_frame(handle: &mut SubscriberHandle) -> Frame {
    tokio::time::timeout(Duration::from_secs(5), handle.rx.recv())
        .await
        .expect("timed out waiting for frame")
        .expect("frame stream closed")
}

/// Consume frames until a control frame matching `pred` arrives.
async fn wait_for_control(
    handle: &mut SubscriberHandle,
    pred: impl Fn(&ControlFrame) -> bool,
) -> ControlFrame {
    loop {
        if let Frame::Control(frame) = next_frame(handle).await {
            if pred(&frame) {
                return frame;
            }
        }
    }
}

/// Consume output frames until `needle` has been seen.
async fn wait_for_output(handle: &mut SubscriberHandle, needle: &str) -> String {
    let mut text = String::new();
    loop {
        if let Frame::Output(data) = next_frame(handle).await {
            text.push_str(&String::from_utf8_lossy(&data));
            if text.contains(needle) {
                return text;
            }
        }
    }
}

// -- Scenario D: writer promotion ---------------------------------------------

#[tokio::test]
async fn writer_promotion() -> anyhow::Result<()> {
    let mgr = cat_manager();
    let dir = tempfile::tempdir()?;
    let key = SessionKey::new("alpha", None);

    let mut sub1 = mgr.subscribe(key.clone(), dir.path(), None).await.unwrap();
    let mut sub2 = mgr.subscribe(key, dir.path(), None).await.unwrap();

    // Subscriber 1 joined first and is the writer.
    let role1 = wait_for_control(&mut sub1, |f| matches!(f, ControlFrame::ReadOnly { .. })).await;
    let role2 = wait_for_control(&mut sub2, |f| matches!(f, ControlFrame::ReadOnly { .. })).await;
    assert_eq!(role1, ControlFrame::ReadOnly { data: false });
    assert_eq!(role2, ControlFrame::ReadOnly { data: true });
    sub1.ready();
    sub2.ready();

    // Subscriber 2 requests the writer role.
    sub2.promote();
    let demoted = wait_for_control(&mut sub1, |f| matches!(f, ControlFrame::ReadOnly { .. })).await;
    let elevated = wait_for_control(&mut sub2, |f| matches!(f, ControlFrame::ReadOnly { .. })).await;
    assert_eq!(demoted, ControlFrame::ReadOnly { data: true });
    assert_eq!(elevated, ControlFrame::ReadOnly { data: false });

    // A keystroke from the demoted subscriber is dropped; one from the new
    // writer reaches the pty (cat echoes it back to everyone).
    sub1.input(Bytes::from_static(b"dropped\n")).await;
    sub2.input(Bytes::from_static(b"accepted\n")).await;

    let seen = wait_for_output(&mut sub2, "accepted").await;
    assert!(!seen.contains("dropped"));
    Ok(())
}

// -- Scenario E: resize arbitration -------------------------------------------

#[tokio::test]
async fn resize_arbitration() -> anyhow::Result<()> {
    let mgr = cat_manager();
    let dir = tempfile::tempdir()?;
    let key = SessionKey::new("alpha", None);

    let mut sub1 = mgr.subscribe(key.clone(), dir.path(), None).await.unwrap();
    let mut sub2 = mgr.subscribe(key, dir.path(), None).await.unwrap();
    sub1.ready();
    sub2.ready();

    sub1.resize(120, 40).await;
    sub2.resize(80, 24).await;

    // Both receive the minimum-covering geometry.
    let bs1 = wait_for_control(&mut sub1, |f| {
        matches!(f, ControlFrame::BufferSize { cols: 80, rows: 24 })
    })
    .await;
    let bs2 = wait_for_control(&mut sub2, |f| {
        matches!(f, ControlFrame::BufferSize { cols: 80, rows: 24 })
    })
    .await;
    assert_eq!(bs1, ControlFrame::BufferSize { cols: 80, rows: 24 });
    assert_eq!(bs2, ControlFrame::BufferSize { cols: 80, rows: 24 });
    Ok(())
}

// -- Invariant 5: fan-out correctness -----------------------------------------

#[tokio::test]
async fn fanout_delivers_every_byte_to_every_subscriber() {
    let (pty_tx, _pty_rx) = mpsc::channel::<PtyInput>(8);
    let fanout = Fanout::new(80, 24, 4096, pty_tx);

    let mut subscribers = Vec::new();
    for _ in 0..3 {
        let (id, rx) = fanout.join();
        fanout.mark_ready(id);
        subscribers.push(rx);
    }

    let mut expected = Vec::new();
    for i in 0..100u32 {
        let chunk = format!("chunk-{i};");
        expected.extend_from_slice(chunk.as_bytes());
        fanout.broadcast(chunk.as_bytes());
    }

    for mut rx in subscribers {
        let mut received = Vec::new();
        while let Ok(frame) = rx.try_recv() {
            if let Frame::Output(data) = frame {
                received.extend_from_slice(&data);
            }
        }
        // Each subscriber saw every byte exactly once, in source order.
        assert_eq!(received, expected);
    }
    assert_eq!(fanout.bytes_emitted(), expected.len() as u64);
}

// -- Invariant 6: at most one writer ------------------------------------------

#[tokio::test]
async fn writer_count_never_exceeds_one() {
    let (pty_tx, _pty_rx) = mpsc::channel::<PtyInput>(8);
    let fanout = Fanout::new(80, 24, 64, pty_tx);

    let mut ids = Vec::new();
    for _ in 0..5 {
        let (id, rx) = fanout.join();
        fanout.mark_ready(id);
        ids.push((id, rx));
        assert!(fanout.writer_id().is_some());
    }

    // Promote each in turn, then peel subscribers off; the writer is always
    // unique and always one of the remaining subscribers.
    for (id, _) in &ids {
        fanout.promote(*id);
        assert_eq!(fanout.writer_id(), Some(*id));
    }

    while let Some((id, rx)) = ids.pop() {
        drop(rx);
        let empty = fanout.leave(id);
        let remaining: Vec<_> = ids.iter().map(|(id, _)| *id).collect();
        match fanout.writer_id() {
            Some(writer) => assert!(remaining.contains(&writer)),
            None => assert!(empty),
        }
    }
}
