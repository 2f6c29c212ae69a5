// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use tokio::sync::mpsc;

use super::*;
use crate::pty::protocol::{ControlFrame, Frame};

fn fanout_with_pty() -> (Fanout, mpsc::Receiver<PtyInput>) {
    let (pty_tx, pty_rx) = mpsc::channel(64);
    (Fanout::new(120, 40, 64, pty_tx), pty_rx)
}

fn drain(rx: &mut mpsc::Receiver<Frame>) -> Vec<Frame> {
    let mut frames = Vec::new();
    while let Ok(frame) = rx.try_recv() {
        frames.push(frame);
    }
    frames
}

#[tokio::test]
async fn join_burst_replays_buffer_in_order() {
    let (fanout, _pty_rx) = fanout_with_pty();
    fanout.broadcast(b"earlier output");

    let (_id, mut rx) = fanout.join();
    let frames = drain(&mut rx);
    assert_eq!(
        frames,
        vec![
            Frame::Control(ControlFrame::BufferSize { cols: 120, rows: 40 }),
            Frame::Output(bytes::Bytes::from_static(b"earlier output")),
            Frame::Control(ControlFrame::BufferComplete {}),
            Frame::Control(ControlFrame::ReadOnly { data: false }),
        ]
    );
}

#[tokio::test]
async fn empty_buffer_join_skips_replay_payload() {
    let (fanout, _pty_rx) = fanout_with_pty();
    let (_id, mut rx) = fanout.join();
    let frames = drain(&mut rx);
    assert_eq!(
        frames,
        vec![
            Frame::Control(ControlFrame::BufferSize { cols: 120, rows: 40 }),
            Frame::Control(ControlFrame::BufferComplete {}),
            Frame::Control(ControlFrame::ReadOnly { data: false }),
        ]
    );
}

#[tokio::test]
async fn live_bytes_wait_for_ready() {
    let (fanout, _pty_rx) = fanout_with_pty();
    let (id, mut rx) = fanout.join();
    drain(&mut rx);

    fanout.broadcast(b"live-1");
    fanout.broadcast(b"live-2");
    assert!(rx.try_recv().is_err(), "live bytes must queue until ready");

    fanout.mark_ready(id);
    let frames = drain(&mut rx);
    assert_eq!(
        frames,
        vec![
            Frame::Output(bytes::Bytes::from_static(b"live-1")),
            Frame::Output(bytes::Bytes::from_static(b"live-2")),
        ]
    );

    fanout.broadcast(b"live-3");
    assert_eq!(
        drain(&mut rx),
        vec![Frame::Output(bytes::Bytes::from_static(b"live-3"))]
    );
}

#[tokio::test]
async fn first_subscriber_is_writer_later_joiners_read() {
    let (fanout, _pty_rx) = fanout_with_pty();
    let (first, mut rx1) = fanout.join();
    let (_second, mut rx2) = fanout.join();

    assert_eq!(fanout.writer_id(), Some(first));
    let role1 = drain(&mut rx1).pop().unwrap();
    let role2 = drain(&mut rx2).pop().unwrap();
    assert_eq!(role1, Frame::Control(ControlFrame::ReadOnly { data: false }));
    assert_eq!(role2, Frame::Control(ControlFrame::ReadOnly { data: true }));
}

#[tokio::test]
async fn promotion_swaps_roles_atomically() {
    let (fanout, mut pty_rx) = fanout_with_pty();
    let (first, mut rx1) = fanout.join();
    let (second, mut rx2) = fanout.join();
    fanout.mark_ready(first);
    fanout.mark_ready(second);
    drain(&mut rx1);
    drain(&mut rx2);

    fanout.promote(second);
    assert_eq!(fanout.writer_id(), Some(second));
    assert_eq!(
        drain(&mut rx1),
        vec![Frame::Control(ControlFrame::ReadOnly { data: true })]
    );
    assert_eq!(
        drain(&mut rx2),
        vec![Frame::Control(ControlFrame::ReadOnly { data: false })]
    );

    // Keystrokes from the demoted writer are dropped with a reminder; the
    // new writer's input reaches the PTY.
    fanout.input(first, bytes::Bytes::from_static(b"x")).await;
    assert!(pty_rx.try_recv().is_err());
    assert_eq!(
        drain(&mut rx1),
        vec![Frame::Control(ControlFrame::ReadOnly { data: true })]
    );

    fanout.input(second, bytes::Bytes::from_static(b"y")).await;
    match pty_rx.try_recv() {
        Ok(PtyInput::Write(data)) => assert_eq!(&data[..], b"y"),
        other => panic!("expected write, got {other:?}"),
    }
}

#[tokio::test]
async fn resize_arbitration_uses_minimum_covering_rect() {
    let (fanout, mut pty_rx) = fanout_with_pty();
    let (first, mut rx1) = fanout.join();
    let (second, mut rx2) = fanout.join();
    fanout.mark_ready(first);
    fanout.mark_ready(second);
    drain(&mut rx1);
    drain(&mut rx2);

    fanout.resize(first, 120, 40).await;
    fanout.resize(second, 80, 24).await;

    assert_eq!(fanout.geometry(), (80, 24));
    match pty_rx.recv().await {
        Some(PtyInput::Resize { cols, rows }) => assert_eq!((cols, rows), (120, 40)),
        other => panic!("expected resize, got {other:?}"),
    }
    match pty_rx.recv().await {
        Some(PtyInput::Resize { cols, rows }) => assert_eq!((cols, rows), (80, 24)),
        other => panic!("expected resize, got {other:?}"),
    }

    // Both subscribers hear the arbitrated geometry.
    assert!(drain(&mut rx1)
        .contains(&Frame::Control(ControlFrame::BufferSize { cols: 80, rows: 24 })));
    assert!(drain(&mut rx2)
        .contains(&Frame::Control(ControlFrame::BufferSize { cols: 80, rows: 24 })));
}

#[tokio::test]
async fn focused_subscribers_win_arbitration() {
    let (fanout, mut pty_rx) = fanout_with_pty();
    let (first, mut rx1) = fanout.join();
    let (second, mut rx2) = fanout.join();
    fanout.mark_ready(first);
    fanout.mark_ready(second);

    fanout.resize(first, 120, 40).await;
    fanout.resize(second, 80, 24).await;
    assert_eq!(fanout.geometry(), (80, 24));

    // Only the large terminal is focused now; it defines the geometry.
    fanout.focus(first, true).await;
    assert_eq!(fanout.geometry(), (120, 40));

    while pty_rx.try_recv().is_ok() {}
    drain(&mut rx1);
    drain(&mut rx2);
}

#[tokio::test]
async fn slow_subscriber_is_evicted_without_stalling_others() {
    let (pty_tx, _pty_rx) = mpsc::channel(64);
    let fanout = Fanout::new(80, 24, 8, pty_tx);

    let (slow, _slow_rx) = fanout.join();
    let (healthy, mut healthy_rx) = fanout.join();
    fanout.mark_ready(slow);
    fanout.mark_ready(healthy);
    drain(&mut healthy_rx);

    // The slow subscriber never drains; overflow its queue.
    for i in 0..64 {
        fanout.broadcast(format!("chunk-{i}").as_bytes());
        while healthy_rx.try_recv().is_ok() {}
    }

    assert_eq!(fanout.subscriber_count(), 1);
    // The writer role moved off the evicted subscriber.
    assert_eq!(fanout.writer_id(), Some(healthy));

    fanout.broadcast(b"after eviction");
    assert_eq!(
        drain(&mut healthy_rx),
        vec![Frame::Output(bytes::Bytes::from_static(b"after eviction"))]
    );
}

#[tokio::test]
async fn writer_leave_promotes_oldest_remaining() {
    let (fanout, _pty_rx) = fanout_with_pty();
    let (first, _rx1) = fanout.join();
    let (second, mut rx2) = fanout.join();
    let (third, mut rx3) = fanout.join();
    fanout.mark_ready(second);
    fanout.mark_ready(third);
    drain(&mut rx2);
    drain(&mut rx3);

    assert!(!fanout.leave(first));
    assert_eq!(fanout.writer_id(), Some(second));
    assert_eq!(
        drain(&mut rx2),
        vec![Frame::Control(ControlFrame::ReadOnly { data: false })]
    );
    assert!(drain(&mut rx3).is_empty());

    assert!(!fanout.leave(second));
    assert!(fanout.leave(third));
    assert_eq!(fanout.writer_id(), None);
}

#[tokio::test]
async fn restart_clears_replay_for_new_joiners() {
    let (fanout, _pty_rx) = fanout_with_pty();
    fanout.broadcast(b"old session output");
    fanout.clear_replay();
    fanout.broadcast_control(ControlFrame::SessionRestarting {});

    let (_id, mut rx) = fanout.join();
    let frames = drain(&mut rx);
    // No replay payload: the buffer was cleared before new output arrived.
    assert_eq!(
        frames,
        vec![
            Frame::Control(ControlFrame::BufferSize { cols: 120, rows: 40 }),
            Frame::Control(ControlFrame::BufferComplete {}),
            Frame::Control(ControlFrame::ReadOnly { data: false }),
        ]
    );
}
