// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-PTY subscriber fanout.
//!
//! One fanout per PTY session: a replay buffer plus any number of
//! subscribers, each with a bounded outbound queue. The broadcast path takes
//! the lock briefly and enqueues without blocking; a full queue evicts the
//! subscriber rather than stalling the PTY. At most one subscriber holds the
//! writer role at any time.

use std::collections::HashMap;

use bytes::Bytes;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::error::ErrorCode;
use crate::ring::ReplayBuffer;

use super::protocol::{ControlFrame, Frame};
use super::PtyInput;

pub type SubscriberId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Role {
    Writer,
    Reader,
}

struct Subscriber {
    tx: mpsc::Sender<Frame>,
    role: Role,
    dims: Option<(u16, u16)>,
    focused: bool,
    /// Until the client acknowledges the replay, live frames are queued
    /// here so replay and live bytes never interleave.
    ready: bool,
    pending: Vec<Frame>,
    /// Join order, for oldest-subscriber writer succession.
    joined_seq: u64,
}

struct Inner {
    ring: ReplayBuffer,
    cols: u16,
    rows: u16,
    subscribers: HashMap<SubscriberId, Subscriber>,
    writer: Option<SubscriberId>,
    next_id: u64,
}

/// Fan-out hub for one PTY session.
pub struct Fanout {
    inner: Mutex<Inner>,
    pty_tx: mpsc::Sender<PtyInput>,
    queue_capacity: usize,
}

impl Fanout {
    pub fn new(cols: u16, rows: u16, queue_capacity: usize, pty_tx: mpsc::Sender<PtyInput>) -> Self {
        Self {
            inner: Mutex::new(Inner {
                ring: ReplayBuffer::for_geometry(cols, rows),
                cols,
                rows,
                subscribers: HashMap::new(),
                writer: None,
                next_id: 0,
            }),
            pty_tx,
            queue_capacity: queue_capacity.max(8),
        }
    }

    /// Register a subscriber and queue its join burst.
    ///
    /// The burst is `buffer-size`, the replay payload, `buffer-complete`,
    /// then the subscriber's role. Live frames queue behind it until the
    /// client sends `ready`. The first subscriber becomes the writer.
    pub fn join(&self) -> (SubscriberId, mpsc::Receiver<Frame>) {
        let mut inner = self.inner.lock();
        let id = inner.next_id;
        inner.next_id += 1;

        let role = if inner.writer.is_none() {
            inner.writer = Some(id);
            Role::Writer
        } else {
            Role::Reader
        };

        let (tx, rx) = mpsc::channel(self.queue_capacity);

        // A fresh queue always has room for the join burst.
        let _ = tx.try_send(Frame::Control(ControlFrame::BufferSize {
            cols: inner.cols,
            rows: inner.rows,
        }));
        let replay = inner.ring.latest();
        if !replay.is_empty() {
            let _ = tx.try_send(Frame::Output(Bytes::from(replay)));
        }
        let _ = tx.try_send(Frame::Control(ControlFrame::BufferComplete {}));
        let _ = tx.try_send(Frame::Control(ControlFrame::ReadOnly {
            data: role == Role::Reader,
        }));

        inner.subscribers.insert(
            id,
            Subscriber {
                tx,
                role,
                dims: None,
                focused: false,
                ready: false,
                pending: Vec::new(),
                joined_seq: id,
            },
        );
        debug!(subscriber = id, ?role, "pty subscriber joined");
        (id, rx)
    }

    /// The client consumed the replay burst; release queued live frames.
    pub fn mark_ready(&self, id: SubscriberId) {
        let mut inner = self.inner.lock();
        let Some(sub) = inner.subscribers.get_mut(&id) else {
            return;
        };
        sub.ready = true;
        let pending = std::mem::take(&mut sub.pending);
        let mut overflowed = false;
        for frame in pending {
            if sub.tx.try_send(frame).is_err() {
                overflowed = true;
                break;
            }
        }
        if overflowed {
            inner.evict(id, ErrorCode::Backpressure, "outbound queue overflow");
        }
    }

    /// Append PTY output to the replay buffer and enqueue it to every
    /// subscriber. Slow subscribers are evicted, never waited on.
    pub fn broadcast(&self, data: &[u8]) {
        let mut inner = self.inner.lock();
        inner.ring.write(data);
        let bytes = Bytes::copy_from_slice(data);
        inner.enqueue_all(Frame::Output(bytes), self.queue_capacity);
    }

    /// Enqueue a control frame to every subscriber.
    pub fn broadcast_control(&self, frame: ControlFrame) {
        let mut inner = self.inner.lock();
        inner.enqueue_all(Frame::Control(frame), self.queue_capacity);
    }

    /// Clear the replay buffer (session restart).
    pub fn clear_replay(&self) {
        self.inner.lock().ring.clear();
    }

    /// Keystrokes from a subscriber. Only the writer's input reaches the
    /// PTY; reader keystrokes are dropped with a `read-only` reminder.
    pub async fn input(&self, id: SubscriberId, data: Bytes) {
        let is_writer = {
            let inner = self.inner.lock();
            match inner.subscribers.get(&id) {
                Some(sub) if sub.role == Role::Writer => true,
                Some(sub) => {
                    let _ = sub
                        .tx
                        .try_send(Frame::Control(ControlFrame::ReadOnly { data: true }));
                    false
                }
                None => false,
            }
        };
        if is_writer {
            let _ = self.pty_tx.send(PtyInput::Write(data)).await;
        }
    }

    /// A subscriber reported a new terminal size.
    pub async fn resize(&self, id: SubscriberId, cols: u16, rows: u16) {
        if cols == 0 || rows == 0 {
            return;
        }
        let applied = {
            let mut inner = self.inner.lock();
            match inner.subscribers.get_mut(&id) {
                Some(sub) => sub.dims = Some((cols, rows)),
                None => return,
            }
            inner.apply_geometry(self.queue_capacity)
        };
        if let Some((cols, rows)) = applied {
            let _ = self.pty_tx.send(PtyInput::Resize { cols, rows }).await;
        }
    }

    /// A subscriber's focus changed; focused subscribers win arbitration.
    pub async fn focus(&self, id: SubscriberId, focused: bool) {
        let applied = {
            let mut inner = self.inner.lock();
            match inner.subscribers.get_mut(&id) {
                Some(sub) => sub.focused = focused,
                None => return,
            }
            inner.apply_geometry(self.queue_capacity)
        };
        if let Some((cols, rows)) = applied {
            let _ = self.pty_tx.send(PtyInput::Resize { cols, rows }).await;
        }
    }

    /// Transfer the writer role to `id`. The previous writer is demoted
    /// atomically with the elevation; both sides are notified.
    pub fn promote(&self, id: SubscriberId) {
        let mut inner = self.inner.lock();
        if inner.writer == Some(id) || !inner.subscribers.contains_key(&id) {
            return;
        }

        if let Some(old_id) = inner.writer {
            if let Some(old) = inner.subscribers.get_mut(&old_id) {
                old.role = Role::Reader;
                let _ = old
                    .tx
                    .try_send(Frame::Control(ControlFrame::ReadOnly { data: true }));
            }
        }

        inner.writer = Some(id);
        if let Some(new) = inner.subscribers.get_mut(&id) {
            new.role = Role::Writer;
            let _ = new
                .tx
                .try_send(Frame::Control(ControlFrame::ReadOnly { data: false }));
        }
        debug!(subscriber = id, "writer promoted");
    }

    /// Remove a subscriber. Returns `true` when none remain.
    pub fn leave(&self, id: SubscriberId) -> bool {
        let mut inner = self.inner.lock();
        inner.subscribers.remove(&id);
        if inner.writer == Some(id) {
            inner.writer = None;
            inner.promote_oldest();
        }
        inner.subscribers.is_empty()
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.lock().subscribers.len()
    }

    pub fn writer_id(&self) -> Option<SubscriberId> {
        self.inner.lock().writer
    }

    /// Current effective terminal geometry.
    pub fn geometry(&self) -> (u16, u16) {
        let inner = self.inner.lock();
        (inner.cols, inner.rows)
    }

    /// Total bytes ever broadcast through this session.
    pub fn bytes_emitted(&self) -> u64 {
        self.inner.lock().ring.total_written()
    }
}

impl Inner {
    /// Queue one frame to every subscriber, evicting queues that overflow.
    fn enqueue_all(&mut self, frame: Frame, queue_capacity: usize) {
        let mut evicted: Vec<SubscriberId> = Vec::new();
        for (id, sub) in self.subscribers.iter_mut() {
            if !sub.ready {
                if sub.pending.len() >= queue_capacity {
                    evicted.push(*id);
                } else {
                    sub.pending.push(frame.clone());
                }
                continue;
            }
            if sub.tx.try_send(frame.clone()).is_err() {
                evicted.push(*id);
            }
        }
        for id in evicted {
            self.evict(id, ErrorCode::Backpressure, "outbound queue overflow");
        }
    }

    /// Drop a subscriber, attempting a final fatal frame. The frame is
    /// best-effort: a queue that overflowed has no room left, and the
    /// closed channel itself terminates the transport.
    fn evict(&mut self, id: SubscriberId, code: ErrorCode, message: &str) {
        if let Some(sub) = self.subscribers.remove(&id) {
            let _ = sub.tx.try_send(Frame::Control(ControlFrame::error(code, message)));
            warn!(subscriber = id, code = %code, "pty subscriber evicted");
        }
        if self.writer == Some(id) {
            self.writer = None;
            self.promote_oldest();
        }
    }

    /// Give the writer role to the longest-connected subscriber, if any.
    fn promote_oldest(&mut self) {
        let oldest = self
            .subscribers
            .iter()
            .min_by_key(|(_, sub)| sub.joined_seq)
            .map(|(id, _)| *id);
        if let Some(id) = oldest {
            self.writer = Some(id);
            if let Some(sub) = self.subscribers.get_mut(&id) {
                sub.role = Role::Writer;
                let _ = sub
                    .tx
                    .try_send(Frame::Control(ControlFrame::ReadOnly { data: false }));
            }
        }
    }

    /// Recompute the effective geometry: the minimum-covering rectangle of
    /// focused subscribers, or of all subscribers when none are focused.
    /// Applies it to the replay buffer and announces it; the caller applies
    /// it to the PTY.
    fn apply_geometry(&mut self, queue_capacity: usize) -> Option<(u16, u16)> {
        let focused_any = self.subscribers.values().any(|s| s.focused && s.dims.is_some());
        let dims = self
            .subscribers
            .values()
            .filter(|s| !focused_any || s.focused)
            .filter_map(|s| s.dims);

        let (mut cols, mut rows) = (u16::MAX, u16::MAX);
        let mut any = false;
        for (c, r) in dims {
            cols = cols.min(c);
            rows = rows.min(r);
            any = true;
        }
        if !any || (cols, rows) == (self.cols, self.rows) {
            return None;
        }

        self.cols = cols;
        self.rows = rows;
        self.ring.reframe(cols, rows);
        self.enqueue_all(
            Frame::Control(ControlFrame::BufferSize { cols, rows }),
            queue_capacity,
        );
        Some((cols, rows))
    }
}

#[cfg(test)]
#[path = "fanout_tests.rs"]
mod tests;
