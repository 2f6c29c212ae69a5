// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::events::{EventPublisher, WorkspaceEvent};

use super::reader::SessionReader;

/// Drives a [`SessionReader`] as its session log grows.
///
/// Uses `notify` for filesystem events with a polling fallback, and
/// publishes a `session-updated` event for every non-empty batch.
pub struct LogWatcher {
    workspace: String,
    reader: Arc<SessionReader>,
    events: EventPublisher,
    poll_interval: Duration,
}

impl LogWatcher {
    pub fn new(workspace: impl Into<String>, reader: Arc<SessionReader>, events: EventPublisher) -> Self {
        Self {
            workspace: workspace.into(),
            reader,
            events,
            poll_interval: Duration::from_secs(5),
        }
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Watch until the `shutdown` token is cancelled.
    ///
    /// Read errors are logged and retried on the next tick; the watcher
    /// never gives up on a live workspace.
    pub async fn run(self, shutdown: CancellationToken) {
        let (wake_tx, mut wake_rx) = mpsc::channel::<()>(1);
        let _watcher = self.setup_notify_watcher(wake_tx);

        let mut poll_interval = tokio::time::interval(self.poll_interval);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = wake_rx.recv() => {}
                _ = poll_interval.tick() => {}
            }

            match self.reader.read_incremental() {
                Ok(batch) if !batch.is_empty() => {
                    self.events.publish(
                        &self.workspace,
                        WorkspaceEvent::SessionUpdated { message_count: batch.len() as u64 },
                    );
                }
                Ok(_) => {}
                Err(e) => {
                    warn!(workspace = %self.workspace, "session log read failed: {e:#}");
                }
            }
        }
    }

    /// Set up a `notify` watcher on the log file's parent directory.
    /// Returns the watcher handle (must be kept alive).
    fn setup_notify_watcher(
        &self,
        wake_tx: mpsc::Sender<()>,
    ) -> Option<notify::RecommendedWatcher> {
        use notify::{RecursiveMode, Watcher};

        let mut watcher = notify::recommended_watcher(move |_: notify::Result<notify::Event>| {
            let _ = wake_tx.try_send(());
        })
        .ok()?;

        // Watch the parent directory so we detect file creation too.
        let path = self.reader.path();
        let watch_path = path.parent().unwrap_or(path);
        watcher.watch(watch_path, RecursiveMode::NonRecursive).ok()?;

        Some(watcher)
    }
}

#[cfg(test)]
#[path = "watch_tests.rs"]
mod tests;
