// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Workspace state-change events, published fire-and-forget.
//!
//! The core writes to this bus whenever observable workspace state moves;
//! transports bridge it out (SSE, websockets). Delivery is best-effort: a
//! publish with no subscribers, or with lagged subscribers, is not an error
//! and is never awaited.

use serde::Serialize;
use tokio::sync::broadcast;

/// State changes observable per workspace.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum WorkspaceEvent {
    DiffStatsUpdated {
        files_changed: u64,
        additions: u64,
        deletions: u64,
    },
    PrStatusUpdated {
        #[serde(skip_serializing_if = "Option::is_none")]
        number: Option<u64>,
        state: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        url: Option<String>,
    },
    WorktreeAdded {
        branch: String,
    },
    WorktreeRemoved {},
    WorktreeUpdated {},
    ConflictDetected {
        files: Vec<String>,
    },
    SessionStarted {},
    SessionRestarted {},
    /// New entries were appended to the workspace's session log.
    SessionUpdated {
        message_count: u64,
    },
}

/// A published event, scoped to its workspace.
#[derive(Debug, Clone, Serialize)]
pub struct EventEnvelope {
    pub workspace: String,
    #[serde(flatten)]
    pub event: WorkspaceEvent,
}

/// Fire-and-forget event bus.
#[derive(Debug, Clone)]
pub struct EventPublisher {
    tx: broadcast::Sender<EventEnvelope>,
}

impl Default for EventPublisher {
    fn default() -> Self {
        Self::new()
    }
}

impl EventPublisher {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(256);
        Self { tx }
    }

    /// Publish an event for a workspace. Never blocks, never fails.
    pub fn publish(&self, workspace: &str, event: WorkspaceEvent) {
        let _ = self.tx.send(EventEnvelope { workspace: workspace.to_owned(), event });
    }

    /// Subscribe to all workspace events.
    pub fn subscribe(&self) -> broadcast::Receiver<EventEnvelope> {
        self.tx.subscribe()
    }
}

#[cfg(test)]
#[path = "events_tests.rs"]
mod tests;
