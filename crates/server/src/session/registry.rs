// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-workspace session reader lifecycle.
//!
//! Maps a workspace to the reader for its active session log. Readers are
//! created lazily on first track, replaced when the workspace starts a new
//! session (different log path), and destroyed on workspace removal. Outer
//! layers only see snapshot copies, never the readers themselves.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::events::EventPublisher;

use super::extract::{ThinkingBlock, Todo};
use super::filter::MessageFilter;
use super::history::{HistoryEntry, HistoryReader};
use super::model::SessionMessage;
use super::reader::{SessionReader, SubAgentInfo};
use super::stats::SessionStats;
use super::watch::LogWatcher;

/// Everything a client needs to render a workspace's session at a glance.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkspaceSummary {
    pub workspace: String,
    pub session_log: PathBuf,
    pub todos: Vec<Todo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latest_message: Option<SessionMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latest_thought: Option<SessionMessage>,
    pub thinking: Vec<ThinkingBlock>,
    pub sub_agents: Vec<SubAgentInfo>,
    pub stats: SessionStats,
}

struct WorkspaceSession {
    reader: Arc<SessionReader>,
    watcher_shutdown: CancellationToken,
}

impl WorkspaceSession {
    fn stop(&self) {
        self.watcher_shutdown.cancel();
    }
}

/// Registry of active workspace readers.
pub struct SessionRegistry {
    events: EventPublisher,
    history: HistoryReader,
    poll_interval: Duration,
    inner: RwLock<HashMap<String, WorkspaceSession>>,
}

impl SessionRegistry {
    pub fn new(events: EventPublisher, history: HistoryReader) -> Self {
        Self {
            events,
            history,
            poll_interval: Duration::from_secs(5),
            inner: RwLock::new(HashMap::new()),
        }
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Ensure a reader exists for the workspace's active session log.
    ///
    /// A changed log path means a new session: the old reader and its
    /// watcher are dropped and a fresh reader starts from offset zero.
    pub async fn track(&self, workspace: &str, session_log: &Path) {
        let mut inner = self.inner.write().await;

        if let Some(existing) = inner.get(workspace) {
            if existing.reader.path() == session_log {
                return;
            }
            info!(workspace, "session log changed, resetting reader");
            existing.stop();
        }

        let reader = Arc::new(SessionReader::new(session_log));
        let shutdown = CancellationToken::new();
        let watcher =
            LogWatcher::new(workspace, Arc::clone(&reader), self.events.clone())
                .with_poll_interval(self.poll_interval);
        tokio::spawn(watcher.run(shutdown.clone()));

        inner.insert(
            workspace.to_owned(),
            WorkspaceSession { reader, watcher_shutdown: shutdown },
        );
    }

    /// Drop the workspace's reader and stop its watcher.
    pub async fn remove(&self, workspace: &str) {
        if let Some(session) = self.inner.write().await.remove(workspace) {
            session.stop();
            info!(workspace, "workspace removed from session registry");
        }
    }

    /// Names of all tracked workspaces.
    pub async fn workspaces(&self) -> Vec<String> {
        let mut names: Vec<String> = self.inner.read().await.keys().cloned().collect();
        names.sort();
        names
    }

    /// Full snapshot for one workspace, or `None` if untracked.
    pub async fn summary(&self, workspace: &str) -> Option<WorkspaceSummary> {
        let reader = self.reader(workspace).await?;
        Some(WorkspaceSummary {
            workspace: workspace.to_owned(),
            session_log: reader.path().to_path_buf(),
            todos: reader.todos(),
            latest_message: reader.latest_message(),
            latest_thought: reader.latest_thought(),
            thinking: reader.thinking_overview(),
            sub_agents: reader.sub_agents(),
            stats: reader.stats(),
        })
    }

    pub async fn stats(&self, workspace: &str) -> Option<SessionStats> {
        Some(self.reader(workspace).await?.stats())
    }

    pub async fn todos(&self, workspace: &str) -> Option<Vec<Todo>> {
        Some(self.reader(workspace).await?.todos())
    }

    pub async fn latest_message(&self, workspace: &str) -> Option<SessionMessage> {
        self.reader(workspace).await?.latest_message()
    }

    pub async fn latest_thought(&self, workspace: &str) -> Option<SessionMessage> {
        self.reader(workspace).await?.latest_thought()
    }

    pub async fn thinking_overview(&self, workspace: &str) -> Option<Vec<ThinkingBlock>> {
        Some(self.reader(workspace).await?.thinking_overview())
    }

    pub async fn sub_agents(&self, workspace: &str) -> Option<Vec<SubAgentInfo>> {
        Some(self.reader(workspace).await?.sub_agents())
    }

    /// Filtered full-file scan. `Ok(None)` means the workspace is untracked.
    pub async fn messages(
        &self,
        workspace: &str,
        filter: &MessageFilter,
    ) -> anyhow::Result<Option<Vec<SessionMessage>>> {
        match self.reader(workspace).await {
            Some(reader) => Ok(Some(reader.messages_matching(filter)?)),
            None => Ok(None),
        }
    }

    /// Prompt history for a workspace path (not gated on tracking).
    pub fn prompt_history(&self, workspace_path: &str) -> Vec<HistoryEntry> {
        self.history.entries_for(workspace_path)
    }

    async fn reader(&self, workspace: &str) -> Option<Arc<SessionReader>> {
        self.inner.read().await.get(workspace).map(|s| Arc::clone(&s.reader))
    }
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
