// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Workspace discovery from the agent's on-disk session logs.
//!
//! The agent keeps one directory per workspace under
//! `<state dir>/projects/`, each holding the workspace's `.jsonl` session
//! logs. The scanner walks that tree, picks the most recent log per
//! workspace, and keeps the registry in sync: new workspaces are tracked,
//! a newer log replaces the old reader, and vanished workspaces are
//! removed.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::registry::SessionRegistry;

/// A workspace found on disk, with its active session log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredWorkspace {
    pub name: String,
    pub session_log: PathBuf,
}

/// The most recently modified `.jsonl` file in a directory.
pub fn latest_session_log(dir: &Path) -> Option<PathBuf> {
    let entries = std::fs::read_dir(dir).ok()?;

    let mut best: Option<(PathBuf, std::time::SystemTime)> = None;
    for entry in entries.flatten() {
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("jsonl") {
            continue;
        }
        let Ok(modified) = entry.metadata().and_then(|m| m.modified()) else {
            continue;
        };
        if best.as_ref().is_none_or(|(_, prev)| modified > *prev) {
            best = Some((path, modified));
        }
    }
    best.map(|(path, _)| path)
}

/// Scan the projects directory for workspaces with session logs.
///
/// Each subdirectory is one workspace, named after the directory; a
/// workspace without any `.jsonl` file is skipped. A missing projects
/// directory yields an empty result.
pub fn discover_workspaces(projects_dir: &Path) -> Vec<DiscoveredWorkspace> {
    let Ok(entries) = std::fs::read_dir(projects_dir) else {
        return Vec::new();
    };

    let mut found = Vec::new();
    for entry in entries.flatten() {
        let path = entry.path();
        if !path.is_dir() {
            continue;
        }
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if let Some(session_log) = latest_session_log(&path) {
            found.push(DiscoveredWorkspace { name: name.to_owned(), session_log });
        }
    }
    found.sort_by(|a, b| a.name.cmp(&b.name));
    found
}

/// Keeps the session registry in sync with the on-disk workspace set.
pub struct WorkspaceScanner {
    projects_dir: PathBuf,
    registry: Arc<SessionRegistry>,
    scan_interval: Duration,
}

impl WorkspaceScanner {
    pub fn new(projects_dir: impl Into<PathBuf>, registry: Arc<SessionRegistry>) -> Self {
        Self {
            projects_dir: projects_dir.into(),
            registry,
            scan_interval: Duration::from_secs(5),
        }
    }

    pub fn with_scan_interval(mut self, interval: Duration) -> Self {
        self.scan_interval = interval;
        self
    }

    /// One pass: track everything found, drop everything that vanished.
    pub async fn sync(&self) {
        let found = discover_workspaces(&self.projects_dir);

        for workspace in &found {
            self.registry.track(&workspace.name, &workspace.session_log).await;
        }

        for tracked in self.registry.workspaces().await {
            if !found.iter().any(|w| w.name == tracked) {
                debug!(workspace = %tracked, "workspace directory gone, dropping reader");
                self.registry.remove(&tracked).await;
            }
        }
    }

    /// Rescan on an interval until the `shutdown` token is cancelled.
    ///
    /// The first tick fires immediately, so readers exist as soon as the
    /// server starts answering queries.
    pub async fn run(self, shutdown: CancellationToken) {
        let mut interval = tokio::time::interval(self.scan_interval);
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = interval.tick() => {}
            }
            self.sync().await;
        }
    }
}

#[cfg(test)]
#[path = "discover_tests.rs"]
mod tests;
