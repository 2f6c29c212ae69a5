// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! HTTP snapshot endpoints over the session registry and PTY manager.

use std::sync::atomic::Ordering;
use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use serde_json::json;

use crate::error::ErrorCode;
use crate::pty::SessionKey;
use crate::session::MessageFilter;

use super::Store;

/// `GET /api/v1/health`
pub async fn health(State(state): State<Arc<Store>>) -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "uptime_secs": state.lifecycle.started_at.elapsed().as_secs(),
        "ws_clients": state.lifecycle.ws_client_count.load(Ordering::Relaxed),
        "pty_sessions": state.pty.session_count().await,
    }))
}

/// `GET /api/v1/workspaces`
pub async fn list_workspaces(State(state): State<Arc<Store>>) -> impl IntoResponse {
    Json(state.registry.workspaces().await)
}

/// `GET /api/v1/workspaces/{workspace}/summary`
pub async fn workspace_summary(
    State(state): State<Arc<Store>>,
    Path(workspace): Path<String>,
) -> axum::response::Response {
    match state.registry.summary(&workspace).await {
        Some(summary) => Json(summary).into_response(),
        None => unknown_workspace(&workspace),
    }
}

/// `GET /api/v1/workspaces/{workspace}/todos`
pub async fn workspace_todos(
    State(state): State<Arc<Store>>,
    Path(workspace): Path<String>,
) -> axum::response::Response {
    match state.registry.todos(&workspace).await {
        Some(todos) => Json(todos).into_response(),
        None => unknown_workspace(&workspace),
    }
}

/// `GET /api/v1/workspaces/{workspace}/stats`
pub async fn workspace_stats(
    State(state): State<Arc<Store>>,
    Path(workspace): Path<String>,
) -> axum::response::Response {
    match state.registry.stats(&workspace).await {
        Some(stats) => Json(stats).into_response(),
        None => unknown_workspace(&workspace),
    }
}

/// `GET /api/v1/workspaces/{workspace}/latest`
pub async fn workspace_latest(
    State(state): State<Arc<Store>>,
    Path(workspace): Path<String>,
) -> axum::response::Response {
    match state.registry.summary(&workspace).await {
        Some(summary) => Json(json!({
            "latest_message": summary.latest_message,
            "latest_thought": summary.latest_thought,
        }))
        .into_response(),
        None => unknown_workspace(&workspace),
    }
}

/// `GET /api/v1/workspaces/{workspace}/thinking`
pub async fn workspace_thinking(
    State(state): State<Arc<Store>>,
    Path(workspace): Path<String>,
) -> axum::response::Response {
    match state.registry.thinking_overview(&workspace).await {
        Some(blocks) => Json(blocks).into_response(),
        None => unknown_workspace(&workspace),
    }
}

/// `GET /api/v1/workspaces/{workspace}/agents`
pub async fn workspace_agents(
    State(state): State<Arc<Store>>,
    Path(workspace): Path<String>,
) -> axum::response::Response {
    match state.registry.sub_agents(&workspace).await {
        Some(agents) => Json(agents).into_response(),
        None => unknown_workspace(&workspace),
    }
}

/// Filter knobs for the full-file message scan. Omitted flags fall back to
/// the default filter (skip warmup and automated, keep the rest).
#[derive(Debug, Deserialize)]
pub struct MessagesQuery {
    pub skip_warmup: Option<bool>,
    pub skip_automated: Option<bool>,
    pub skip_sidechain: Option<bool>,
    pub skip_errors: Option<bool>,
    pub only_type: Option<crate::session::MessageKind>,
    pub only_content_type: Option<String>,
}

impl MessagesQuery {
    fn filter(&self) -> MessageFilter {
        let defaults = MessageFilter::default_filter();
        MessageFilter {
            skip_warmup: self.skip_warmup.unwrap_or(defaults.skip_warmup),
            skip_automated: self.skip_automated.unwrap_or(defaults.skip_automated),
            skip_sidechain: self.skip_sidechain.unwrap_or(defaults.skip_sidechain),
            skip_errors: self.skip_errors.unwrap_or(defaults.skip_errors),
            only_kind: self.only_type,
            only_content_type: self.only_content_type.clone(),
        }
    }
}

/// `GET /api/v1/workspaces/{workspace}/messages`
pub async fn workspace_messages(
    State(state): State<Arc<Store>>,
    Path(workspace): Path<String>,
    Query(query): Query<MessagesQuery>,
) -> axum::response::Response {
    match state.registry.messages(&workspace, &query.filter()).await {
        Ok(Some(messages)) => Json(messages).into_response(),
        Ok(None) => unknown_workspace(&workspace),
        Err(e) => ErrorCode::Io
            .to_http_response(format!("session log read failed: {e}"))
            .into_response(),
    }
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub path: String,
}

/// `GET /api/v1/history?path=<workspace path>`
pub async fn prompt_history(
    State(state): State<Arc<Store>>,
    Query(query): Query<HistoryQuery>,
) -> impl IntoResponse {
    Json(state.registry.prompt_history(&query.path))
}

/// `GET /api/v1/pty`
pub async fn pty_sessions(State(state): State<Arc<Store>>) -> impl IntoResponse {
    Json(state.pty.sessions_snapshot().await)
}

/// `POST /api/v1/pty/{workspace}/{terminal}/restart`
pub async fn pty_restart(
    State(state): State<Arc<Store>>,
    Path((workspace, terminal)): Path<(String, String)>,
) -> axum::response::Response {
    let key = SessionKey::new(workspace, Some(&terminal));
    if state.pty.restart(&key).await {
        Json(json!({ "restarting": true })).into_response()
    } else {
        ErrorCode::NotFound
            .to_http_response(format!("no pty session for {key}"))
            .into_response()
    }
}

#[derive(Debug, Deserialize)]
pub struct GitStatusQuery {
    /// Workspace name used for event scoping.
    pub workspace: String,
    /// Repository path to inspect.
    pub path: String,
}

/// `GET /api/v1/git/status?workspace=<name>&path=<repo>`
///
/// Dirty files and branch divergence for a worktree, computed through the
/// git façade. Publishes `diff-stats-updated` as a side effect.
pub async fn git_status(
    State(state): State<Arc<Store>>,
    Query(query): Query<GitStatusQuery>,
) -> axum::response::Response {
    let dir = std::path::PathBuf::from(&query.path);

    let branch = match state.git.execute(&dir, &["branch", "--show-current"]).await {
        Ok(out) => String::from_utf8_lossy(&out).trim().to_owned(),
        Err(e) => return git_error_response(e),
    };
    let porcelain = match state.git.execute(&dir, &["status", "--porcelain"]).await {
        Ok(out) => out,
        Err(e) => return git_error_response(e),
    };
    let numstat = match state.git.execute(&dir, &["diff", "--numstat"]).await {
        Ok(out) => out,
        Err(e) => return git_error_response(e),
    };

    let dirty_files: Vec<String> = String::from_utf8_lossy(&porcelain)
        .lines()
        .filter(|line| line.len() > 3)
        .map(|line| line[3..].to_owned())
        .collect();

    let (mut additions, mut deletions) = (0u64, 0u64);
    for line in String::from_utf8_lossy(&numstat).lines() {
        let mut fields = line.split('\t');
        // Binary files report "-"; they contribute no line counts.
        additions += fields.next().and_then(|f| f.parse::<u64>().ok()).unwrap_or(0);
        deletions += fields.next().and_then(|f| f.parse::<u64>().ok()).unwrap_or(0);
    }

    state.events.publish(
        &query.workspace,
        crate::events::WorkspaceEvent::DiffStatsUpdated {
            files_changed: dirty_files.len() as u64,
            additions,
            deletions,
        },
    );

    Json(json!({
        "branch": branch,
        "dirty_files": dirty_files,
        "additions": additions,
        "deletions": deletions,
    }))
    .into_response()
}

fn git_error_response(e: crate::git::GitError) -> axum::response::Response {
    let code = match e {
        crate::git::GitError::Timeout { .. } => ErrorCode::Timeout,
        _ => ErrorCode::GitFailed,
    };
    code.to_http_response(e.to_string()).into_response()
}

fn unknown_workspace(workspace: &str) -> axum::response::Response {
    ErrorCode::NotFound
        .to_http_response(format!("unknown workspace: {workspace}"))
        .into_response()
}
