// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! API contract types and server implementation for the HTTP and WebSocket
//! transports.

pub mod http;
pub mod state;
pub mod ws;

pub use state::Store;

use std::sync::Arc;

use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;

use crate::error::ErrorCode;

/// Top-level error response envelope shared across HTTP endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorBody,
}

/// Error body containing a machine-readable code and human-readable message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

impl ErrorCode {
    /// Convert this error code into an axum JSON error response.
    pub fn to_http_response(
        &self,
        message: impl Into<String>,
    ) -> (StatusCode, Json<ErrorResponse>) {
        let status =
            StatusCode::from_u16(self.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let body = ErrorResponse {
            error: ErrorBody { code: self.as_str().to_owned(), message: message.into() },
        };
        (status, Json(body))
    }
}

/// Build the axum `Router` with all HTTP and WebSocket routes.
pub fn build_router(state: Arc<Store>) -> Router {
    Router::new()
        .route("/api/v1/health", get(http::health))
        .route("/api/v1/workspaces", get(http::list_workspaces))
        .route("/api/v1/workspaces/{workspace}/summary", get(http::workspace_summary))
        .route("/api/v1/workspaces/{workspace}/todos", get(http::workspace_todos))
        .route("/api/v1/workspaces/{workspace}/stats", get(http::workspace_stats))
        .route("/api/v1/workspaces/{workspace}/latest", get(http::workspace_latest))
        .route("/api/v1/workspaces/{workspace}/thinking", get(http::workspace_thinking))
        .route("/api/v1/workspaces/{workspace}/agents", get(http::workspace_agents))
        .route("/api/v1/workspaces/{workspace}/messages", get(http::workspace_messages))
        .route("/api/v1/history", get(http::prompt_history))
        .route("/api/v1/git/status", get(http::git_status))
        .route("/api/v1/pty", get(http::pty_sessions))
        .route("/api/v1/pty/{workspace}/{terminal}/restart", post(http::pty_restart))
        .route("/ws/pty", get(ws::pty_ws_handler))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
