// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! WebSocket endpoint for the PTY subscriber protocol.
//!
//! Terminal bytes travel as binary frames; control messages are JSON text
//! frames. Inbound text that does not parse as a control frame is treated
//! as keystrokes.

use std::path::PathBuf;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{Query, State, WebSocketUpgrade};
use axum::response::IntoResponse;
use bytes::Bytes;
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use tracing::debug;

use crate::pty::protocol::{parse_client_frame, ClientFrame, ControlFrame, Frame};
use crate::pty::{SessionKey, SubscriberHandle};

use super::Store;

/// Query parameters for `GET /ws/pty`.
#[derive(Debug, Deserialize)]
pub struct PtyQuery {
    /// Workspace name (the session scope).
    pub session: String,
    /// Terminal slot within the workspace (default `"default"`).
    pub terminal: Option<String>,
    /// Workspace path; must match the session's recorded path.
    pub path: String,
    /// Agent entry point; present selects an agent session.
    pub agent: Option<String>,
}

/// WebSocket upgrade handler for `/ws/pty`.
pub async fn pty_ws_handler(
    State(state): State<Arc<Store>>,
    Query(query): Query<PtyQuery>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_pty_connection(state, query, socket))
}

/// Per-connection pump between the websocket and the subscriber fanout.
async fn handle_pty_connection(state: Arc<Store>, query: PtyQuery, socket: WebSocket) {
    state.lifecycle.ws_client_count.fetch_add(1, Ordering::Relaxed);
    let (mut ws_tx, mut ws_rx) = socket.split();

    let key = SessionKey::new(query.session, query.terminal.as_deref());
    let workspace_path = PathBuf::from(&query.path);

    let mut handle: SubscriberHandle = match state
        .pty
        .subscribe(key, &workspace_path, query.agent.as_deref())
        .await
    {
        Ok(handle) => handle,
        Err(code) => {
            // The mismatch frame is fatal: retryable=false disables
            // client reconnection.
            let frame =
                ControlFrame::error(code, "workspace path does not match session");
            let _ = send_control(&mut ws_tx, &frame).await;
            let _ = ws_tx.close().await;
            state.lifecycle.ws_client_count.fetch_sub(1, Ordering::Relaxed);
            return;
        }
    };

    loop {
        tokio::select! {
            _ = state.lifecycle.shutdown.cancelled() => break,

            frame = handle.rx.recv() => {
                match frame {
                    Some(Frame::Output(data)) => {
                        if ws_tx.send(Message::Binary(data)).await.is_err() {
                            break;
                        }
                    }
                    Some(Frame::Control(frame)) => {
                        let closing = matches!(frame, ControlFrame::Error { .. });
                        if send_control(&mut ws_tx, &frame).await.is_err() {
                            break;
                        }
                        // Error frames accompany eviction or teardown; the
                        // stream ends with them.
                        if closing {
                            break;
                        }
                    }
                    // Evicted, or the session was reclaimed.
                    None => break,
                }
            }

            msg = ws_rx.next() => {
                let msg = match msg {
                    Some(Ok(m)) => m,
                    Some(Err(_)) | None => break,
                };
                match msg {
                    Message::Text(text) => match parse_client_frame(&text) {
                        Some(ClientFrame::Ready {}) => handle.ready(),
                        Some(ClientFrame::Resize { cols, rows }) => {
                            handle.resize(cols, rows).await;
                        }
                        Some(ClientFrame::Focus { focused }) => {
                            handle.focus(focused).await;
                        }
                        Some(ClientFrame::Promote {}) => handle.promote(),
                        None => {
                            handle
                                .input(Bytes::copy_from_slice(text.as_bytes()))
                                .await;
                        }
                    },
                    Message::Binary(data) => handle.input(data).await,
                    Message::Close(_) => break,
                    _ => {}
                }
            }
        }
    }

    debug!("pty subscriber disconnected");
    handle.leave();
    let _ = ws_tx.close().await;
    state.lifecycle.ws_client_count.fetch_sub(1, Ordering::Relaxed);
}

/// Send a control frame as a JSON text message.
async fn send_control<S>(tx: &mut S, frame: &ControlFrame) -> Result<(), ()>
where
    S: SinkExt<Message> + Unpin,
{
    let text = match serde_json::to_string(frame) {
        Ok(t) => t,
        Err(_) => return Err(()),
    };
    tx.send(Message::Text(text.into())).await.map_err(|_| ())
}
