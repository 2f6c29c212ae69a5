// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Inband control frames of the PTY subscriber protocol.
//!
//! Control frames are JSON objects with a recognized `type` field, carried
//! as text; terminal bytes travel as opaque binary. Inbound text that does
//! not parse as a control frame is terminal input.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::error::ErrorCode;

/// Server → client control frames.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ControlFrame {
    /// Start of the buffer replay; the client must resize its terminal.
    BufferSize { cols: u16, rows: u16 },
    /// End of the buffer replay; subsequent bytes are live.
    BufferComplete {},
    /// This client's writer status.
    ReadOnly { data: bool },
    /// The backend is restarting the child; clients should clear their
    /// display.
    SessionRestarting {},
    /// Fatal or retryable failure. `retryable: false` disables reconnection.
    Error {
        error: String,
        message: String,
        retryable: bool,
    },
}

impl ControlFrame {
    /// Build an `error` frame from a typed error code.
    pub fn error(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::Error {
            error: code.as_str().to_owned(),
            message: message.into(),
            retryable: code.retryable(),
        }
    }
}

/// Client → server control frames.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ClientFrame {
    /// The client has consumed the replay; release the live stream.
    Ready {},
    /// The subscriber's terminal size changed.
    Resize { cols: u16, rows: u16 },
    /// Whether the client's terminal view is focused.
    Focus { focused: bool },
    /// Request the writer role.
    Promote {},
}

/// Parse inbound text as a control frame; anything else is terminal input.
pub fn parse_client_frame(text: &str) -> Option<ClientFrame> {
    serde_json::from_str(text).ok()
}

/// One unit queued toward a subscriber: terminal bytes or a control frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    Output(Bytes),
    Control(ControlFrame),
}

#[cfg(test)]
#[path = "protocol_tests.rs"]
mod tests;
