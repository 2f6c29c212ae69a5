// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use serde::{Deserialize, Serialize};
use std::fmt;

/// Unified error codes shared across the HTTP and WebSocket transports.
///
/// Each code maps to an HTTP status and carries a retryability hint for the
/// PTY protocol's `error` control frame: non-retryable errors disable client
/// reconnection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCode {
    NotFound,
    Io,
    AuthzMismatch,
    Backpressure,
    ChildExited,
    Timeout,
    GitFailed,
    BadRequest,
    Internal,
}

impl ErrorCode {
    pub fn http_status(&self) -> u16 {
        match self {
            Self::NotFound => 404,
            Self::Io => 500,
            Self::AuthzMismatch => 403,
            Self::Backpressure => 429,
            Self::ChildExited => 410,
            Self::Timeout => 504,
            Self::GitFailed => 502,
            Self::BadRequest => 400,
            Self::Internal => 500,
        }
    }

    /// Whether a client receiving this error over the PTY transport may
    /// reconnect and retry.
    pub fn retryable(&self) -> bool {
        match self {
            Self::AuthzMismatch | Self::Backpressure | Self::BadRequest => false,
            Self::NotFound
            | Self::Io
            | Self::ChildExited
            | Self::Timeout
            | Self::GitFailed
            | Self::Internal => true,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotFound => "NOT_FOUND",
            Self::Io => "IO",
            Self::AuthzMismatch => "AUTHZ_MISMATCH",
            Self::Backpressure => "BACKPRESSURE",
            Self::ChildExited => "CHILD_EXITED",
            Self::Timeout => "TIMEOUT",
            Self::GitFailed => "GIT_FAILED",
            Self::BadRequest => "BAD_REQUEST",
            Self::Internal => "INTERNAL",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
