// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! PTY session multiplexing: one long-lived pseudo-terminal per
//! `(workspace, terminal)` key, fanned out to any number of websocket
//! subscribers with a replay buffer, single-writer arbitration, and
//! restart-on-exit for agent sessions.

pub mod fanout;
pub mod manager;
pub mod native;
pub mod protocol;

use bytes::Bytes;
use serde::Serialize;

pub use fanout::Fanout;
pub use manager::{PtyManager, SubscriberHandle};
pub use native::NativePty;

/// Terminal id used when a client does not name one.
pub const DEFAULT_TERMINAL: &str = "default";

/// Identity of one PTY session: a workspace plus a terminal slot within it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct SessionKey {
    pub workspace: String,
    pub terminal: String,
}

impl SessionKey {
    pub fn new(workspace: impl Into<String>, terminal: Option<&str>) -> Self {
        Self {
            workspace: workspace.into(),
            terminal: terminal
                .filter(|t| !t.is_empty())
                .unwrap_or(DEFAULT_TERMINAL)
                .to_owned(),
        }
    }
}

impl std::fmt::Display for SessionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.workspace, self.terminal)
    }
}

/// Input delivered to the PTY loop.
#[derive(Debug, Clone)]
pub enum PtyInput {
    Write(Bytes),
    Resize { cols: u16, rows: u16 },
}

/// How the child process ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitStatus {
    pub code: Option<i32>,
    pub signal: Option<i32>,
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
