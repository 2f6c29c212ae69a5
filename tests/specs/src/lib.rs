// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fixtures for the end-to-end scenario tests: a session log builder that
//! writes the JSONL shapes the agent produces.

use std::io::Write;
use std::path::{Path, PathBuf};

use serde_json::{json, Value};

/// Builds a session log file line by line.
pub struct SessionLog {
    path: PathBuf,
}

impl SessionLog {
    /// Create (or truncate) the log at `path`.
    pub fn create(path: impl Into<PathBuf>) -> anyhow::Result<Self> {
        let path = path.into();
        std::fs::write(&path, "")?;
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append raw JSON values, one per line.
    pub fn append(&self, lines: &[Value]) -> anyhow::Result<()> {
        let mut file = std::fs::OpenOptions::new().append(true).open(&self.path)?;
        for line in lines {
            writeln!(file, "{line}")?;
        }
        file.flush()?;
        Ok(())
    }

    /// Rewrite the whole file (truncate-and-rewrite, as `/clear` does).
    pub fn rewrite(&self, lines: &[Value]) -> anyhow::Result<()> {
        let mut out = String::new();
        for line in lines {
            out.push_str(&line.to_string());
            out.push('\n');
        }
        std::fs::write(&self.path, out)?;
        Ok(())
    }
}

/// Timestamp helper: seconds after a fixed session start.
pub fn at(secs: u32) -> String {
    format!("2026-03-01T10:{:02}:{:02}.000Z", secs / 60, secs % 60)
}

pub fn user(uuid: &str, text: &str, secs: u32) -> Value {
    json!({
        "type": "user", "uuid": uuid,
        "timestamp": at(secs),
        "message": { "role": "user", "content": text }
    })
}

pub fn assistant_text(uuid: &str, parent: &str, text: &str, secs: u32) -> Value {
    json!({
        "type": "assistant", "uuid": uuid, "parentUuid": parent,
        "timestamp": at(secs),
        "message": {
            "role": "assistant",
            "content": [{ "type": "text", "text": text }]
        }
    })
}

pub fn assistant_tool(uuid: &str, parent: &str, tool: &str, secs: u32) -> Value {
    json!({
        "type": "assistant", "uuid": uuid, "parentUuid": parent,
        "timestamp": at(secs),
        "message": {
            "role": "assistant",
            "content": [{ "type": "tool_use", "id": format!("t-{uuid}"), "name": tool, "input": {} }]
        }
    })
}

pub fn assistant_usage(uuid: &str, parent: &str, usage: Value, secs: u32) -> Value {
    json!({
        "type": "assistant", "uuid": uuid, "parentUuid": parent,
        "timestamp": at(secs),
        "message": { "role": "assistant", "content": [], "usage": usage }
    })
}

pub fn sidechain_user(uuid: &str, text: &str, secs: u32) -> Value {
    json!({
        "type": "user", "uuid": uuid, "isSidechain": true,
        "timestamp": at(secs),
        "message": { "role": "user", "content": text }
    })
}

pub fn sidechain_assistant(uuid: &str, parent: &str, text: &str, secs: u32) -> Value {
    json!({
        "type": "assistant", "uuid": uuid, "parentUuid": parent, "isSidechain": true,
        "timestamp": at(secs),
        "message": {
            "role": "assistant",
            "content": [{ "type": "text", "text": text }]
        }
    })
}
