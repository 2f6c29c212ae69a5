// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Prompt history, merged from two on-disk formats.
//!
//! The preferred format is an append-log (`history.jsonl`, one JSON object
//! per line with `project` scoping). Older installs keep a single JSON
//! document keyed by workspace path. The append-log wins whenever it yields
//! any entries for the queried path; otherwise we fall back to the legacy
//! document. Path lookups trim trailing slashes on both sides.

use std::io::{BufRead, BufReader};
use std::path::PathBuf;

use serde::Serialize;
use serde_json::Value;
use tracing::debug;

/// One prompt previously submitted for a workspace.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub display: String,
    #[serde(skip_serializing_if = "Value::is_null")]
    pub pasted_contents: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

/// Reads prompt history for workspaces.
pub struct HistoryReader {
    /// Append-log path (preferred format).
    log_path: PathBuf,
    /// Legacy single-document path.
    legacy_path: PathBuf,
}

impl HistoryReader {
    pub fn new(log_path: impl Into<PathBuf>, legacy_path: impl Into<PathBuf>) -> Self {
        Self { log_path: log_path.into(), legacy_path: legacy_path.into() }
    }

    /// All history entries for a workspace path, oldest first.
    ///
    /// Missing files yield an empty result, never an error.
    pub fn entries_for(&self, workspace_path: &str) -> Vec<HistoryEntry> {
        let wanted = trim_path(workspace_path);

        let from_log = self.read_append_log(wanted);
        if !from_log.is_empty() {
            return from_log;
        }
        self.read_legacy(wanted)
    }

    fn read_append_log(&self, wanted: &str) -> Vec<HistoryEntry> {
        let file = match std::fs::File::open(&self.log_path) {
            Ok(f) => f,
            Err(_) => return Vec::new(),
        };

        let mut entries = Vec::new();
        for line in BufReader::new(file).lines() {
            let Ok(line) = line else { break };
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            let Ok(json) = serde_json::from_str::<Value>(trimmed) else {
                debug!(path = %self.log_path.display(), "skipping malformed history line");
                continue;
            };
            let project = json.get("project").and_then(|v| v.as_str()).unwrap_or_default();
            if trim_path(project) != wanted {
                continue;
            }
            if let Some(entry) = decode_entry(&json) {
                entries.push(entry);
            }
        }
        entries
    }

    fn read_legacy(&self, wanted: &str) -> Vec<HistoryEntry> {
        let Ok(raw) = std::fs::read_to_string(&self.legacy_path) else {
            return Vec::new();
        };
        let Ok(doc) = serde_json::from_str::<Value>(&raw) else {
            return Vec::new();
        };
        let Some(map) = doc.as_object() else {
            return Vec::new();
        };

        let Some(history) = map
            .iter()
            .find(|(key, _)| trim_path(key) == wanted)
            .and_then(|(_, v)| v.get("history"))
            .and_then(|h| h.as_array())
        else {
            return Vec::new();
        };

        history.iter().filter_map(decode_entry).collect()
    }
}

fn decode_entry(json: &Value) -> Option<HistoryEntry> {
    let display = json.get("display").and_then(|v| v.as_str())?;
    Some(HistoryEntry {
        display: display.to_owned(),
        pasted_contents: json.get("pastedContents").cloned().unwrap_or(Value::Null),
        project: json.get("project").and_then(|v| v.as_str()).map(str::to_owned),
        session_id: json.get("sessionId").and_then(|v| v.as_str()).map(str::to_owned),
        timestamp: json.get("timestamp").and_then(|v| v.as_str()).map(str::to_owned),
    })
}

fn trim_path(path: &str) -> &str {
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        "/"
    } else {
        trimmed
    }
}

#[cfg(test)]
#[path = "history_tests.rs"]
mod tests;
