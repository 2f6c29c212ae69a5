// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Decoded form of one session log JSONL entry.
//!
//! The log schema is nominally fixed but evolves; every field except `type`
//! is optional and payload shapes vary. Decoding is defensive: unknown
//! `type` strings reject the line, everything else degrades to defaults.
//! Payload access goes through the extractors in [`super::extract`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Top-level classification of a session log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    User,
    Assistant,
    System,
    Error,
    Summary,
}

impl MessageKind {
    /// Parse the log file's `type` field.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "user" => Some(Self::User),
            "assistant" => Some(Self::Assistant),
            "system" => Some(Self::System),
            "error" => Some(Self::Error),
            "summary" => Some(Self::Summary),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
            Self::System => "system",
            Self::Error => "error",
            Self::Summary => "summary",
        }
    }
}

/// One decoded session log entry.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionMessage {
    #[serde(rename = "type")]
    pub kind: MessageKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subtype: Option<String>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub uuid: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub parent_uuid: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub session_id: String,
    /// Non-empty marks a sub-agent dispatch.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub agent_id: String,
    pub is_sidechain: bool,
    /// Absent or malformed RFC3339 timestamps decode to `None` (zero-time).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
    /// Untyped structured payload (`role`, `content`, `id`, `usage`).
    pub message: Value,
}

impl SessionMessage {
    /// Decode a single log line. Returns `None` for anything that is not a
    /// JSON object with a recognized `type` field; callers skip such lines.
    pub fn decode_line(line: &str) -> Option<Self> {
        let json: Value = serde_json::from_str(line).ok()?;
        Self::from_value(&json)
    }

    /// Decode an already-parsed JSON value.
    pub fn from_value(json: &Value) -> Option<Self> {
        let kind = MessageKind::parse(json.get("type")?.as_str()?)?;

        let timestamp = json
            .get("timestamp")
            .and_then(|v| v.as_str())
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|t| t.with_timezone(&Utc));

        Some(Self {
            kind,
            subtype: json.get("subtype").and_then(|v| v.as_str()).map(str::to_owned),
            uuid: str_field(json, "uuid"),
            parent_uuid: str_field(json, "parentUuid"),
            session_id: str_field(json, "sessionId"),
            agent_id: str_field(json, "agentId"),
            is_sidechain: json.get("isSidechain").and_then(|v| v.as_bool()).unwrap_or(false),
            timestamp,
            message: json.get("message").cloned().unwrap_or(Value::Null),
        })
    }

    /// The payload's `content` field, if any.
    pub fn content(&self) -> Option<&Value> {
        self.message.get("content")
    }

    /// The payload's `usage` field (present on API responses), if any.
    pub fn usage(&self) -> Option<&Value> {
        self.message.get("usage")
    }

    /// Whether this entry marks a conversation-compaction boundary.
    pub fn is_compact_boundary(&self) -> bool {
        self.kind == MessageKind::System && self.subtype.as_deref() == Some("compact_boundary")
    }

    /// Whether this entry is a sub-agent dispatch (sidechain with an agent id).
    pub fn is_sub_agent(&self) -> bool {
        self.is_sidechain && !self.agent_id.is_empty()
    }
}

fn str_field(json: &Value, key: &str) -> String {
    json.get(key).and_then(|v| v.as_str()).unwrap_or_default().to_owned()
}

#[cfg(test)]
#[path = "model_tests.rs"]
mod tests;
