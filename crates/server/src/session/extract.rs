// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Pure extractors over the untyped `message` payload of a log entry.
//!
//! Every accessor guards at every level: a missing key or unexpected shape
//! yields an empty result, never an error. The payload's `content` is either
//! a plain string or an ordered array of typed content blocks.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

use super::model::SessionMessage;

/// A `tool_use` content block.
#[derive(Debug, Clone, Serialize)]
pub struct ToolUseBlock {
    pub id: String,
    pub name: String,
    pub input: Value,
}

/// Todo item state as written by the TodoWrite tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TodoStatus {
    Pending,
    InProgress,
    Completed,
}

impl TodoStatus {
    fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "in_progress" => Some(Self::InProgress),
            "completed" => Some(Self::Completed),
            _ => None,
        }
    }
}

/// One todo entry from a TodoWrite payload.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Todo {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub content: String,
    pub status: TodoStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub active_form: Option<String>,
}

/// A `thinking` content block tagged with its enclosing message.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ThinkingBlock {
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub message_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub level: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub triggers: Vec<String>,
}

/// Extract the user-facing text of a payload.
///
/// A string `content` is returned as-is. An array `content` concatenates the
/// `text` field of every `text` block, joined by newlines; non-text blocks
/// are skipped. Anything else yields an empty string.
pub fn text_content(payload: &Value) -> String {
    let Some(content) = payload.get("content") else {
        return String::new();
    };

    if let Some(text) = content.as_str() {
        return text.to_owned();
    }

    let Some(blocks) = content.as_array() else {
        return String::new();
    };

    let texts: Vec<&str> = blocks
        .iter()
        .filter(|b| b.get("type").and_then(|v| v.as_str()) == Some("text"))
        .filter_map(|b| b.get("text").and_then(|v| v.as_str()))
        .collect();
    texts.join("\n")
}

/// Extract every `tool_use` content block.
pub fn tool_calls(payload: &Value) -> Vec<ToolUseBlock> {
    content_blocks(payload, "tool_use")
        .map(|block| ToolUseBlock {
            id: str_of(block, "id"),
            name: str_of(block, "name"),
            input: block.get("input").cloned().unwrap_or(Value::Null),
        })
        .collect()
}

/// Extract the todo list from a TodoWrite tool call, if present.
///
/// A TodoWrite payload always carries the full list, so callers replace any
/// previously-seen todos with this result when it is non-empty.
pub fn todos(payload: &Value) -> Vec<Todo> {
    tool_calls(payload)
        .into_iter()
        .filter(|call| call.name == "TodoWrite")
        .filter_map(|call| call.input.get("todos").and_then(|v| v.as_array()).cloned())
        .flatten()
        .filter_map(|item| decode_todo(&item))
        .collect()
}

/// Extract every `thinking` content block, tagged with the enclosing
/// message's id and timestamp.
pub fn thinking_blocks(msg: &SessionMessage) -> Vec<ThinkingBlock> {
    let message_id = msg
        .message
        .get("id")
        .and_then(|v| v.as_str())
        .unwrap_or(msg.uuid.as_str())
        .to_owned();

    content_blocks(&msg.message, "thinking")
        .map(|block| ThinkingBlock {
            content: block
                .get("thinking")
                .or_else(|| block.get("content"))
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_owned(),
            timestamp: msg.timestamp,
            message_id: message_id.clone(),
            level: block.get("level").and_then(|v| v.as_str()).map(str::to_owned),
            triggers: block
                .get("triggers")
                .and_then(|v| v.as_array())
                .map(|a| {
                    a.iter().filter_map(|t| t.as_str()).map(str::to_owned).collect()
                })
                .unwrap_or_default(),
        })
        .collect()
}

/// Count `image` content blocks.
pub fn image_count(payload: &Value) -> u64 {
    content_blocks(payload, "image").count() as u64
}

/// Iterate the content blocks of a payload matching a block type.
fn content_blocks<'a>(
    payload: &'a Value,
    block_type: &'a str,
) -> impl Iterator<Item = &'a Value> {
    payload
        .get("content")
        .and_then(|c| c.as_array())
        .map(|a| a.as_slice())
        .unwrap_or_default()
        .iter()
        .filter(move |b| b.get("type").and_then(|v| v.as_str()) == Some(block_type))
}

fn decode_todo(item: &Value) -> Option<Todo> {
    let content = item.get("content").and_then(|v| v.as_str())?;
    let status = item
        .get("status")
        .and_then(|v| v.as_str())
        .and_then(TodoStatus::parse)
        .unwrap_or(TodoStatus::Pending);

    Some(Todo {
        id: item.get("id").and_then(|v| v.as_str()).map(str::to_owned),
        content: content.to_owned(),
        status,
        priority: item.get("priority").and_then(|v| v.as_str()).map(str::to_owned),
        active_form: item.get("activeForm").and_then(|v| v.as_str()).map(str::to_owned),
    })
}

fn str_of(block: &Value, key: &str) -> String {
    block.get(key).and_then(|v| v.as_str()).unwrap_or_default().to_owned()
}

#[cfg(test)]
#[path = "extract_tests.rs"]
mod tests;
