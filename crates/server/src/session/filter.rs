// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Message classification: warmup exchanges, automated prompts, sidechains.
//!
//! The backend issues a handful of prompts on the user's behalf (warming the
//! agent up, naming branches, titling sessions, drafting PRs and commit
//! messages). Their responses must not surface as the user-facing "latest
//! message", so the filter can hide them while keeping the triggering prompt
//! visible.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::extract::text_content;
use super::model::{MessageKind, SessionMessage};

/// Exact content of the sidechain user prompt that wakes the agent up.
pub const WARMUP_SENTINEL: &str = "warmup";

/// Prompt prefixes the backend emits on the user's behalf, lowercase.
/// Matched as case-insensitive substrings of user prompt text.
const AUTOMATED_PROMPTS: &[&str] = &[
    WARMUP_SENTINEL,
    "generate a branch name",
    "generate a title for this session",
    "generate a pull request title and description",
    "generate a commit message",
];

/// Which messages a scan should drop.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MessageFilter {
    pub skip_warmup: bool,
    pub skip_automated: bool,
    pub skip_sidechain: bool,
    pub skip_errors: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub only_kind: Option<MessageKind>,
    /// Keep only messages whose content carries a block of this type
    /// (string content counts as `text`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub only_content_type: Option<String>,
}

impl MessageFilter {
    /// The filter backing `latest_message`: hide warmup and automated
    /// traffic, keep sidechains and errors.
    pub fn default_filter() -> Self {
        Self {
            skip_warmup: true,
            skip_automated: true,
            skip_sidechain: false,
            skip_errors: false,
            only_kind: None,
            only_content_type: None,
        }
    }
}

/// Whether `text` is one of the backend's automated prompts.
pub fn is_automated_prompt(text: &str) -> bool {
    let lower = text.to_lowercase();
    AUTOMATED_PROMPTS.iter().any(|prefix| lower.contains(prefix))
}

/// Whether `msg` belongs to the warmup exchange.
///
/// True iff the message is a sidechain and either its own content is the
/// warmup sentinel (user side) or its parent's content — looked up in the
/// reader's user-message map — is the sentinel (assistant side).
pub fn is_warmup_message(msg: &SessionMessage, user_map: &HashMap<String, String>) -> bool {
    if !msg.is_sidechain {
        return false;
    }
    match msg.kind {
        MessageKind::User => {
            msg.content().and_then(|c| c.as_str()) == Some(WARMUP_SENTINEL)
        }
        MessageKind::Assistant => {
            user_map.get(&msg.parent_uuid).map(String::as_str) == Some(WARMUP_SENTINEL)
        }
        _ => false,
    }
}

/// Whether `msg` should be dropped under `filter`.
///
/// The automated-prompt skip applies to assistant messages only, so the
/// prompt that triggered the response stays visible.
pub fn should_skip(
    msg: &SessionMessage,
    filter: &MessageFilter,
    user_map: &HashMap<String, String>,
) -> bool {
    if filter.skip_warmup && is_warmup_message(msg, user_map) {
        return true;
    }

    if filter.skip_automated && msg.kind == MessageKind::Assistant {
        if let Some(parent_text) = user_map.get(&msg.parent_uuid) {
            if is_automated_prompt(parent_text) {
                return true;
            }
        }
    }

    // Warmup messages are already covered by the warmup flag.
    if filter.skip_sidechain && msg.is_sidechain && !is_warmup_message(msg, user_map) {
        return true;
    }

    if filter.skip_errors && msg.kind == MessageKind::Error {
        return true;
    }

    if let Some(kind) = filter.only_kind {
        if msg.kind != kind {
            return true;
        }
    }

    if let Some(ref block_type) = filter.only_content_type {
        if !has_content_type(msg, block_type) {
            return true;
        }
    }

    false
}

fn has_content_type(msg: &SessionMessage, block_type: &str) -> bool {
    let Some(content) = msg.content() else {
        return false;
    };
    if content.is_string() {
        return block_type == "text" && !text_content(&msg.message).is_empty();
    }
    content
        .as_array()
        .map(|blocks| {
            blocks
                .iter()
                .any(|b| b.get("type").and_then(|v| v.as_str()) == Some(block_type))
        })
        .unwrap_or(false)
}

#[cfg(test)]
#[path = "filter_tests.rs"]
mod tests;
