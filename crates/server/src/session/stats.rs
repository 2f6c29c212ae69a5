// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Rolling per-session statistics folded from log entries.
//!
//! Token counts arrive as integer or floating-point JSON numbers depending
//! on the emitting version; both are accepted. Snapshots are by-value copies
//! so callers may mutate freely.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

use super::extract;
use super::filter::is_automated_prompt;
use super::model::{MessageKind, SessionMessage};

/// Cumulative session statistics.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStats {
    pub total_messages: u64,
    pub user_messages: u64,
    pub assistant_messages: u64,
    /// User prompts actually typed by a human: mainline, non-automated.
    pub human_prompts: u64,
    pub tool_calls: u64,
    pub thinking_blocks: u64,
    /// Messages carrying a `usage` payload.
    pub api_calls: u64,
    pub compactions: u64,
    pub images: u64,

    pub input_tokens: u64,
    pub output_tokens: u64,
    pub cache_read_tokens: u64,
    pub cache_creation_tokens: u64,
    /// Last non-zero `cache_read_input_tokens` — the current context size.
    pub last_context_size: u64,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_message_time: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_message_time: Option<DateTime<Utc>>,
    /// `last_message_time − first_message_time`, in milliseconds.
    pub session_duration_ms: u64,
    /// Sum of user-prompt → assistant-reply intervals, in milliseconds.
    pub active_duration_ms: u64,

    pub sub_agent_count: u64,
    pub tool_counts: HashMap<String, u64>,
}

/// Fold state for one session log.
#[derive(Debug, Default)]
pub struct StatsAggregator {
    stats: SessionStats,
    /// Active-duration accumulator for closed turns.
    active_ms: u64,
    last_user_time: Option<DateTime<Utc>>,
    last_assistant_time: Option<DateTime<Utc>>,
}

impl StatsAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one decoded message into the running statistics.
    pub fn fold(&mut self, msg: &SessionMessage) {
        let stats = &mut self.stats;
        stats.total_messages += 1;

        match msg.kind {
            MessageKind::User => {
                stats.user_messages += 1;
                if !msg.is_sidechain {
                    let text = extract::text_content(&msg.message);
                    if !text.is_empty() && !is_automated_prompt(&text) {
                        stats.human_prompts += 1;
                    }
                }
            }
            MessageKind::Assistant => stats.assistant_messages += 1,
            MessageKind::System => {
                if msg.is_compact_boundary() {
                    stats.compactions += 1;
                }
            }
            MessageKind::Error | MessageKind::Summary => {}
        }

        if let Some(t) = msg.timestamp {
            if stats.first_message_time.is_none_or(|first| t < first) {
                stats.first_message_time = Some(t);
            }
            if stats.last_message_time.is_none_or(|last| t > last) {
                stats.last_message_time = Some(t);
            }
        }

        if let Some(usage) = msg.usage() {
            stats.api_calls += 1;
            stats.input_tokens += token_count(usage, "input_tokens");
            stats.output_tokens += token_count(usage, "output_tokens");
            stats.cache_creation_tokens += token_count(usage, "cache_creation_input_tokens");
            let cache_read = token_count(usage, "cache_read_input_tokens");
            stats.cache_read_tokens += cache_read;
            if cache_read > 0 {
                stats.last_context_size = cache_read;
            }
        }

        let calls = extract::tool_calls(&msg.message);
        stats.tool_calls += calls.len() as u64;
        for call in &calls {
            if !call.name.is_empty() {
                *stats.tool_counts.entry(call.name.clone()).or_insert(0) += 1;
            }
        }

        stats.thinking_blocks += extract::thinking_blocks(msg).len() as u64;
        stats.images += extract::image_count(&msg.message);

        self.fold_turn_time(msg);
    }

    /// Record the current number of distinct sub-agents.
    pub fn set_sub_agent_count(&mut self, count: u64) {
        self.stats.sub_agent_count = count;
    }

    /// By-value snapshot, including the pending (unclosed) turn interval.
    pub fn snapshot(&self) -> SessionStats {
        let mut stats = self.stats.clone();

        stats.session_duration_ms = match (stats.first_message_time, stats.last_message_time)
        {
            (Some(first), Some(last)) => {
                (last - first).num_milliseconds().max(0) as u64
            }
            _ => 0,
        };

        stats.active_duration_ms = self.active_ms + self.pending_turn_ms();
        stats
    }

    /// Turn accounting: a turn closes when the next user prompt arrives.
    fn fold_turn_time(&mut self, msg: &SessionMessage) {
        let Some(t) = msg.timestamp else {
            return;
        };
        match msg.kind {
            MessageKind::User => {
                self.active_ms += self.pending_turn_ms();
                self.last_user_time = Some(t);
                self.last_assistant_time = None;
            }
            MessageKind::Assistant => {
                self.last_assistant_time = Some(t);
            }
            _ => {}
        }
    }

    fn pending_turn_ms(&self) -> u64 {
        match (self.last_user_time, self.last_assistant_time) {
            (Some(user), Some(assistant)) if assistant > user => {
                (assistant - user).num_milliseconds().max(0) as u64
            }
            _ => 0,
        }
    }
}

/// Read a token count that may be an integer or a float.
fn token_count(usage: &Value, key: &str) -> u64 {
    let Some(v) = usage.get(key) else {
        return 0;
    };
    v.as_u64()
        .or_else(|| v.as_f64().map(|f| if f > 0.0 { f as u64 } else { 0 }))
        .unwrap_or(0)
}

#[cfg(test)]
#[path = "stats_tests.rs"]
mod tests;
