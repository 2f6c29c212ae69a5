// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Incremental session log reader.
//!
//! Tails one append-only JSONL file into an in-memory model: todo list,
//! latest textual message, latest thought, thinking ring, sub-agent map,
//! and rolling statistics. Tolerates a missing file, malformed lines,
//! truncate-and-rewrite, and concurrent snapshot reads.

use std::collections::{HashMap, VecDeque};
use std::io::{BufRead, BufReader, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use tracing::debug;

use super::extract::{self, ThinkingBlock, Todo};
use super::filter::{should_skip, MessageFilter};
use super::model::{MessageKind, SessionMessage};
use super::stats::{SessionStats, StatsAggregator};

/// Thinking blocks retained for the overview snapshot.
const THINKING_RING_CAPACITY: usize = 10;

/// One sub-agent observed in the log (sidechain entries with an agent id).
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubAgentInfo {
    pub agent_id: String,
    pub session_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subagent_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub message_count: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_seen: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_seen: Option<DateTime<Utc>>,
}

/// Mutable reader state, guarded by the reader's RwLock.
#[derive(Default)]
struct ReaderState {
    last_offset: u64,
    last_mod_time: Option<SystemTime>,
    todos: Vec<Todo>,
    latest_message: Option<SessionMessage>,
    latest_thought: Option<SessionMessage>,
    thinking_ring: VecDeque<ThinkingBlock>,
    sub_agents: HashMap<String, SubAgentInfo>,
    /// uuid → string content of user messages, for filter parent lookups.
    user_map: HashMap<String, String>,
    stats: StatsAggregator,
}

/// Incremental reader for one session log file.
///
/// One background task drives [`read_incremental`](Self::read_incremental);
/// any number of concurrent callers use the snapshot getters, which copy.
pub struct SessionReader {
    path: PathBuf,
    state: RwLock<ReaderState>,
}

impl SessionReader {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), state: RwLock::new(ReaderState::default()) }
    }

    /// The session log file this reader tails.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read entries appended since the last call.
    ///
    /// A missing file is empty success, not an error. A file that shrank
    /// below the tracked offset (e.g. after `/clear`) resets all cached
    /// state and re-reads from the beginning. Lines that fail to decode are
    /// skipped. Other I/O errors abort; the caller retries on its next tick.
    pub fn read_incremental(&self) -> anyhow::Result<Vec<SessionMessage>> {
        let mut state = self.state.write();

        let meta = match std::fs::metadata(&self.path) {
            Ok(m) => m,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let mod_time = meta.modified().ok();

        // No-change fast path: nothing appended since the last read. The
        // size check covers appends landing within one mtime granule.
        if state.last_offset > 0 && meta.len() == state.last_offset {
            if let (Some(current), Some(seen)) = (mod_time, state.last_mod_time) {
                if current <= seen {
                    return Ok(Vec::new());
                }
            }
        }

        // Truncation: the file was rewritten smaller than our cursor.
        if meta.len() < state.last_offset {
            debug!(path = %self.path.display(), "session log truncated, resetting");
            *state = ReaderState::default();
        }

        let file = std::fs::File::open(&self.path)?;
        let mut reader = BufReader::new(file);
        reader.seek(SeekFrom::Start(state.last_offset))?;

        let mut batch = Vec::new();
        let mut line = String::new();
        loop {
            line.clear();
            let bytes_read = reader.read_line(&mut line)?;
            if bytes_read == 0 {
                break;
            }
            // An unterminated tail is a write in progress; leave it for the
            // next read.
            if !line.ends_with('\n') {
                break;
            }
            state.last_offset += bytes_read as u64;

            let trimmed = line.trim_end();
            if trimmed.is_empty() {
                continue;
            }
            match SessionMessage::decode_line(trimmed) {
                Some(msg) => {
                    state.process(&msg);
                    batch.push(msg);
                }
                None => {
                    debug!(path = %self.path.display(), "skipping malformed log line");
                }
            }
        }

        state.last_mod_time = mod_time;
        Ok(batch)
    }

    /// Cold start / recovery: drop all cached state and re-read everything.
    pub fn read_full(&self) -> anyhow::Result<()> {
        self.reset();
        self.read_incremental()?;
        Ok(())
    }

    /// Drop all cached state; the next read starts from offset zero.
    pub fn reset(&self) {
        *self.state.write() = ReaderState::default();
    }

    /// Current todo list (last TodoWrite payload wins).
    pub fn todos(&self) -> Vec<Todo> {
        self.state.read().todos.clone()
    }

    /// Most recent message with extractable text that passes the default
    /// filter. Tool-use-only and thinking-only replies never land here.
    pub fn latest_message(&self) -> Option<SessionMessage> {
        self.state.read().latest_message.clone()
    }

    /// Most recent message containing a thinking block, regardless of text.
    pub fn latest_thought(&self) -> Option<SessionMessage> {
        self.state.read().latest_thought.clone()
    }

    /// The last few thinking blocks, oldest first.
    pub fn thinking_overview(&self) -> Vec<ThinkingBlock> {
        self.state.read().thinking_ring.iter().cloned().collect()
    }

    /// Sub-agents observed so far, ordered by first appearance.
    pub fn sub_agents(&self) -> Vec<SubAgentInfo> {
        let state = self.state.read();
        let mut agents: Vec<SubAgentInfo> = state.sub_agents.values().cloned().collect();
        agents.sort_by(|a, b| {
            a.first_seen.cmp(&b.first_seen).then_with(|| a.agent_id.cmp(&b.agent_id))
        });
        agents
    }

    /// Snapshot of the rolling statistics.
    pub fn stats(&self) -> SessionStats {
        self.state.read().stats.snapshot()
    }

    /// Scan the whole file and return every message surviving `filter`.
    ///
    /// Two passes: the first rebuilds the user-message map from the entire
    /// file (parent lookups need full context, not just lines before the
    /// incremental cursor); the second applies the predicate. Results are in
    /// file order, which is not necessarily timestamp order — sidechain
    /// entries are known to regress.
    pub fn messages_matching(
        &self,
        filter: &MessageFilter,
    ) -> anyhow::Result<Vec<SessionMessage>> {
        let file = match std::fs::File::open(&self.path) {
            Ok(f) => f,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut messages = Vec::new();
        let mut user_map = HashMap::new();
        for line in BufReader::new(file).lines() {
            let line = line?;
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            let Some(msg) = SessionMessage::decode_line(trimmed) else {
                continue;
            };
            if msg.kind == MessageKind::User && !msg.uuid.is_empty() {
                if let Some(text) = msg.content().and_then(|c| c.as_str()) {
                    user_map.insert(msg.uuid.clone(), text.to_owned());
                }
            }
            messages.push(msg);
        }

        messages.retain(|msg| !should_skip(msg, filter, &user_map));
        Ok(messages)
    }
}

impl ReaderState {
    /// Fold one decoded message into the cached model.
    fn process(&mut self, msg: &SessionMessage) {
        if msg.kind == MessageKind::User && !msg.uuid.is_empty() {
            if let Some(text) = msg.content().and_then(|c| c.as_str()) {
                self.user_map.insert(msg.uuid.clone(), text.to_owned());
            }
        }

        let todos = extract::todos(&msg.message);
        if !todos.is_empty() {
            self.todos = todos;
        }

        let thinking = extract::thinking_blocks(msg);
        if !thinking.is_empty() {
            self.thinking_ring.extend(thinking);
            while self.thinking_ring.len() > THINKING_RING_CAPACITY {
                self.thinking_ring.pop_front();
            }
            self.latest_thought = Some(msg.clone());
        }

        self.stats.fold(msg);

        if msg.is_sub_agent() {
            self.upsert_sub_agent(msg);
        }
        let sub_agent_count = self.sub_agents.len() as u64;
        self.stats.set_sub_agent_count(sub_agent_count);

        if !should_skip(msg, &MessageFilter::default_filter(), &self.user_map)
            && !extract::text_content(&msg.message).is_empty()
        {
            self.latest_message = Some(msg.clone());
        }
    }

    fn upsert_sub_agent(&mut self, msg: &SessionMessage) {
        let entry = self.sub_agents.entry(msg.agent_id.clone()).or_insert_with(|| {
            SubAgentInfo {
                agent_id: msg.agent_id.clone(),
                session_id: msg.session_id.clone(),
                subagent_type: msg
                    .message
                    .get("subagent_type")
                    .and_then(|v| v.as_str())
                    .map(str::to_owned),
                description: msg
                    .message
                    .get("description")
                    .and_then(|v| v.as_str())
                    .map(str::to_owned),
                message_count: 0,
                first_seen: msg.timestamp,
                last_seen: None,
            }
        });
        entry.message_count += 1;
        entry.last_seen = msg.timestamp;
    }
}

#[cfg(test)]
#[path = "reader_tests.rs"]
mod tests;
