// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use crate::git::Git;
use crate::pty::manager::PtyConfig;

/// Workspace orchestration service for AI coding sessions.
#[derive(Debug, Parser)]
#[command(name = "catnip", version, about)]
pub struct Config {
    /// HTTP port to listen on.
    #[arg(long, env = "CATNIP_PORT", default_value = "6369")]
    pub port: u16,

    /// Host address to bind to.
    #[arg(long, env = "CATNIP_HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Directory holding agent state (session logs, history.jsonl).
    /// Defaults to ~/.claude.
    #[arg(long, env = "CATNIP_CLAUDE_DIR")]
    pub claude_dir: Option<PathBuf>,

    /// Default terminal columns for new PTY sessions.
    #[arg(long, env = "CATNIP_COLS", default_value = "200")]
    pub cols: u16,

    /// Default terminal rows for new PTY sessions.
    #[arg(long, env = "CATNIP_ROWS", default_value = "50")]
    pub rows: u16,

    /// Per-subscriber outbound queue capacity, in frames.
    #[arg(long, env = "CATNIP_QUEUE_CAPACITY", default_value = "256")]
    pub queue_capacity: usize,

    /// Session log poll fallback interval in seconds.
    #[arg(long, env = "CATNIP_POLL_INTERVAL", default_value = "5")]
    pub poll_interval: u64,

    /// Command for plain terminal sessions (defaults to $SHELL).
    #[arg(long, env = "CATNIP_SHELL")]
    pub shell: Option<String>,

    /// Command for agent sessions.
    #[arg(long, env = "CATNIP_AGENT", default_value = "claude")]
    pub agent: String,

    /// Git executor backend (native or shell).
    #[arg(long, env = "CATNIP_GIT_EXECUTOR", default_value = "native")]
    pub git_executor: String,

    /// Log format (json or text).
    #[arg(long, env = "CATNIP_LOG_FORMAT", default_value = "json")]
    pub log_format: String,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, env = "CATNIP_LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

impl Config {
    /// Validate the configuration after parsing.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.cols == 0 || self.rows == 0 {
            anyhow::bail!("terminal dimensions must be positive");
        }
        if !matches!(self.git_executor.as_str(), "native" | "shell") {
            anyhow::bail!("invalid git executor: {}", self.git_executor);
        }
        if !matches!(self.log_format.as_str(), "json" | "text") {
            anyhow::bail!("invalid log format: {}", self.log_format);
        }
        Ok(())
    }

    /// Build the selected git executor.
    pub fn git(&self) -> Git {
        match self.git_executor.as_str() {
            "shell" => Git::shell(),
            _ => Git::native(),
        }
    }

    /// PTY settings derived from this config.
    pub fn pty_config(&self) -> PtyConfig {
        let shell = self
            .shell
            .clone()
            .or_else(|| std::env::var("SHELL").ok())
            .unwrap_or_else(|| "/bin/bash".to_owned());
        PtyConfig {
            cols: self.cols,
            rows: self.rows,
            queue_capacity: self.queue_capacity,
            shell_command: vec![shell],
            agent_command: vec![self.agent.clone()],
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval.max(1))
    }

    /// The agent state directory (`--claude-dir` or `~/.claude`).
    pub fn state_dir(&self) -> PathBuf {
        if let Some(ref dir) = self.claude_dir {
            return dir.clone();
        }
        let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_owned());
        PathBuf::from(home).join(".claude")
    }

    /// Prompt history file paths: the append-log and the legacy document
    /// (`~/.claude/history.jsonl` and `~/.claude.json` by default).
    pub fn history_paths(&self) -> (PathBuf, PathBuf) {
        let state_dir = self.state_dir();
        let legacy = state_dir.with_extension("json");
        (state_dir.join("history.jsonl"), legacy)
    }

    /// Directory holding one session-log directory per workspace.
    pub fn projects_dir(&self) -> PathBuf {
        self.state_dir().join("projects")
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
