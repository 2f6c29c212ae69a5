// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shell git executor: forks `git` per call.
//!
//! Lock-free: shell git serializes against its own lockfiles, so no
//! per-repository mutex is needed here.

use std::path::Path;
use std::process::Output;
use std::time::Duration;

use tokio::process::Command;
use tracing::debug;

use super::{is_merge_tree_conflict, GitError, GitResult};

/// Forks `git` for every operation.
#[derive(Debug, Default)]
pub struct ShellGit;

impl ShellGit {
    pub fn new() -> Self {
        Self
    }

    pub async fn execute(&self, dir: &Path, args: &[&str]) -> GitResult<Vec<u8>> {
        self.execute_with_env(dir, &[], args).await
    }

    pub async fn execute_with_env(
        &self,
        dir: &Path,
        env: &[(&str, &str)],
        args: &[&str],
    ) -> GitResult<Vec<u8>> {
        let output = self.run(dir, env, args).await?;
        check_status(args, output).map(|(stdout, _)| stdout)
    }

    pub async fn execute_with_stderr(
        &self,
        dir: &Path,
        args: &[&str],
    ) -> GitResult<(Vec<u8>, Vec<u8>)> {
        let output = self.run(dir, &[], args).await?;
        check_status(args, output)
    }

    pub async fn execute_with_timeout(
        &self,
        dir: &Path,
        env: &[(&str, &str)],
        timeout: Duration,
        args: &[&str],
    ) -> GitResult<Vec<u8>> {
        match tokio::time::timeout(timeout, self.execute_with_env(dir, env, args)).await {
            Ok(result) => result,
            Err(_) => Err(GitError::Timeout { elapsed: timeout }),
        }
    }

    async fn run(&self, dir: &Path, env: &[(&str, &str)], args: &[&str]) -> GitResult<Output> {
        debug!(dir = %dir.display(), ?args, "shell git");
        let mut command = Command::new("git");
        command.args(args).current_dir(dir).kill_on_drop(true);
        for (key, value) in env {
            command.env(key, value);
        }
        Ok(command.output().await?)
    }
}

/// Map a finished process to the façade's result contract.
fn check_status(args: &[&str], output: Output) -> GitResult<(Vec<u8>, Vec<u8>)> {
    if output.status.success() || is_merge_tree_conflict(args, output.status.code()) {
        return Ok((output.stdout, output.stderr));
    }
    Err(GitError::Failed {
        status: output.status.code(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    })
}

#[cfg(test)]
#[path = "shell_tests.rs"]
pub(crate) mod tests;
