// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Git command façade.
//!
//! Two selectable executors behind one surface: a library-backed executor
//! that serves the hot read paths in-process (serialized per repository),
//! and a shell executor that forks `git`. Commands carrying `-c`
//! configuration flags always degrade to the shell.

pub mod native;
pub mod shell;

pub use native::NativeGit;
pub use shell::ShellGit;

use std::fmt;
use std::path::Path;
use std::time::Duration;

/// Failure classes of the git façade.
///
/// `merge-tree` exit status 1 is deliberately absent: it means "conflicts
/// detected" and surfaces as success with the conflict listing on stdout.
#[derive(Debug)]
pub enum GitError {
    /// A network operation exceeded its deadline.
    Timeout { elapsed: Duration },
    /// git exited non-zero; stderr is included verbatim.
    Failed { status: Option<i32>, stderr: String },
    /// The git process could not be run at all.
    Io(std::io::Error),
}

impl fmt::Display for GitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Timeout { elapsed } => {
                write!(f, "git operation timed out after {:.1}s", elapsed.as_secs_f64())
            }
            Self::Failed { status, stderr } => match status {
                Some(code) => write!(f, "git exited with {code}: {}", stderr.trim_end()),
                None => write!(f, "git failed: {}", stderr.trim_end()),
            },
            Self::Io(e) => write!(f, "failed to run git: {e}"),
        }
    }
}

impl std::error::Error for GitError {}

impl From<std::io::Error> for GitError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

pub type GitResult<T> = Result<T, GitError>;

/// The façade handed to the rest of the service.
///
/// Selection happens once at startup; both variants expose the same four
/// operations.
pub enum Git {
    Native(NativeGit),
    Shell(ShellGit),
}

impl Git {
    pub fn native() -> Self {
        Self::Native(NativeGit::new())
    }

    pub fn shell() -> Self {
        Self::Shell(ShellGit::new())
    }

    /// Run a git subcommand, returning stdout.
    pub async fn execute(&self, dir: &Path, args: &[&str]) -> GitResult<Vec<u8>> {
        match self {
            Self::Native(native) => native.execute(dir, args).await,
            Self::Shell(shell) => shell.execute(dir, args).await,
        }
    }

    /// Run a git subcommand with extra environment variables.
    pub async fn execute_with_env(
        &self,
        dir: &Path,
        env: &[(&str, &str)],
        args: &[&str],
    ) -> GitResult<Vec<u8>> {
        match self {
            Self::Native(native) => native.execute_with_env(dir, env, args).await,
            Self::Shell(shell) => shell.execute_with_env(dir, env, args).await,
        }
    }

    /// Run a git subcommand, returning stdout and stderr.
    pub async fn execute_with_stderr(
        &self,
        dir: &Path,
        args: &[&str],
    ) -> GitResult<(Vec<u8>, Vec<u8>)> {
        match self {
            Self::Native(native) => native.execute_with_stderr(dir, args).await,
            Self::Shell(shell) => shell.execute_with_stderr(dir, args).await,
        }
    }

    /// Run a network-bound git subcommand under a deadline.
    pub async fn execute_with_timeout(
        &self,
        dir: &Path,
        env: &[(&str, &str)],
        timeout: Duration,
        args: &[&str],
    ) -> GitResult<Vec<u8>> {
        match self {
            Self::Native(native) => {
                native.execute_with_timeout(dir, env, timeout, args).await
            }
            Self::Shell(shell) => shell.execute_with_timeout(dir, env, timeout, args).await,
        }
    }
}

/// Whether a failed invocation was `merge-tree` reporting conflicts.
///
/// `git merge-tree --write-tree` exits 1 when the merge has conflicts; that
/// is a result, not a failure.
pub(crate) fn is_merge_tree_conflict(args: &[&str], status: Option<i32>) -> bool {
    args.first() == Some(&"merge-tree") && status == Some(1)
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
