// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Library-backed git executor.
//!
//! Serves the hot read paths (status, branch, rev-parse, remote, config,
//! fetch) in-process via libgit2, serialized per repository. Everything
//! else, any call carrying `-c` configuration flags, and any call with
//! extra environment degrades to the shell executor.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use git2::Repository;
use tokio::sync::Mutex;
use tracing::debug;

use super::shell::ShellGit;
use super::{GitError, GitResult};

/// In-process executor with a shell fallback.
#[derive(Default)]
pub struct NativeGit {
    shell: ShellGit,
    /// One lock per canonical repository path: libgit2 mutations must not
    /// interleave within a repo.
    locks: parking_lot::Mutex<HashMap<PathBuf, Arc<Mutex<()>>>>,
}

impl NativeGit {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn execute(&self, dir: &Path, args: &[&str]) -> GitResult<Vec<u8>> {
        if !can_handle(args) {
            return self.shell.execute(dir, args).await;
        }

        let lock = self.repo_lock(dir);
        let _guard = lock.lock().await;

        debug!(dir = %dir.display(), ?args, "native git");
        let dir = dir.to_path_buf();
        let args: Vec<String> = args.iter().map(|a| (*a).to_owned()).collect();
        tokio::task::spawn_blocking(move || run_native(&dir, &args))
            .await
            .map_err(|e| GitError::Failed {
                status: None,
                stderr: format!("git worker task failed: {e}"),
            })?
    }

    /// Extra environment implies shell semantics libgit2 cannot honor.
    pub async fn execute_with_env(
        &self,
        dir: &Path,
        env: &[(&str, &str)],
        args: &[&str],
    ) -> GitResult<Vec<u8>> {
        if env.is_empty() {
            self.execute(dir, args).await
        } else {
            self.shell.execute_with_env(dir, env, args).await
        }
    }

    pub async fn execute_with_stderr(
        &self,
        dir: &Path,
        args: &[&str],
    ) -> GitResult<(Vec<u8>, Vec<u8>)> {
        if can_handle(args) {
            let stdout = self.execute(dir, args).await?;
            Ok((stdout, Vec::new()))
        } else {
            self.shell.execute_with_stderr(dir, args).await
        }
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

    fn repo_lock(&self, dir: &Path) -> Arc<Mutex<()>> {
        let key = dir.canonicalize().unwrap_or_else(|_| dir.to_path_buf());
        Arc::clone(self.locks.lock().entry(key).or_default())
    }
}

/// The exact invocations the library path serves. Conservative on purpose:
/// anything with flags we do not model goes to the shell.
fn can_handle(args: &[&str]) -> bool {
    if args.iter().any(|a| *a == "-c") {
        return false;
    }
    match args {
        ["status", "--porcelain"] => true,
        ["branch", "--show-current"] => true,
        ["rev-parse", "--abbrev-ref", "HEAD"] => true,
        ["rev-parse", spec] if !spec.starts_with('-') => true,
        ["remote"] => true,
        ["remote", "get-url", name] if !name.starts_with('-') => true,
        ["config", key] if key.contains('.') => true,
        ["config", key, value] if key.contains('.') && !value.starts_with('-') => true,
        ["fetch"] => true,
        ["fetch", remote] if !remote.starts_with('-') => true,
        _ => false,
    }
}

fn run_native(dir: &Path, args: &[String]) -> GitResult<Vec<u8>> {
    let repo = Repository::open(dir).map_err(git_err)?;
    let args: Vec<&str> = args.iter().map(String::as_str).collect();

    match args.as_slice() {
        ["status", "--porcelain"] => porcelain_status(&repo),
        ["branch", "--show-current"] => current_branch(&repo),
        ["rev-parse", "--abbrev-ref", "HEAD"] => abbrev_head(&repo),
        ["rev-parse", spec] => {
            let object = repo.revparse_single(spec).map_err(git_err)?;
            Ok(format!("{}\n", object.id()).into_bytes())
        }
        ["remote"] => {
            let remotes = repo.remotes().map_err(git_err)?;
            let mut out = String::new();
            for name in remotes.iter().flatten() {
                out.push_str(name);
                out.push('\n');
            }
            Ok(out.into_bytes())
        }
        ["remote", "get-url", name] => {
            let remote = repo.find_remote(name).map_err(git_err)?;
            match remote.url() {
                Some(url) => Ok(format!("{url}\n").into_bytes()),
                None => Err(GitError::Failed {
                    status: Some(1),
                    stderr: format!("no URL configured for remote {name}"),
                }),
            }
        }
        ["config", key] => {
            let config = repo.config().and_then(|mut c| c.snapshot()).map_err(git_err)?;
            match config.get_string(key) {
                Ok(value) => Ok(format!("{value}\n").into_bytes()),
                // `git config <key>` exits 1 for unset keys.
                Err(_) => Err(GitError::Failed { status: Some(1), stderr: String::new() }),
            }
        }
        ["config", key, value] => {
            let mut config = repo.config().map_err(git_err)?;
            config.set_str(key, value).map_err(git_err)?;
            Ok(Vec::new())
        }
        ["fetch"] => fetch(&repo, "origin"),
        ["fetch", remote] => fetch(&repo, remote),
        _ => Err(GitError::Failed {
            status: None,
            stderr: format!("unsupported native git invocation: {args:?}"),
        }),
    }
}

fn current_branch(repo: &Repository) -> GitResult<Vec<u8>> {
    let head = match repo.head() {
        Ok(head) => head,
        // Unborn branch: `git branch --show-current` prints nothing.
        Err(_) => return Ok(Vec::new()),
    };
    if !head.is_branch() {
        return Ok(Vec::new());
    }
    Ok(format!("{}\n", head.shorthand().unwrap_or_default()).into_bytes())
}

fn abbrev_head(repo: &Repository) -> GitResult<Vec<u8>> {
    let head = repo.head().map_err(git_err)?;
    Ok(format!("{}\n", head.shorthand().unwrap_or("HEAD")).into_bytes())
}

fn fetch(repo: &Repository, name: &str) -> GitResult<Vec<u8>> {
    let mut remote = repo.find_remote(name).map_err(git_err)?;
    let refspecs: [&str; 0] = [];
    remote.fetch(&refspecs, None, None).map_err(git_err)?;
    Ok(Vec::new())
}

/// `git status --porcelain` emulation: `XY path` lines, untracked as `??`.
fn porcelain_status(repo: &Repository) -> GitResult<Vec<u8>> {
    let mut opts = git2::StatusOptions::new();
    opts.include_untracked(true).recurse_untracked_dirs(true);
    let statuses = repo.statuses(Some(&mut opts)).map_err(git_err)?;

    let mut out = String::new();
    for entry in statuses.iter() {
        let status = entry.status();
        if status.is_ignored() {
            continue;
        }
        let path = entry.path().unwrap_or_default();
        if status.is_wt_new() && !status.is_index_new() {
            out.push_str(&format!("?? {path}\n"));
            continue;
        }
        let index = index_code(status);
        let worktree = worktree_code(status);
        if index == ' ' && worktree == ' ' {
            continue;
        }
        out.push_str(&format!("{index}{worktree} {path}\n"));
    }
    Ok(out.into_bytes())
}

fn index_code(status: git2::Status) -> char {
    if status.is_index_new() {
        'A'
    } else if status.is_index_modified() {
        'M'
    } else if status.is_index_deleted() {
        'D'
    } else if status.is_index_renamed() {
        'R'
    } else if status.is_index_typechange() {
        'T'
    } else {
        ' '
    }
}

fn worktree_code(status: git2::Status) -> char {
    if status.is_wt_modified() {
        'M'
    } else if status.is_wt_deleted() {
        'D'
    } else if status.is_wt_renamed() {
        'R'
    } else if status.is_wt_typechange() {
        'T'
    } else {
        ' '
    }
}

fn git_err(e: git2::Error) -> GitError {
    GitError::Failed { status: None, stderr: e.message().to_owned() }
}

#[cfg(test)]
#[path = "native_tests.rs"]
mod tests;
