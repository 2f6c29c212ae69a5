// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::shell::tests::init_repo;
use super::*;

#[test]
fn merge_tree_exit_one_is_conflicts_not_failure() {
    assert!(is_merge_tree_conflict(&["merge-tree", "--write-tree", "a", "b"], Some(1)));
    assert!(!is_merge_tree_conflict(&["merge-tree", "--write-tree", "a", "b"], Some(2)));
    assert!(!is_merge_tree_conflict(&["merge-tree", "--write-tree", "a", "b"], Some(0)));
    assert!(!is_merge_tree_conflict(&["merge", "a"], Some(1)));
    assert!(!is_merge_tree_conflict(&["status"], Some(1)));
}

#[test]
fn error_display_formats() {
    let timeout = GitError::Timeout { elapsed: std::time::Duration::from_secs(30) };
    assert_eq!(timeout.to_string(), "git operation timed out after 30.0s");

    let failed = GitError::Failed {
        status: Some(128),
        stderr: "fatal: not a git repository\n".to_owned(),
    };
    assert_eq!(failed.to_string(), "git exited with 128: fatal: not a git repository");
}

#[tokio::test]
async fn facade_dispatches_both_executors() {
    let dir = tempfile::tempdir().unwrap();
    init_repo(dir.path()).await;

    for git in [Git::shell(), Git::native()] {
        let head = git.execute(dir.path(), &["rev-parse", "HEAD"]).await.unwrap();
        assert_eq!(String::from_utf8_lossy(&head).trim().len(), 40);

        let (stdout, _stderr) = git
            .execute_with_stderr(dir.path(), &["branch", "--show-current"])
            .await
            .unwrap();
        assert_eq!(String::from_utf8_lossy(&stdout).trim(), "main");
    }
}
