// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use tokio::sync::mpsc;

use super::*;

fn sh(script: &str) -> Vec<String> {
    vec!["/bin/sh".to_owned(), "-c".to_owned(), script.to_owned()]
}

fn collect_output(
    mut output_rx: mpsc::Receiver<Bytes>,
) -> tokio::task::JoinHandle<Vec<u8>> {
    tokio::spawn(async move {
        let mut all = Vec::new();
        while let Some(chunk) = output_rx.recv().await {
            all.extend_from_slice(&chunk);
        }
        all
    })
}

#[tokio::test]
async fn spawn_runs_in_working_dir_with_env() {
    let dir = tempfile::tempdir().unwrap();
    let (output_tx, output_rx) = mpsc::channel(64);
    let (_input_tx, mut input_rx) = mpsc::channel(8);

    let mut pty = NativePty::spawn(
        &sh("pwd; printf '%s\\n' \"$CATNIP_TEST\""),
        dir.path(),
        &[("CATNIP_TEST".to_owned(), "marker-42".to_owned())],
        80,
        24,
    )
    .unwrap();

    let collector = collect_output(output_rx);
    let status = pty.run(&output_tx, &mut input_rx).await.unwrap();
    drop(output_tx);

    assert_eq!(status.code, Some(0));
    let output = String::from_utf8_lossy(&collector.await.unwrap()).to_string();
    assert!(output.contains("marker-42"), "missing env marker in: {output}");

    let canonical = dir.path().canonicalize().unwrap();
    let shown = canonical.file_name().unwrap().to_string_lossy().to_string();
    assert!(output.contains(&shown), "missing cwd in: {output}");
}

#[tokio::test]
async fn input_reaches_child() {
    let dir = tempfile::tempdir().unwrap();
    let (output_tx, output_rx) = mpsc::channel(64);
    let (input_tx, mut input_rx) = mpsc::channel(8);

    let mut pty = NativePty::spawn(&sh("read line; echo \"got:$line\""), dir.path(), &[], 80, 24)
        .unwrap();

    let collector = collect_output(output_rx);
    input_tx
        .send(PtyInput::Write(Bytes::from_static(b"ping\n")))
        .await
        .unwrap();

    let status = pty.run(&output_tx, &mut input_rx).await.unwrap();
    drop(output_tx);

    assert_eq!(status.code, Some(0));
    let output = String::from_utf8_lossy(&collector.await.unwrap()).to_string();
    assert!(output.contains("got:ping"), "unexpected output: {output}");
}

#[tokio::test]
async fn resize_is_visible_to_child() {
    let dir = tempfile::tempdir().unwrap();
    let (output_tx, output_rx) = mpsc::channel(64);
    let (input_tx, mut input_rx) = mpsc::channel(8);

    // Wait for the resize, then report the terminal size.
    let mut pty =
        NativePty::spawn(&sh("sleep 0.3; stty size"), dir.path(), &[], 80, 24).unwrap();

    let collector = collect_output(output_rx);
    input_tx
        .send(PtyInput::Resize { cols: 132, rows: 50 })
        .await
        .unwrap();

    let status = pty.run(&output_tx, &mut input_rx).await.unwrap();
    drop(output_tx);

    assert_eq!(status.code, Some(0));
    let output = String::from_utf8_lossy(&collector.await.unwrap()).to_string();
    assert!(output.contains("50 132"), "unexpected stty output: {output}");
}

#[tokio::test]
async fn nonzero_exit_code_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let (output_tx, _output_rx) = mpsc::channel(64);
    let (_input_tx, mut input_rx) = mpsc::channel(8);

    let mut pty = NativePty::spawn(&sh("exit 3"), dir.path(), &[], 80, 24).unwrap();
    let status = pty.run(&output_tx, &mut input_rx).await.unwrap();
    assert_eq!(status.code, Some(3));
    assert_eq!(status.signal, None);
}
