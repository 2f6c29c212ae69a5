// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! PTY session lifecycle: find-or-spawn per session key, restart agent
//! sessions on child exit, tear down when the last subscriber leaves a dead
//! session.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use bytes::Bytes;
use serde::Serialize;
use tokio::sync::{mpsc, Notify, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::error::ErrorCode;
use crate::events::{EventPublisher, WorkspaceEvent};

use super::fanout::{Fanout, SubscriberId};
use super::native::NativePty;
use super::protocol::{ControlFrame, Frame};
use super::{ExitStatus, PtyInput, SessionKey};

/// Static PTY settings.
#[derive(Debug, Clone)]
pub struct PtyConfig {
    pub cols: u16,
    pub rows: u16,
    /// Per-subscriber outbound queue capacity, in frames.
    pub queue_capacity: usize,
    /// Command for plain terminal sessions.
    pub shell_command: Vec<String>,
    /// Command for agent sessions (restarted on exit).
    pub agent_command: Vec<String>,
}

impl Default for PtyConfig {
    fn default() -> Self {
        Self {
            cols: 200,
            rows: 50,
            queue_capacity: 256,
            shell_command: vec!["/bin/bash".to_owned()],
            agent_command: vec!["claude".to_owned()],
        }
    }
}

/// One live PTY session.
struct PtySession {
    key: SessionKey,
    workspace_path: PathBuf,
    /// Agent entry point, when this is an agent session.
    agent: Option<String>,
    fanout: Arc<Fanout>,
    child_exited: AtomicBool,
    last_activity: parking_lot::Mutex<Instant>,
    restart: Notify,
    shutdown: CancellationToken,
}

impl PtySession {
    fn touch(&self) {
        *self.last_activity.lock() = Instant::now();
    }
}

/// A subscriber's attachment to a PTY session.
///
/// The transport pumps `rx` to the client and routes client frames back
/// through the methods. Dropping the handle detaches the subscriber.
pub struct SubscriberHandle {
    session: Arc<PtySession>,
    id: SubscriberId,
    pub rx: mpsc::Receiver<Frame>,
    left: bool,
}

impl SubscriberHandle {
    /// The client consumed the replay burst.
    pub fn ready(&self) {
        self.session.fanout.mark_ready(self.id);
    }

    /// Keystrokes toward the PTY (writer only; reader input is dropped).
    pub async fn input(&self, data: Bytes) {
        self.session.touch();
        self.session.fanout.input(self.id, data).await;
    }

    pub async fn resize(&self, cols: u16, rows: u16) {
        self.session.fanout.resize(self.id, cols, rows).await;
    }

    pub async fn focus(&self, focused: bool) {
        self.session.fanout.focus(self.id, focused).await;
    }

    /// Request the writer role.
    pub fn promote(&self) {
        self.session.fanout.promote(self.id);
    }

    /// Detach from the session.
    pub fn leave(&mut self) {
        if !self.left {
            self.left = true;
            self.session.fanout.leave(self.id);
        }
    }
}

impl Drop for SubscriberHandle {
    fn drop(&mut self) {
        self.leave();
    }
}

/// Snapshot of one PTY session for status endpoints.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PtySessionInfo {
    pub workspace: String,
    pub terminal: String,
    pub workspace_path: PathBuf,
    pub agent: bool,
    pub subscribers: usize,
    pub cols: u16,
    pub rows: u16,
    pub child_exited: bool,
    pub idle_secs: u64,
}

/// Owns every PTY session, indexed by `(workspace, terminal)`.
pub struct PtyManager {
    config: PtyConfig,
    events: EventPublisher,
    sessions: Arc<RwLock<HashMap<SessionKey, Arc<PtySession>>>>,
    shutdown: CancellationToken,
}

impl PtyManager {
    pub fn new(config: PtyConfig, events: EventPublisher, shutdown: CancellationToken) -> Self {
        Self {
            config,
            events,
            sessions: Arc::new(RwLock::new(HashMap::new())),
            shutdown,
        }
    }

    /// Attach a subscriber to the session for `key`, spawning it on first
    /// use. The workspace path is recorded at creation; a join with a
    /// different path is refused.
    pub async fn subscribe(
        &self,
        key: SessionKey,
        workspace_path: &Path,
        agent: Option<&str>,
    ) -> Result<SubscriberHandle, ErrorCode> {
        let mut sessions = self.sessions.write().await;

        if let Some(existing) = sessions.get(&key) {
            if existing.workspace_path != workspace_path {
                return Err(ErrorCode::AuthzMismatch);
            }
            existing.touch();
            let (id, rx) = existing.fanout.join();
            return Ok(SubscriberHandle {
                session: Arc::clone(existing),
                id,
                rx,
                left: false,
            });
        }

        let command = if agent.is_some() {
            self.config.agent_command.clone()
        } else {
            self.config.shell_command.clone()
        };

        let (pty_tx, pty_rx) = mpsc::channel::<PtyInput>(256);
        let fanout = Arc::new(Fanout::new(
            self.config.cols,
            self.config.rows,
            self.config.queue_capacity,
            pty_tx,
        ));

        let session = Arc::new(PtySession {
            key: key.clone(),
            workspace_path: workspace_path.to_path_buf(),
            agent: agent.map(str::to_owned),
            fanout: Arc::clone(&fanout),
            child_exited: AtomicBool::new(false),
            last_activity: parking_lot::Mutex::new(Instant::now()),
            restart: Notify::new(),
            shutdown: self.shutdown.child_token(),
        });

        info!(session = %key, path = %workspace_path.display(), "spawning pty session");
        sessions.insert(key.clone(), Arc::clone(&session));
        tokio::spawn(run_session(
            Arc::clone(&session),
            command,
            pty_rx,
            Arc::clone(&self.sessions),
            self.events.clone(),
        ));
        self.events.publish(&key.workspace, WorkspaceEvent::SessionStarted {});

        let (id, rx) = fanout.join();
        Ok(SubscriberHandle { session, id, rx, left: false })
    }

    /// Hard-restart a session's child process. Returns false for an unknown
    /// key.
    pub async fn restart(&self, key: &SessionKey) -> bool {
        match self.sessions.read().await.get(key) {
            Some(session) => {
                session.restart.notify_one();
                true
            }
            None => false,
        }
    }

    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Status snapshot across all sessions.
    pub async fn sessions_snapshot(&self) -> Vec<PtySessionInfo> {
        let sessions = self.sessions.read().await;
        let mut infos: Vec<PtySessionInfo> = sessions
            .values()
            .map(|s| {
                let (cols, rows) = s.fanout.geometry();
                PtySessionInfo {
                    workspace: s.key.workspace.clone(),
                    terminal: s.key.terminal.clone(),
                    workspace_path: s.workspace_path.clone(),
                    agent: s.agent.is_some(),
                    subscribers: s.fanout.subscriber_count(),
                    cols,
                    rows,
                    child_exited: s.child_exited.load(Ordering::Acquire),
                    idle_secs: s.last_activity.lock().elapsed().as_secs(),
                }
            })
            .collect();
        infos.sort_by(|a, b| {
            (&a.workspace, &a.terminal).cmp(&(&b.workspace, &b.terminal))
        });
        infos
    }
}

enum RunOutcome {
    Exited(ExitStatus),
    RestartRequested,
    Failed(anyhow::Error),
    Shutdown,
}

/// Per-session loop: spawn the child, pump output into the fanout, respawn
/// or tear down on exit.
async fn run_session(
    session: Arc<PtySession>,
    command: Vec<String>,
    mut input_rx: mpsc::Receiver<PtyInput>,
    sessions: Arc<RwLock<HashMap<SessionKey, Arc<PtySession>>>>,
    events: EventPublisher,
) {
    let (output_tx, mut output_rx) = mpsc::channel::<Bytes>(256);

    // Output pump: every chunk goes to the replay buffer and subscribers.
    let pump = {
        let session = Arc::clone(&session);
        tokio::spawn(async move {
            while let Some(chunk) = output_rx.recv().await {
                session.touch();
                session.fanout.broadcast(&chunk);
            }
        })
    };

    loop {
        let (cols, rows) = session.fanout.geometry();
        let mut pty = match NativePty::spawn(
            &command,
            &session.workspace_path,
            &[],
            cols,
            rows,
        ) {
            Ok(pty) => pty,
            Err(e) => {
                error!(session = %session.key, "pty spawn failed: {e:#}");
                session.fanout.broadcast_control(ControlFrame::error(
                    ErrorCode::Internal,
                    format!("failed to spawn session: {e}"),
                ));
                break;
            }
        };

        let outcome = tokio::select! {
            status = pty.run(&output_tx, &mut input_rx) => match status {
                Ok(status) => RunOutcome::Exited(status),
                Err(e) => RunOutcome::Failed(e),
            },
            _ = session.restart.notified() => RunOutcome::RestartRequested,
            _ = session.shutdown.cancelled() => RunOutcome::Shutdown,
        };
        // Dropping the handle reaps the child (HUP, then KILL).
        drop(pty);

        match outcome {
            RunOutcome::Shutdown => break,
            RunOutcome::Failed(e) => {
                warn!(session = %session.key, "pty loop failed: {e:#}");
                session.fanout.broadcast_control(ControlFrame::error(
                    ErrorCode::Io,
                    format!("terminal i/o failed: {e}"),
                ));
                break;
            }
            RunOutcome::Exited(status) => {
                let respawn = session.agent.is_some()
                    && session.fanout.subscriber_count() > 0
                    && !session.shutdown.is_cancelled();
                if respawn {
                    info!(session = %session.key, ?status, "agent exited, restarting");
                    restart_for_subscribers(&session, &events);
                    continue;
                }
                info!(session = %session.key, ?status, "child exited, tearing down");
                session.child_exited.store(true, Ordering::Release);
                session.fanout.broadcast_control(ControlFrame::error(
                    ErrorCode::ChildExited,
                    exit_message(status),
                ));
                break;
            }
            RunOutcome::RestartRequested => {
                if session.shutdown.is_cancelled() {
                    break;
                }
                info!(session = %session.key, "explicit restart");
                restart_for_subscribers(&session, &events);
                continue;
            }
        }
    }

    sessions.write().await.remove(&session.key);
    drop(output_tx);
    let _ = pump.await;
    info!(session = %session.key, "pty session reclaimed");
}

/// Hard reset from the subscribers' point of view: stale replay data is
/// dropped before any new output, and clients are told to clear.
fn restart_for_subscribers(session: &PtySession, events: &EventPublisher) {
    session.fanout.clear_replay();
    session.fanout.broadcast_control(ControlFrame::SessionRestarting {});
    events.publish(&session.key.workspace, WorkspaceEvent::SessionRestarted {});
}

fn exit_message(status: ExitStatus) -> String {
    match (status.code, status.signal) {
        (Some(code), _) => format!("child exited with code {code}"),
        (_, Some(signal)) => format!("child killed by signal {signal}"),
        _ => "child exited".to_owned(),
    }
}

#[cfg(test)]
#[path = "manager_tests.rs"]
mod tests;
