// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::sync::atomic::AtomicI32;
use std::sync::Arc;
use std::time::Instant;

use tokio_util::sync::CancellationToken;

use crate::events::EventPublisher;
use crate::git::Git;
use crate::pty::PtyManager;
use crate::session::SessionRegistry;

/// Shared application state passed to all handlers via axum `State`.
pub struct Store {
    pub registry: Arc<SessionRegistry>,
    pub pty: Arc<PtyManager>,
    pub git: Git,
    pub events: EventPublisher,
    pub lifecycle: LifecycleState,
}

/// Runtime lifecycle primitives.
pub struct LifecycleState {
    pub shutdown: CancellationToken,
    pub started_at: Instant,
    pub ws_client_count: AtomicI32,
}

impl LifecycleState {
    pub fn new(shutdown: CancellationToken) -> Self {
        Self {
            shutdown,
            started_at: Instant::now(),
            ws_client_count: AtomicI32::new(0),
        }
    }
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store").finish_non_exhaustive()
    }
}
