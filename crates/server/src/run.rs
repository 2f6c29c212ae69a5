// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Top-level service runner — shared by `main` and integration tests.

use std::sync::Arc;

use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::events::EventPublisher;
use crate::pty::PtyManager;
use crate::session::history::HistoryReader;
use crate::session::{SessionRegistry, WorkspaceScanner};
use crate::transport::state::LifecycleState;
use crate::transport::{build_router, Store};

/// Initialize tracing/logging from config.
///
/// Uses `try_init` so it's safe to call multiple times (e.g. from tests).
pub fn init_tracing(config: &Config) {
    use tracing_subscriber::fmt;

    // Priority: --log-level / CATNIP_LOG_LEVEL > RUST_LOG > default ("info").
    let filter = if std::env::var("CATNIP_LOG_LEVEL").is_err() && config.log_level == "info" {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level))
    } else {
        EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("info"))
    };

    let result = match config.log_format.as_str() {
        "json" => fmt::fmt().with_env_filter(filter).json().try_init(),
        _ => fmt::fmt().with_env_filter(filter).try_init(),
    };
    drop(result);
}

/// Build the shared application state from config.
pub fn build_store(config: &Config, shutdown: CancellationToken) -> Arc<Store> {
    let events = EventPublisher::new();
    let (history_log, history_legacy) = config.history_paths();
    let history = HistoryReader::new(history_log, history_legacy);
    let registry = SessionRegistry::new(events.clone(), history)
        .with_poll_interval(config.poll_interval());
    let pty = PtyManager::new(config.pty_config(), events.clone(), shutdown.clone());

    Arc::new(Store {
        registry: Arc::new(registry),
        pty: Arc::new(pty),
        git: config.git(),
        events,
        lifecycle: LifecycleState::new(shutdown),
    })
}

/// Run the service to completion (SIGTERM/SIGINT or fatal error).
pub async fn run(config: Config) -> anyhow::Result<()> {
    init_tracing(&config);

    let shutdown = CancellationToken::new();
    let store = build_store(&config, shutdown.clone());
    let router = build_router(Arc::clone(&store));

    // Workspace discovery: keep the registry in sync with the on-disk
    // session logs so snapshot queries have readers to answer from.
    let scanner = WorkspaceScanner::new(config.projects_dir(), Arc::clone(&store.registry))
        .with_scan_interval(config.poll_interval());
    tokio::spawn(scanner.run(shutdown.clone()));

    let addr = format!("{}:{}", config.host, config.port);
    let listener = TcpListener::bind(&addr).await?;
    info!("HTTP listening on {}", listener.local_addr()?);

    spawn_signal_handler(shutdown.clone());

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown.clone().cancelled_owned())
        .await?;

    info!("catnip shut down");
    Ok(())
}

/// First signal: graceful shutdown. Second signal: force exit.
fn spawn_signal_handler(shutdown: CancellationToken) {
    tokio::spawn(async move {
        let mut sigterm =
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()).ok();
        let mut sigint =
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::interrupt()).ok();

        tokio::select! {
            _ = async {
                if let Some(ref mut s) = sigterm { s.recv().await } else { std::future::pending().await }
            } => {
                info!("received SIGTERM");
            }
            _ = async {
                if let Some(ref mut s) = sigint { s.recv().await } else { std::future::pending().await }
            } => {
                info!("received SIGINT");
            }
        }
        shutdown.cancel();

        tokio::select! {
            _ = async {
                if let Some(ref mut s) = sigterm { s.recv().await } else { std::future::pending().await }
            } => {
                error!("received SIGTERM again, forcing exit");
            }
            _ = async {
                if let Some(ref mut s) = sigint { s.recv().await } else { std::future::pending().await }
            } => {
                error!("received SIGINT again, forcing exit");
            }
        }
        std::process::exit(130);
    });
}
