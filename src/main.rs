//! fleetd: a minimal two-tier container orchestrator. Runs as a
//! combined Manager+Worker process or a bare Worker, per
//! `Config::from_env` (spec.md §6).

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use fleetd::config::Config;
use fleetd::engine::BollardEngine;
use fleetd::manager::{self, ManagerState};
use fleetd::worker::{self, WorkerState};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "fleetd=info".into()),
        )
        .init();

    info!("starting fleetd v{}", env!("CARGO_PKG_VERSION"));

    let config = Config::from_env();
    let engine = Arc::new(BollardEngine::connect().unwrap_or_else(|e| {
        error!("failed to connect to container engine: {e}");
        std::process::exit(1);
    }));

    let shutdown = CancellationToken::new();
    let mut handles = Vec::new();

    match config {
        Config::WorkerOnly { addr } => {
            info!("running as a single-tier Worker on {addr}");
            let worker_state = WorkerState::new(engine);
            handles.extend(worker::spawn_loops(worker_state.clone(), shutdown.clone()));
            handles.push(spawn_http(addr, worker::http::router(worker_state), shutdown.clone()));
        }
        Config::Combined {
            worker_addr,
            manager_addr,
        } => {
            info!("running combined: worker on {worker_addr}, manager on {manager_addr}");
            let worker_state = WorkerState::new(engine);
            handles.extend(worker::spawn_loops(worker_state.clone(), shutdown.clone()));
            handles.push(spawn_http(
                worker_addr,
                worker::http::router(worker_state),
                shutdown.clone(),
            ));

            let manager_state = ManagerState::new(vec![worker_addr.to_string()]);
            handles.extend(manager::spawn_loops(manager_state.clone(), shutdown.clone()));
            handles.push(spawn_http(
                manager_addr,
                manager::http::router(manager_state),
                shutdown.clone(),
            ));
        }
    }

    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            tokio::signal::ctrl_c()
                .await
                .expect("failed to install CTRL+C handler");
            warn!("received shutdown signal, draining in-flight work...");
            shutdown.cancel();
        }
    });

    for handle in handles {
        let _ = handle.await;
    }

    info!("fleetd stopped");
    Ok(())
}

fn spawn_http(
    addr: SocketAddr,
    app: axum::Router,
    token: CancellationToken,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let listener = match tokio::net::TcpListener::bind(addr).await {
            Ok(listener) => listener,
            Err(e) => {
                error!("failed to bind {addr}: {e}");
                return;
            }
        };
        info!("listening on {addr}");

        let shutdown_signal = async move { token.cancelled().await };
        if let Err(e) = axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal)
            .await
        {
            error!("http server on {addr} failed: {e}");
        }
    })
}
