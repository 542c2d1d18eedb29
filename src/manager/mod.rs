//! Manager tier: accepts client events, dispatches them round-robin to
//! known Workers, and reconciles authoritative state back from them
//! (spec.md §2, §4.4, §4.5).

pub mod client;
mod dispatcher;
pub mod http;
mod reconciler;
mod store;

pub use client::{WorkerClient, WorkerClientError};
pub use dispatcher::RoundRobin;
pub use store::ManagerStore;

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::queue::EventQueue;

/// Everything the Manager's three concurrent activities share.
pub struct ManagerState {
    pub store: Arc<ManagerStore>,
    pub queue: Arc<EventQueue>,
    pub client: Arc<WorkerClient>,
    pub round_robin: Arc<RoundRobin>,
}

impl ManagerState {
    pub fn new(workers: Vec<String>) -> Arc<Self> {
        Arc::new(Self {
            store: Arc::new(ManagerStore::new(workers)),
            queue: Arc::new(EventQueue::new()),
            client: Arc::new(WorkerClient::new()),
            round_robin: Arc::new(RoundRobin::new()),
        })
    }
}

/// Spawns the dispatch and reconciliation loops; returns their join
/// handles so the caller can await cooperative shutdown.
pub fn spawn_loops(
    state: Arc<ManagerState>,
    token: CancellationToken,
) -> Vec<tokio::task::JoinHandle<()>> {
    let dispatch_handle = {
        let state = state.clone();
        let token = token.clone();
        tokio::spawn(async move {
            dispatcher::run_loop(
                state.store.clone(),
                state.queue.clone(),
                state.client.clone(),
                state.round_robin.clone(),
                token,
            )
            .await;
        })
    };

    let reconcile_handle = tokio::spawn(async move {
        reconciler::run_loop(state.store.clone(), state.client.clone(), token).await;
    });

    vec![dispatch_handle, reconcile_handle]
}
