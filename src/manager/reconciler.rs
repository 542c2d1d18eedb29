//! Manager reconciliation loop (spec.md §4.5).
//!
//! For each worker, GET its task list and merge authoritative fields
//! into the Manager store. Per-task misses are skipped, not
//! worker-aborting — the source's early-return-on-first-miss is a bug
//! per spec.md §9.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::task::State;

use super::client::WorkerClient;
use super::store::ManagerStore;

const RECONCILE_INTERVAL: Duration = Duration::from_secs(15);

/// Runs one reconciliation pass across every known worker.
pub async fn reconcile_once(store: &ManagerStore, client: &WorkerClient) {
    for worker in store.workers() {
        let tasks = match client.fetch_tasks(&worker).await {
            Ok(tasks) => tasks,
            Err(e) => {
                warn!("reconciliation: {worker} unreachable: {e}");
                continue;
            }
        };

        for reported in tasks {
            if store.get_task(&reported.id).is_none() {
                debug!("reconciliation: {worker} reported unknown task {}, skipping", reported.id);
                continue;
            }
            store.reconcile_task(&reported);

            // Open question in spec.md §9: the source never clears
            // worker<->task mappings on completion. We take the
            // recommended GC: drop the assignment once a task reaches
            // its terminal state.
            if reported.state == State::Completed {
                store.unassign(&reported.id);
            }
        }
    }
}

pub async fn run_loop(store: Arc<ManagerStore>, client: Arc<WorkerClient>, token: CancellationToken) {
    loop {
        tokio::select! {
            _ = token.cancelled() => return,
            _ = tokio::time::sleep(RECONCILE_INTERVAL) => {
                reconcile_once(&store, &client).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::fake::FakeEngine;
    use crate::task::Task;
    use crate::worker::{self, WorkerState};

    /// Spins up a real Worker HTTP server on an ephemeral port and
    /// returns its `host:port` base, matching what the Manager's
    /// worker list holds.
    async fn spawn_worker(state: Arc<WorkerState>) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let app = worker::http::router(state);
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        addr.to_string()
    }

    #[tokio::test]
    async fn reconcile_merges_authoritative_fields_from_worker() {
        let worker_state = WorkerState::new(Arc::new(FakeEngine::new()));
        let mut task = Task::new("web", "nginx");
        task.state = crate::task::State::Running;
        task.container_id = "c1".into();
        worker_state.store.upsert(task.clone());

        let worker_addr = spawn_worker(worker_state).await;

        let manager_store = ManagerStore::new(vec![worker_addr]);
        let mut desired = task.clone();
        desired.state = crate::task::State::Scheduled;
        desired.container_id.clear();
        manager_store.upsert_task(desired);

        let client = WorkerClient::new();
        reconcile_once(&manager_store, &client).await;

        let reconciled = manager_store.get_task(&task.id).unwrap();
        assert_eq!(reconciled.state, crate::task::State::Running);
        assert_eq!(reconciled.container_id, "c1");
    }

    #[tokio::test]
    async fn reconcile_skips_task_unknown_to_the_manager() {
        let worker_state = WorkerState::new(Arc::new(FakeEngine::new()));
        let mut task = Task::new("ghost", "nginx");
        task.state = crate::task::State::Running;
        worker_state.store.upsert(task.clone());

        let worker_addr = spawn_worker(worker_state).await;
        let manager_store = ManagerStore::new(vec![worker_addr]);
        let client = WorkerClient::new();

        reconcile_once(&manager_store, &client).await;
        assert!(manager_store.get_task(&task.id).is_none());
    }

    #[tokio::test]
    async fn reconcile_skips_unreachable_worker_and_proceeds() {
        let manager_store = ManagerStore::new(vec!["127.0.0.1:1".to_string()]);
        let client = WorkerClient::new();
        reconcile_once(&manager_store, &client).await;
    }
}
