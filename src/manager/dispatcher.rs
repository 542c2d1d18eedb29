//! Manager dispatch loop: worker selection and event POSTing
//! (spec.md §4.4).

use std::sync::atomic::{AtomicIsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::queue::EventQueue;
use crate::task::State;

use super::client::WorkerClient;
use super::store::ManagerStore;

const TICK_INTERVAL: Duration = Duration::from_secs(10);

/// Round-robin cursor over the worker list.
///
/// The source starts this at 0 and computes `(last+1) mod n`, so the
/// first selection lands on index 1. Starting at the sentinel `-1`
/// instead makes the first selection index 0 (spec.md §9).
pub struct RoundRobin {
    last: AtomicIsize,
}

impl Default for RoundRobin {
    fn default() -> Self {
        Self::new()
    }
}

impl RoundRobin {
    pub fn new() -> Self {
        Self {
            last: AtomicIsize::new(-1),
        }
    }

    /// Advance and return the next index into a worker list of `len`
    /// workers. Panics if `len == 0`; callers must check emptiness
    /// first.
    pub fn next(&self, len: usize) -> usize {
        assert!(len > 0, "round-robin over an empty worker list");
        let next = (self.last.load(Ordering::SeqCst) + 1).rem_euclid(len as isize);
        self.last.store(next, Ordering::SeqCst);
        next as usize
    }
}

/// Process exactly one dispatch tick: pop an event, select a worker,
/// POST it. No-op if the queue is empty or there are no workers.
pub async fn dispatch_once(
    store: &ManagerStore,
    queue: &EventQueue,
    client: &WorkerClient,
    round_robin: &RoundRobin,
) {
    if queue.is_empty().await {
        debug!("dispatch: queue empty, nothing to do");
        return;
    }

    let workers = store.workers();
    if workers.is_empty() {
        warn!("dispatch: no workers registered, event stays queued");
        return;
    }

    let Some(event) = queue.pop().await else {
        return;
    };

    let worker = &workers[round_robin.next(workers.len())];

    store.record_event(event.clone());
    store.assign(event.task.id, worker);

    // The Manager's own bookkeeping copy is marked `Scheduled`
    // regardless of the event's requested target state (spec.md §4.4
    // step 3); the event forwarded to the Worker carries the original
    // embedded task unchanged.
    let mut stored_task = event.task.clone();
    stored_task.state = State::Scheduled;
    store.upsert_task(stored_task);

    match client.dispatch(worker, &event).await {
        Ok(task) => {
            info!("dispatched task {} to {worker}", task.id);
        }
        Err(super::client::WorkerClientError::Transport(e)) => {
            warn!("transport error dispatching to {worker}: {e}; re-enqueueing");
            queue.push(event).await;
        }
        Err(super::client::WorkerClientError::Rejected(msg)) => {
            warn!("{worker} rejected event {}: {msg}", event.id);
        }
    }
}

pub async fn run_loop(
    store: Arc<ManagerStore>,
    queue: Arc<EventQueue>,
    client: Arc<WorkerClient>,
    round_robin: Arc<RoundRobin>,
    token: CancellationToken,
) {
    loop {
        tokio::select! {
            _ = token.cancelled() => return,
            _ = tokio::time::sleep(TICK_INTERVAL) => {
                dispatch_once(&store, &queue, &client, &round_robin).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_selection_with_one_worker_is_index_zero() {
        let rr = RoundRobin::new();
        assert_eq!(rr.next(1), 0);
        assert_eq!(rr.next(1), 0);
    }

    #[test]
    fn round_robin_across_three_workers() {
        let rr = RoundRobin::new();
        assert_eq!(rr.next(3), 0);
        assert_eq!(rr.next(3), 1);
        assert_eq!(rr.next(3), 2);
        assert_eq!(rr.next(3), 0);
    }

    #[tokio::test]
    async fn dispatch_against_empty_queue_does_not_advance_cursor() {
        let store = ManagerStore::new(vec!["w1:7000".into()]);
        let queue = EventQueue::new();
        let client = WorkerClient::new();
        let rr = RoundRobin::new();

        dispatch_once(&store, &queue, &client, &rr).await;
        assert_eq!(rr.last.load(Ordering::SeqCst), -1);
    }

    #[tokio::test]
    async fn transport_failure_reenqueues_the_event() {
        // Nothing listens on this address; reqwest fails fast with a
        // connection-refused error (spec.md §4.4 step 5).
        let store = ManagerStore::new(vec!["127.0.0.1:1".to_string()]);
        let queue = EventQueue::new();
        let client = WorkerClient::new();
        let rr = RoundRobin::new();

        let task = crate::task::Task::new("web", "nginx");
        let event = crate::task::TaskEvent::new(State::Scheduled, task.clone());
        let event_id = event.id;
        queue.push(event).await;

        dispatch_once(&store, &queue, &client, &rr).await;

        let requeued = queue.pop().await.expect("event should be back on the queue");
        assert_eq!(requeued.id, event_id);
    }

    #[tokio::test]
    async fn happy_path_dispatch_to_a_real_worker() {
        use crate::engine::fake::FakeEngine;
        use crate::worker::{self, WorkerState};

        let worker_state = WorkerState::new(Arc::new(FakeEngine::new()));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let app = worker::http::router(worker_state.clone());
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let store = ManagerStore::new(vec![addr.to_string()]);
        let queue = EventQueue::new();
        let client = WorkerClient::new();
        let rr = RoundRobin::new();

        let task = crate::task::Task::new("web", "postgres:13");
        let event = crate::task::TaskEvent::new(State::Scheduled, task.clone());
        queue.push(event).await;

        dispatch_once(&store, &queue, &client, &rr).await;

        assert!(queue.is_empty().await, "successfully dispatched event must not be re-enqueued");
        assert_eq!(store.worker_for(&task.id), Some(addr.to_string()));
        assert_eq!(store.get_task(&task.id).unwrap().state, State::Scheduled);

        // Hand the event to the worker's own runtime loop directly,
        // standing in for the worker tick of spec.md §8 scenario 1.
        let delivered = worker_state.queue.pop().await.expect("worker should have received the event");
        let result = crate::worker::process_event_for_tests(&worker_state.store, worker_state.engine.as_ref(), delivered)
            .await
            .unwrap();
        assert_eq!(result.state, State::Running);
    }
}
