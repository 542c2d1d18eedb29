//! Worker tier: owns a container engine, a FIFO event queue, an
//! in-memory task store, and a periodic inspector/stats sampler
//! (spec.md §2, §4.3).

pub mod http;
mod inspector;
mod runtime;
mod store;

pub use runtime::RuntimeError;
pub use store::TaskStore;

/// Exposed only under `cfg(test)` so sibling-module integration tests
/// (e.g. `manager::dispatcher`'s real-HTTP happy-path test) can drive
/// a single worker tick directly instead of waiting out `TICK_INTERVAL`.
#[cfg(test)]
pub use runtime::process_event as process_event_for_tests;

use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::engine::ContainerEngine;
use crate::queue::EventQueue;
use crate::telemetry::{self, Stats};

const STATS_INTERVAL: Duration = Duration::from_secs(15);

/// Everything the Worker's three concurrent activities share.
pub struct WorkerState {
    pub store: Arc<TaskStore>,
    pub queue: Arc<EventQueue>,
    pub engine: Arc<dyn ContainerEngine>,
    stats: RwLock<Stats>,
}

impl WorkerState {
    pub fn new(engine: Arc<dyn ContainerEngine>) -> Arc<Self> {
        Arc::new(Self {
            store: Arc::new(TaskStore::new()),
            queue: Arc::new(EventQueue::new()),
            engine,
            stats: RwLock::new(Stats::default()),
        })
    }

    pub fn stats(&self) -> Stats {
        *self.stats.read()
    }

    fn refresh_stats(&self) {
        let sample = telemetry::sample(self.store.all().len());
        *self.stats.write() = sample;
    }
}

/// Spawns the runtime loop, inspector, and stats sampler; returns
/// their join handles so the caller can await cooperative shutdown.
pub fn spawn_loops(
    state: Arc<WorkerState>,
    token: CancellationToken,
) -> Vec<tokio::task::JoinHandle<()>> {
    let runtime_handle = {
        let state = state.clone();
        let token = token.clone();
        tokio::spawn(async move {
            runtime::run_loop(state.store.clone(), state.engine.clone(), state.queue.clone(), token).await;
        })
    };

    let inspector_handle = {
        let state = state.clone();
        let token = token.clone();
        tokio::spawn(async move {
            inspector::run_loop(state.store.clone(), state.engine.clone(), token).await;
        })
    };

    let stats_handle = {
        let state = state.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = token.cancelled() => return,
                    _ = tokio::time::sleep(STATS_INTERVAL) => {
                        state.refresh_stats();
                        debug!("refreshed worker stats");
                    }
                }
            }
        })
    };

    vec![runtime_handle, inspector_handle, stats_handle]
}
