//! Manager-side state: task store, event store, worker list, and the
//! worker<->task cross-maps (spec.md §2, §4.4, §5).

use std::collections::HashSet;

use dashmap::DashMap;
use parking_lot::RwLock;
use uuid::Uuid;

use crate::task::{Task, TaskEvent};

#[derive(Default)]
pub struct ManagerStore {
    tasks: DashMap<Uuid, Task>,
    events: DashMap<Uuid, TaskEvent>,
    workers: RwLock<Vec<String>>,
    worker_tasks: DashMap<String, HashSet<Uuid>>,
    task_worker: DashMap<Uuid, String>,
}

impl ManagerStore {
    pub fn new(workers: Vec<String>) -> Self {
        Self {
            tasks: DashMap::new(),
            events: DashMap::new(),
            workers: RwLock::new(workers),
            worker_tasks: DashMap::new(),
            task_worker: DashMap::new(),
        }
    }

    pub fn workers(&self) -> Vec<String> {
        self.workers.read().clone()
    }

    pub fn worker_count(&self) -> usize {
        self.workers.read().len()
    }

    pub fn get_task(&self, id: &Uuid) -> Option<Task> {
        self.tasks.get(id).map(|r| r.value().clone())
    }

    pub fn upsert_task(&self, task: Task) {
        self.tasks.insert(task.id, task);
    }

    pub fn all_tasks(&self) -> Vec<Task> {
        self.tasks.iter().map(|r| r.value().clone()).collect()
    }

    pub fn record_event(&self, event: TaskEvent) {
        self.events.insert(event.id, event);
    }

    /// Assign `task_id` to `worker`, keeping both cross-maps
    /// consistent (spec.md §3 invariant: `taskWorker[t] = w ⟺ t ∈
    /// workerTasks[w]`).
    pub fn assign(&self, task_id: Uuid, worker: &str) {
        self.task_worker.insert(task_id, worker.to_string());
        self.worker_tasks
            .entry(worker.to_string())
            .or_default()
            .insert(task_id);
    }

    pub fn worker_for(&self, task_id: &Uuid) -> Option<String> {
        self.task_worker.get(task_id).map(|r| r.value().clone())
    }

    pub fn tasks_for_worker(&self, worker: &str) -> HashSet<Uuid> {
        self.worker_tasks
            .get(worker)
            .map(|r| r.value().clone())
            .unwrap_or_default()
    }

    /// Drop the worker assignment for a task that reached a terminal
    /// state (spec.md §9 open question: GC on completion).
    pub fn unassign(&self, task_id: &Uuid) {
        if let Some((_, worker)) = self.task_worker.remove(task_id) {
            if let Some(mut tasks) = self.worker_tasks.get_mut(&worker) {
                tasks.remove(task_id);
            }
        }
    }

    /// Overwrite the Worker-authoritative fields of a reconciled task,
    /// preserving the Manager's record of desired configuration
    /// (spec.md §4.5).
    pub fn reconcile_task(&self, reported: &Task) {
        if let Some(mut entry) = self.tasks.get_mut(&reported.id) {
            entry.state = reported.state;
            entry.start_time = reported.start_time;
            entry.finish_time = reported.finish_time;
            entry.container_id = reported.container_id.clone();
            entry.host_ports = reported.host_ports.clone();
        }
    }
}
