//! Worker task store: an in-memory map keyed by task identifier.
//!
//! Grounded on the teacher's `server/manager.rs` (`DashMap<String,
//! Arc<Server>>`), narrowed to the Worker's single responsibility:
//! hold the latest known `Task` per id and hand back consistent
//! snapshots for `GET /tasks`.

use dashmap::DashMap;
use uuid::Uuid;

use crate::task::Task;

#[derive(Default)]
pub struct TaskStore {
    tasks: DashMap<Uuid, Task>,
}

impl TaskStore {
    pub fn new() -> Self {
        Self {
            tasks: DashMap::new(),
        }
    }

    pub fn get(&self, id: &Uuid) -> Option<Task> {
        self.tasks.get(id).map(|r| r.value().clone())
    }

    pub fn upsert(&self, task: Task) {
        self.tasks.insert(task.id, task);
    }

    /// A consistent point-in-time snapshot of every stored task
    /// (spec.md §5: reads must observe a consistent snapshot).
    pub fn all(&self) -> Vec<Task> {
        self.tasks.iter().map(|r| r.value().clone()).collect()
    }

    pub fn contains(&self, id: &Uuid) -> bool {
        self.tasks.contains_key(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::Task;

    #[test]
    fn upsert_then_get_round_trips() {
        let store = TaskStore::new();
        let task = Task::new("web", "nginx");
        let id = task.id;
        store.upsert(task);
        assert_eq!(store.get(&id).unwrap().name, "web");
    }

    #[test]
    fn all_returns_every_stored_task() {
        let store = TaskStore::new();
        store.upsert(Task::new("a", "nginx"));
        store.upsert(Task::new("b", "redis"));
        assert_eq!(store.all().len(), 2);
    }

    #[test]
    fn missing_task_is_none() {
        let store = TaskStore::new();
        assert!(store.get(&Uuid::new_v4()).is_none());
    }
}
