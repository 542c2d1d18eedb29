//! The Worker's runtime loop (spec.md §4.3).

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::engine::{run_start, run_stop, ContainerEngine};
use crate::queue::EventQueue;
use crate::task::{valid_transition, State, Task, TaskEvent};

use super::store::TaskStore;

const TICK_INTERVAL: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("illegal transition {from} -> {to} for task {task_id}")]
    IllegalTransition {
        task_id: uuid::Uuid,
        from: State,
        to: State,
    },

    #[error("invalid state {0} for a runtime action")]
    InvalidState(State),
}

/// Process exactly one event against `store`, per spec.md §4.3.
pub async fn process_event(
    store: &TaskStore,
    engine: &dyn ContainerEngine,
    event: TaskEvent,
) -> Result<Task, RuntimeError> {
    let task_id = event.task.id;

    // spec.md §4.3 step 1: look up the persisted task by identifier;
    // if absent, insert the incoming task as the initial record —
    // unconditionally, before the transition is evaluated (matching
    // the Go original's `taskPersisted = &taskQueued; w.Db[ID] =
    // &taskQueued`, which runs ahead of `ValidStateTransition`).
    let persisted = match store.get(&task_id) {
        Some(task) => task,
        None => {
            store.upsert(event.task.clone());
            event.task.clone()
        }
    };
    let persisted_state = persisted.state;

    if !valid_transition(persisted_state, event.state) {
        return Err(RuntimeError::IllegalTransition {
            task_id,
            from: persisted_state,
            to: event.state,
        });
    }

    let mut task = event.task.clone();
    let prior_container_id = persisted.container_id;

    match event.state {
        State::Scheduled => {
            if !prior_container_id.is_empty() {
                let outcome = run_stop(engine, &prior_container_id).await;
                if !outcome.is_success() {
                    warn!(
                        "stopping prior incarnation of {task_id} failed: {:?}",
                        outcome.error
                    );
                }
            }

            let spec = task_to_create_spec(&task);
            let outcome = run_start(engine, &spec).await;
            if outcome.is_success() {
                task.container_id = outcome.container_id;
                task.state = State::Running;
                task.start_time = Some(Utc::now());
                info!("task {task_id} running as container {}", task.container_id);
            } else {
                task.state = State::Failed;
                error!("task {task_id} failed to start: {:?}", outcome.error);
            }
            store.upsert(task.clone());
            Ok(task)
        }
        State::Completed => {
            let outcome = run_stop(engine, &task.container_id).await;
            if !outcome.is_success() {
                warn!("stopping task {task_id} failed: {:?}", outcome.error);
            }
            task.state = State::Completed;
            task.finish_time = Some(Utc::now());
            store.upsert(task.clone());
            Ok(task)
        }
        other => Err(RuntimeError::InvalidState(other)),
    }
}

fn task_to_create_spec(task: &Task) -> crate::engine::CreateSpec {
    crate::engine::CreateSpec {
        name: task.name.clone(),
        image: task.image.clone(),
        env: task.env.clone(),
        exposed_ports: task.exposed_ports.iter().cloned().collect(),
        port_bindings: task.port_bindings.clone(),
        memory_bytes: task.resources.memory,
        cpu_cores: task.resources.cpu,
        restart_policy: task.restart_policy,
    }
}

/// Drains `queue` against `store`/`engine` on a bounded interval,
/// sleeping when the queue is empty, until `token` is cancelled.
pub async fn run_loop(
    store: Arc<TaskStore>,
    engine: Arc<dyn ContainerEngine>,
    queue: Arc<EventQueue>,
    token: CancellationToken,
) {
    loop {
        if token.is_cancelled() {
            return;
        }

        match queue.pop().await {
            Some(event) => match process_event(&store, engine.as_ref(), event).await {
                Ok(task) => debug!("processed event for task {} -> {}", task.id, task.state),
                Err(e) => warn!("event processing rejected: {e}"),
            },
            None => {
                tokio::select! {
                    _ = token.cancelled() => return,
                    _ = tokio::time::sleep(TICK_INTERVAL) => {}
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::fake::FakeEngine;

    fn scheduled_event(task: Task) -> TaskEvent {
        TaskEvent::new(State::Scheduled, task)
    }

    #[tokio::test]
    async fn scheduling_a_new_task_starts_it() {
        let store = TaskStore::new();
        let engine = FakeEngine::new();
        let mut task = Task::new("web", "nginx");
        task.state = State::Scheduled;
        let event = scheduled_event(task.clone());

        let result = process_event(&store, &engine, event).await.unwrap();
        assert_eq!(result.state, State::Running);
        assert!(!result.container_id.is_empty());
        assert!(store.get(&task.id).is_some());
    }

    #[tokio::test]
    async fn failing_create_marks_task_failed() {
        let store = TaskStore::new();
        let engine = FakeEngine::new();
        engine.fail_next_create("no space");
        let mut task = Task::new("web", "nginx");
        task.state = State::Scheduled;
        let event = scheduled_event(task.clone());

        let result = process_event(&store, &engine, event).await.unwrap();
        assert_eq!(result.state, State::Failed);
    }

    #[tokio::test]
    async fn completing_a_running_task_stops_it() {
        let store = TaskStore::new();
        let engine = FakeEngine::new();
        let mut task = Task::new("web", "nginx");
        task.state = State::Running;
        task.container_id = "c1".into();
        store.upsert(task.clone());

        let event = TaskEvent::new(State::Completed, task.clone());
        let result = process_event(&store, &engine, event).await.unwrap();
        assert_eq!(result.state, State::Completed);
        assert!(result.finish_time.is_some());
    }

    #[tokio::test]
    async fn illegal_transition_is_rejected_without_mutation() {
        let store = TaskStore::new();
        let engine = FakeEngine::new();
        let mut task = Task::new("web", "nginx");
        task.state = State::Completed;
        store.upsert(task.clone());

        let event = TaskEvent::new(State::Running, task.clone());
        let err = process_event(&store, &engine, event).await.unwrap_err();
        assert!(matches!(err, RuntimeError::IllegalTransition { .. }));
        assert_eq!(store.get(&task.id).unwrap().state, State::Completed);
    }

    #[tokio::test]
    async fn unknown_task_is_recorded_even_when_the_transition_is_illegal() {
        let store = TaskStore::new();
        let engine = FakeEngine::new();
        let mut task = Task::new("web", "nginx");
        task.state = State::Pending;
        let event = TaskEvent::new(State::Failed, task.clone());

        let err = process_event(&store, &engine, event).await.unwrap_err();
        assert!(matches!(err, RuntimeError::IllegalTransition { .. }));
        // spec.md §4.3 step 1 inserts the initial record unconditionally,
        // ahead of the transition check.
        assert_eq!(store.get(&task.id).unwrap().state, State::Pending);
    }

    #[tokio::test]
    async fn queue_is_fifo() {
        let queue = EventQueue::new();
        let mut ids = Vec::new();
        for _ in 0..3 {
            let task = Task::new("t", "nginx");
            ids.push(task.id);
            queue.push(TaskEvent::new(State::Scheduled, task)).await;
        }
        for expected in ids {
            assert_eq!(queue.pop().await.unwrap().task.id, expected);
        }
        assert!(queue.pop().await.is_none());
    }

    #[tokio::test]
    async fn rescheduling_stops_prior_container_first() {
        let store = TaskStore::new();
        let engine = FakeEngine::new();
        let mut task = Task::new("web", "nginx");
        task.state = State::Failed;
        task.container_id = "old-container".into();
        store.upsert(task.clone());

        let event = TaskEvent::new(State::Scheduled, task.clone());
        let result = process_event(&store, &engine, event).await.unwrap();
        assert_eq!(result.state, State::Running);
        assert_ne!(result.container_id, "old-container");
    }
}
