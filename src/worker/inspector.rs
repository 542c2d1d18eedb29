//! Periodic drift detector: polls the engine for every `Running` task
//! and reconciles the store against what the engine actually reports
//! (spec.md §4.3 inspection loop).

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::engine::{ContainerEngine, ContainerStatus};
use crate::task::State;

use super::store::TaskStore;

const INSPECT_INTERVAL: Duration = Duration::from_secs(15);

/// Runs one inspection pass: for every `Running` task, inspect its
/// container and mark `Failed` on error or `exited` status, otherwise
/// refresh its observed host-port map. Returns the number of tasks
/// marked `Failed` in this pass (used by tests).
pub async fn inspect_once(store: &TaskStore, engine: &dyn ContainerEngine) -> usize {
    let mut failed = 0;
    for mut task in store.all().into_iter().filter(|t| t.state == State::Running) {
        match engine.inspect(&task.container_id).await {
            Ok(snapshot) => match snapshot.status {
                ContainerStatus::Exited => {
                    warn!("task {} container exited, marking Failed", task.id);
                    task.state = State::Failed;
                    task.restart_count += 1;
                    failed += 1;
                    store.upsert(task);
                }
                _ => {
                    task.host_ports = snapshot.host_ports;
                    store.upsert(task);
                }
            },
            Err(e) => {
                warn!("inspect failed for task {}: {e}", task.id);
                task.state = State::Failed;
                task.restart_count += 1;
                failed += 1;
                store.upsert(task);
            }
        }
    }
    failed
}

pub async fn run_loop(store: Arc<TaskStore>, engine: Arc<dyn ContainerEngine>, token: CancellationToken) {
    loop {
        tokio::select! {
            _ = token.cancelled() => return,
            _ = tokio::time::sleep(INSPECT_INTERVAL) => {
                let failed = inspect_once(&store, engine.as_ref()).await;
                if failed > 0 {
                    debug!("inspection pass marked {failed} task(s) Failed");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::fake::FakeEngine;
    use crate::task::Task;

    #[tokio::test]
    async fn exited_container_marks_task_failed() {
        let store = TaskStore::new();
        let engine = FakeEngine::new();
        let id = engine.create(&dummy_spec()).await.unwrap();
        engine.start(&id).await.unwrap();
        engine.set_status(&id, ContainerStatus::Exited);

        let mut task = Task::new("web", "nginx");
        task.state = State::Running;
        task.container_id = id;
        store.upsert(task.clone());

        inspect_once(&store, &engine).await;
        assert_eq!(store.get(&task.id).unwrap().state, State::Failed);
    }

    #[tokio::test]
    async fn missing_container_marks_task_failed() {
        let store = TaskStore::new();
        let engine = FakeEngine::new();

        let mut task = Task::new("web", "nginx");
        task.state = State::Running;
        task.container_id = "does-not-exist".into();
        store.upsert(task.clone());

        inspect_once(&store, &engine).await;
        assert_eq!(store.get(&task.id).unwrap().state, State::Failed);
    }

    #[tokio::test]
    async fn running_container_refreshes_host_ports_and_stays_running() {
        let store = TaskStore::new();
        let engine = FakeEngine::new();
        let id = engine.create(&dummy_spec()).await.unwrap();
        engine.start(&id).await.unwrap();

        let mut task = Task::new("web", "nginx");
        task.state = State::Running;
        task.container_id = id;
        store.upsert(task.clone());

        inspect_once(&store, &engine).await;
        assert_eq!(store.get(&task.id).unwrap().state, State::Running);
    }

    #[tokio::test]
    async fn non_running_tasks_are_left_alone() {
        let store = TaskStore::new();
        let engine = FakeEngine::new();
        let mut task = Task::new("web", "nginx");
        task.state = State::Completed;
        store.upsert(task.clone());

        let failed = inspect_once(&store, &engine).await;
        assert_eq!(failed, 0);
    }

    fn dummy_spec() -> crate::engine::CreateSpec {
        crate::engine::CreateSpec {
            name: "t".into(),
            image: "nginx".into(),
            env: vec![],
            exposed_ports: vec![],
            port_bindings: Default::default(),
            memory_bytes: 0,
            cpu_cores: 0.0,
            restart_policy: Default::default(),
        }
    }
}
