//! In-memory test double for [`ContainerEngine`].
//!
//! Grounded in the teacher's habit of building fixtures directly from
//! hand-constructed structs in `#[cfg(test)]` modules (see
//! `environment/docker/stats.rs`) rather than reaching for a mocking
//! crate.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;

use super::{ContainerEngine, ContainerStatus, CreateSpec, EngineError, EngineResult, InspectSnapshot};

#[derive(Debug, Clone)]
struct FakeContainer {
    status: ContainerStatus,
    image: String,
}

/// A fake container engine whose behavior is entirely driven by the
/// test: containers are created and kept `Running` until the test
/// calls [`FakeEngine::set_status`] or [`FakeEngine::remove`].
pub struct FakeEngine {
    containers: Mutex<HashMap<String, FakeContainer>>,
    next_id: AtomicU64,
    fail_create: Mutex<Option<String>>,
    fail_start: Mutex<Option<String>>,
}

impl Default for FakeEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeEngine {
    pub fn new() -> Self {
        Self {
            containers: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            fail_create: Mutex::new(None),
            fail_start: Mutex::new(None),
        }
    }

    /// Make the next `create` call fail with `message`.
    pub fn fail_next_create(&self, message: impl Into<String>) {
        *self.fail_create.lock() = Some(message.into());
    }

    /// Make the next `start` call fail with `message`.
    pub fn fail_next_start(&self, message: impl Into<String>) {
        *self.fail_start.lock() = Some(message.into());
    }

    pub fn set_status(&self, container_id: &str, status: ContainerStatus) {
        if let Some(c) = self.containers.lock().get_mut(container_id) {
            c.status = status;
        }
    }

    pub fn remove(&self, container_id: &str) {
        self.containers.lock().remove(container_id);
    }

    pub fn contains(&self, container_id: &str) -> bool {
        self.containers.lock().contains_key(container_id)
    }
}

#[async_trait]
impl ContainerEngine for FakeEngine {
    async fn pull(&self, _image: &str) {}

    async fn create(&self, spec: &CreateSpec) -> EngineResult<String> {
        if let Some(message) = self.fail_create.lock().take() {
            return Err(EngineError::Engine(message));
        }
        let id = format!("fake-{}", self.next_id.fetch_add(1, Ordering::SeqCst));
        self.containers.lock().insert(
            id.clone(),
            FakeContainer {
                status: ContainerStatus::Other("created".into()),
                image: spec.image.clone(),
            },
        );
        Ok(id)
    }

    async fn start(&self, container_id: &str) -> EngineResult<()> {
        if let Some(message) = self.fail_start.lock().take() {
            return Err(EngineError::Engine(message));
        }
        let mut containers = self.containers.lock();
        let c = containers
            .get_mut(container_id)
            .ok_or_else(|| EngineError::NotFound(container_id.to_string()))?;
        c.status = ContainerStatus::Running;
        Ok(())
    }

    async fn logs(&self, _container_id: &str) {}

    async fn inspect(&self, container_id: &str) -> EngineResult<InspectSnapshot> {
        let containers = self.containers.lock();
        let c = containers
            .get(container_id)
            .ok_or_else(|| EngineError::NotFound(container_id.to_string()))?;
        Ok(InspectSnapshot {
            status: c.status.clone(),
            host_ports: HashMap::new(),
        })
    }

    async fn stop(&self, container_id: &str) -> EngineResult<()> {
        self.containers.lock().remove(container_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec() -> CreateSpec {
        CreateSpec {
            name: "t".into(),
            image: "nginx".into(),
            env: vec![],
            exposed_ports: vec![],
            port_bindings: HashMap::new(),
            memory_bytes: 0,
            cpu_cores: 0.0,
            restart_policy: Default::default(),
        }
    }

    #[tokio::test]
    async fn create_then_start_then_inspect_running() {
        let engine = FakeEngine::new();
        let id = engine.create(&spec()).await.unwrap();
        engine.start(&id).await.unwrap();
        let snap = engine.inspect(&id).await.unwrap();
        assert_eq!(snap.status, ContainerStatus::Running);
    }

    #[tokio::test]
    async fn failing_create_surfaces_error() {
        let engine = FakeEngine::new();
        engine.fail_next_create("boom");
        let err = engine.create(&spec()).await.unwrap_err();
        assert!(matches!(err, EngineError::Engine(_)));
    }

    #[tokio::test]
    async fn stop_removes_container() {
        let engine = FakeEngine::new();
        let id = engine.create(&spec()).await.unwrap();
        engine.stop(&id).await.unwrap();
        assert!(!engine.contains(&id));
    }
}
