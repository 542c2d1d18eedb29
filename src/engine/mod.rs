//! Container-engine adapter: the minimal contract the core requires
//! from a container runtime (spec.md §4.2).

mod bollard_engine;
pub mod fake;

pub use bollard_engine::BollardEngine;

use std::collections::HashMap;

use async_trait::async_trait;
use thiserror::Error;

use crate::task::{PortBinding, RestartPolicy};

/// Errors the adapter can surface. None of these panic; every failure
/// is returned so the caller can mark the owning task `Failed`
/// (spec.md §7, §9).
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("container not found: {0}")]
    NotFound(String),

    #[error("engine error: {0}")]
    Engine(String),

    #[error("image pull failed: {0}")]
    ImagePull(String),

    #[error("timed out")]
    Timeout,
}

pub type EngineResult<T> = Result<T, EngineError>;

/// Inputs to `ContainerEngine::create`.
#[derive(Debug, Clone)]
pub struct CreateSpec {
    pub name: String,
    pub image: String,
    pub env: Vec<String>,
    pub exposed_ports: Vec<String>,
    /// container_port -> host_port; host IP always defaults to
    /// `0.0.0.0` (spec.md §4.2).
    pub port_bindings: HashMap<String, String>,
    pub memory_bytes: u64,
    pub cpu_cores: f64,
    pub restart_policy: RestartPolicy,
}

impl CreateSpec {
    /// CPU quota in nanoCPUs, per spec.md §4.2: `cpu * 10^9`.
    pub fn nano_cpus(&self) -> i64 {
        (self.cpu_cores * 1_000_000_000.0).round() as i64
    }
}

/// Outcome of a create/start/stop action, always returned rather than
/// panicking (spec.md §4.2, §9).
#[derive(Debug, Clone)]
pub struct EngineOutcome {
    pub action: &'static str,
    pub container_id: String,
    pub result: String,
    pub error: Option<String>,
}

impl EngineOutcome {
    pub fn ok(action: &'static str, container_id: impl Into<String>) -> Self {
        Self {
            action,
            container_id: container_id.into(),
            result: "success".to_string(),
            error: None,
        }
    }

    pub fn err(action: &'static str, container_id: impl Into<String>, error: impl ToString) -> Self {
        Self {
            action,
            container_id: container_id.into(),
            result: "error".to_string(),
            error: Some(error.to_string()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Coarse container status as reported by `inspect`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContainerStatus {
    Running,
    Exited,
    Other(String),
}

/// A point-in-time view of a container, returned by `inspect`.
#[derive(Debug, Clone)]
pub struct InspectSnapshot {
    pub status: ContainerStatus,
    pub host_ports: HashMap<String, Vec<PortBinding>>,
}

/// The capability set the core requires from any container runtime
/// (spec.md §4.2). Implementations must never panic — every failure
/// is returned as `EngineError` so the runtime loop can continue past
/// a single task's failure.
#[async_trait]
pub trait ContainerEngine: Send + Sync {
    /// Idempotent image fetch. Failure is logged but does not in
    /// itself fail the caller — create may still succeed on a cached
    /// image.
    async fn pull(&self, image: &str);

    /// Build a container from `spec`, returning its engine-assigned id.
    async fn create(&self, spec: &CreateSpec) -> EngineResult<String>;

    async fn start(&self, container_id: &str) -> EngineResult<()>;

    /// Drained into the adapter's own output sinks; never blocks the
    /// runtime loop.
    async fn logs(&self, container_id: &str);

    async fn inspect(&self, container_id: &str) -> EngineResult<InspectSnapshot>;

    /// Stop then remove; both must succeed for the action to be
    /// considered successful (spec.md §4.2).
    async fn stop(&self, container_id: &str) -> EngineResult<()>;
}

/// Run the full "start" action (pull, create, start) described in
/// spec.md §4.2/§4.3, returning an `EngineOutcome` regardless of
/// success or failure.
pub async fn run_start(engine: &dyn ContainerEngine, spec: &CreateSpec) -> EngineOutcome {
    engine.pull(&spec.image).await;

    let container_id = match engine.create(spec).await {
        Ok(id) => id,
        Err(e) => return EngineOutcome::err("start", "", e),
    };

    match engine.start(&container_id).await {
        Ok(()) => {
            engine.logs(&container_id).await;
            EngineOutcome::ok("start", container_id)
        }
        Err(e) => EngineOutcome::err("start", container_id, e),
    }
}

/// Run the "stop" action: stop then remove, both required for success.
pub async fn run_stop(engine: &dyn ContainerEngine, container_id: &str) -> EngineOutcome {
    if container_id.is_empty() {
        return EngineOutcome::ok("stop", "");
    }
    match engine.stop(container_id).await {
        Ok(()) => EngineOutcome::ok("stop", container_id),
        Err(e) => EngineOutcome::err("stop", container_id, e),
    }
}
