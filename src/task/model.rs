//! Wire and domain types for tasks and task events.

use std::collections::{HashMap, HashSet};
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use uuid::Uuid;

/// Task lifecycle state.
///
/// The wire ordinal order (`Pending=0, Scheduled=1, Completed=2,
/// Running=3, Failed=4`) does not match declaration order and is fixed
/// by the external interface, not by us — it is carried straight from
/// the original Go `iota` block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum State {
    Pending,
    Scheduled,
    Running,
    Completed,
    Failed,
}

impl State {
    fn ordinal(self) -> u8 {
        match self {
            State::Pending => 0,
            State::Scheduled => 1,
            State::Completed => 2,
            State::Running => 3,
            State::Failed => 4,
        }
    }

    fn from_ordinal(v: u8) -> Option<Self> {
        match v {
            0 => Some(State::Pending),
            1 => Some(State::Scheduled),
            2 => Some(State::Completed),
            3 => Some(State::Running),
            4 => Some(State::Failed),
            _ => None,
        }
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            State::Pending => "Pending",
            State::Scheduled => "Scheduled",
            State::Running => "Running",
            State::Completed => "Completed",
            State::Failed => "Failed",
        };
        write!(f, "{}", s)
    }
}

impl Serialize for State {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.ordinal())
    }
}

impl<'de> Deserialize<'de> for State {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let v = u8::deserialize(deserializer)?;
        State::from_ordinal(v).ok_or_else(|| de::Error::custom(format!("invalid State ordinal: {}", v)))
    }
}

/// Restart policy carried through to the container engine. The core
/// makes no restart decisions of its own (spec.md §9).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RestartPolicy {
    #[default]
    #[serde(rename = "")]
    Empty,
    Always,
    UnlessStopped,
    OnFailure,
}

/// Observed host-port binding for a container port, as reported by the
/// engine's inspect call.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PortBinding {
    pub host_ip: String,
    pub host_port: String,
}

/// Resource requests for a task (§3).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ResourceRequest {
    /// Memory in bytes.
    pub memory: u64,
    /// Disk in bytes.
    pub disk: u64,
    /// Fractional CPU cores (1.0 == one core).
    pub cpu: f64,
}

/// Inert health-check descriptor. Accepted, stored, and echoed back;
/// no loop in this crate acts on it (see SPEC_FULL.md §3).
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct HealthCheckSpec {
    pub command: Vec<String>,
    pub interval_secs: u64,
    pub retries: u32,
}

/// A declared container workload with identity and desired configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    #[serde(rename = "ID")]
    pub id: Uuid,
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "State")]
    pub state: State,
    #[serde(rename = "Image")]
    pub image: String,
    #[serde(rename = "Resources")]
    pub resources: ResourceRequest,
    #[serde(rename = "ExposedPorts", default)]
    pub exposed_ports: HashSet<String>,
    /// Container port -> host port string.
    #[serde(rename = "PortBindings", default)]
    pub port_bindings: HashMap<String, String>,
    #[serde(rename = "RestartPolicy", default)]
    pub restart_policy: RestartPolicy,
    #[serde(rename = "Env", default)]
    pub env: Vec<String>,

    #[serde(rename = "StartTime", default)]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(rename = "FinishTime", default)]
    pub finish_time: Option<DateTime<Utc>>,
    #[serde(rename = "ContainerID", default)]
    pub container_id: String,
    /// Observed host-port map, keyed by `"<port>/<proto>"`.
    #[serde(rename = "HostPorts", default)]
    pub host_ports: HashMap<String, Vec<PortBinding>>,
    #[serde(rename = "RestartCount", default)]
    pub restart_count: u32,
    #[serde(rename = "HealthCheck", default)]
    pub health_check: Option<HealthCheckSpec>,
}

impl Task {
    pub fn new(name: impl Into<String>, image: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            state: State::Pending,
            image: image.into(),
            resources: ResourceRequest::default(),
            exposed_ports: HashSet::new(),
            port_bindings: HashMap::new(),
            restart_policy: RestartPolicy::default(),
            env: Vec::new(),
            start_time: None,
            finish_time: None,
            container_id: String::new(),
            host_ports: HashMap::new(),
            restart_count: 0,
            health_check: None,
        }
    }

    /// Adds `port` (as a TCP port) to the set of exposed container
    /// ports, in `"<port>/tcp"` form (spec.md §3: `ExposedPorts` is a
    /// set of container ports; the original builds these via
    /// `nat.NewPort("tcp", strconv.Itoa(port))`).
    pub fn expose_tcp_port(&mut self, port: u16) -> &mut Self {
        self.exposed_ports.insert(format!("{port}/tcp"));
        self
    }
}

/// A request for a task transition. The only currency exchanged
/// between client<->Manager and Manager<->Worker.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TaskEvent {
    #[serde(rename = "ID")]
    pub id: Uuid,
    #[serde(rename = "State")]
    pub state: State,
    #[serde(rename = "Timestamp")]
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "Task")]
    pub task: Task,
}

impl TaskEvent {
    pub fn new(state: State, task: Task) -> Self {
        Self {
            id: Uuid::new_v4(),
            state,
            timestamp: Utc::now(),
            task,
        }
    }
}

/// `{ HTTPStatusCode, Message }` error body for non-2xx HTTP responses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrResponse {
    #[serde(rename = "HTTPStatusCode")]
    pub http_status_code: u16,
    #[serde(rename = "Message")]
    pub message: String,
}
