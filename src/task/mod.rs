//! Task data model and the transition discipline that governs it.

mod model;
mod state_machine;

pub use model::{
    HealthCheckSpec, PortBinding, ResourceRequest, RestartPolicy, State, Task, TaskEvent,
};
pub use state_machine::valid_transition;
