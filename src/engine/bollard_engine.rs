//! `bollard`-backed implementation of [`ContainerEngine`].
//!
//! Grounded on the teacher's `environment/docker/{container,power,stats}.rs`:
//! same calls (`create_image`, `create_container`, `start_container`,
//! `inspect_container`, `stop_container` + `remove_container`), trimmed
//! to exactly the operations spec.md §4.2 names.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use bollard::container::{
    Config, CreateContainerOptions, LogsOptions, RemoveContainerOptions, StopContainerOptions,
};
use bollard::image::CreateImageOptions;
use bollard::models::{HostConfig, PortBinding as BollardPortBinding, RestartPolicy as BollardRestartPolicy, RestartPolicyNameEnum};
use bollard::Docker;
use futures_util::StreamExt;
use tracing::{debug, info, warn};

use super::{CreateSpec, EngineError, EngineResult, InspectSnapshot, ContainerEngine, ContainerStatus};
use crate::task::{PortBinding, RestartPolicy};

/// Bound on any single blocking call into the engine (spec.md §5:
/// "outbound ... container-engine calls must carry a bounded
/// deadline").
const CALL_TIMEOUT: Duration = Duration::from_secs(20);

async fn with_deadline<T>(
    fut: impl std::future::Future<Output = EngineResult<T>>,
) -> EngineResult<T> {
    match tokio::time::timeout(CALL_TIMEOUT, fut).await {
        Ok(result) => result,
        Err(_) => Err(EngineError::Timeout),
    }
}

pub struct BollardEngine {
    client: Docker,
}

impl BollardEngine {
    pub fn connect() -> EngineResult<Self> {
        let client = Docker::connect_with_local_defaults()
            .map_err(|e| EngineError::Engine(e.to_string()))?;
        Ok(Self { client })
    }
}

fn restart_policy_name(policy: RestartPolicy) -> RestartPolicyNameEnum {
    match policy {
        RestartPolicy::Empty => RestartPolicyNameEnum::EMPTY,
        RestartPolicy::Always => RestartPolicyNameEnum::ALWAYS,
        RestartPolicy::UnlessStopped => RestartPolicyNameEnum::UNLESS_STOPPED,
        RestartPolicy::OnFailure => RestartPolicyNameEnum::ON_FAILURE,
    }
}

#[async_trait]
impl ContainerEngine for BollardEngine {
    async fn pull(&self, image: &str) {
        let options = CreateImageOptions {
            from_image: image,
            ..Default::default()
        };

        let mut stream = self.client.create_image(Some(options), None, None);
        while let Some(result) = stream.next().await {
            match result {
                Ok(info) => {
                    if let Some(status) = info.status {
                        debug!("pull {}: {}", image, status);
                    }
                }
                Err(e) => {
                    // Pull failure does not in itself fail the caller
                    // (create may still succeed against a cached image).
                    warn!("pull {} failed: {}", image, e);
                    break;
                }
            }
        }
    }

    async fn create(&self, spec: &CreateSpec) -> EngineResult<String> {
        let mut exposed_ports = HashMap::new();
        for port in &spec.exposed_ports {
            exposed_ports.insert(port.clone(), HashMap::new());
        }

        let mut port_bindings: HashMap<String, Option<Vec<BollardPortBinding>>> = HashMap::new();
        for (container_port, host_port) in &spec.port_bindings {
            let binding = vec![BollardPortBinding {
                host_ip: Some("0.0.0.0".to_string()),
                host_port: Some(host_port.clone()),
            }];
            port_bindings.insert(format!("{}/tcp", container_port), Some(binding));
        }

        let host_config = HostConfig {
            port_bindings: Some(port_bindings),
            memory: if spec.memory_bytes > 0 {
                Some(spec.memory_bytes as i64)
            } else {
                None
            },
            nano_cpus: if spec.cpu_cores > 0.0 {
                Some(spec.nano_cpus())
            } else {
                None
            },
            restart_policy: Some(BollardRestartPolicy {
                name: Some(restart_policy_name(spec.restart_policy)),
                ..Default::default()
            }),
            ..Default::default()
        };

        let container_config = Config {
            image: Some(spec.image.clone()),
            env: Some(spec.env.clone()),
            exposed_ports: Some(exposed_ports),
            host_config: Some(host_config),
            ..Default::default()
        };

        let options = CreateContainerOptions {
            name: spec.name.as_str(),
            platform: None,
        };

        let response = with_deadline(async {
            self.client
                .create_container(Some(options), container_config)
                .await
                .map_err(|e| EngineError::Engine(e.to_string()))
        })
        .await?;

        info!("created container {} ({})", response.id, spec.image);
        Ok(response.id)
    }

    async fn start(&self, container_id: &str) -> EngineResult<()> {
        with_deadline(async {
            self.client
                .start_container::<String>(container_id, None)
                .await
                .map_err(|e| EngineError::Engine(e.to_string()))
        })
        .await?;
        info!("started container {}", container_id);
        Ok(())
    }

    async fn logs(&self, container_id: &str) {
        let options = LogsOptions::<String> {
            stdout: true,
            stderr: true,
            ..Default::default()
        };

        let mut stream = self.client.logs(container_id, Some(options));
        while let Some(result) = stream.next().await {
            if let Err(e) = result {
                warn!("log stream for {} ended: {}", container_id, e);
                break;
            }
        }
    }

    async fn inspect(&self, container_id: &str) -> EngineResult<InspectSnapshot> {
        let info = with_deadline(async {
            self.client
                .inspect_container(container_id, None)
                .await
                .map_err(|e| match e {
                    bollard::errors::Error::DockerResponseServerError { status_code: 404, .. } => {
                        EngineError::NotFound(container_id.to_string())
                    }
                    other => EngineError::Engine(other.to_string()),
                })
        })
        .await?;

        let running = info
            .state
            .as_ref()
            .and_then(|s| s.running)
            .unwrap_or(false);
        let status = if running {
            ContainerStatus::Running
        } else {
            match info.state.as_ref().and_then(|s| s.status.as_ref()) {
                Some(status) => {
                    let status_str = format!("{:?}", status).to_lowercase();
                    if status_str.contains("exited") {
                        ContainerStatus::Exited
                    } else {
                        ContainerStatus::Other(status_str)
                    }
                }
                None => ContainerStatus::Exited,
            }
        };

        let mut host_ports = HashMap::new();
        if let Some(network_settings) = info.network_settings {
            if let Some(ports) = network_settings.ports {
                for (key, bindings) in ports {
                    let entries = bindings
                        .unwrap_or_default()
                        .into_iter()
                        .map(|b| PortBinding {
                            host_ip: b.host_ip.unwrap_or_default(),
                            host_port: b.host_port.unwrap_or_default(),
                        })
                        .collect();
                    host_ports.insert(key, entries);
                }
            }
        }

        Ok(InspectSnapshot { status, host_ports })
    }

    async fn stop(&self, container_id: &str) -> EngineResult<()> {
        with_deadline(async {
            let options = StopContainerOptions { t: 10 };
            if let Err(e) = self.client.stop_container(container_id, Some(options)).await {
                if !matches!(e, bollard::errors::Error::DockerResponseServerError { status_code: 304, .. }) {
                    return Err(EngineError::Engine(e.to_string()));
                }
            }

            let remove_options = RemoveContainerOptions {
                v: true,
                force: false,
                ..Default::default()
            };
            self.client
                .remove_container(container_id, Some(remove_options))
                .await
                .map_err(|e| EngineError::Engine(e.to_string()))
        })
        .await?;

        info!("stopped and removed container {}", container_id);
        Ok(())
    }
}
