//! Environment-driven process configuration (spec.md §6).
//!
//! There is no CLI surface: unlike the teacher's `clap`-based `Cli`,
//! everything here comes from `MINI_KUBE_*` env vars, in the shape of
//! the teacher's other, CLI-free `config.rs` (`Config::from_env`
//! reading `DAEMON_HOST`/`DAEMON_PORT` straight off `std::env`).

use std::env;
use std::net::SocketAddr;

use tracing::error;

/// Which role(s) this process plays.
///
/// `Combined` runs both a Manager and a Worker in one process (the
/// shape of the original `main.go`); `WorkerOnly` runs a bare Worker,
/// addressable by some other process's Manager.
#[derive(Debug, Clone)]
pub enum Config {
    Combined {
        worker_addr: SocketAddr,
        manager_addr: SocketAddr,
    },
    WorkerOnly {
        addr: SocketAddr,
    },
}

impl Config {
    /// Load from the environment, exiting the process on any invalid
    /// or missing port (spec.md §6: "invalid values are fatal at
    /// startup").
    pub fn from_env() -> Self {
        let worker_host = env::var("MINI_KUBE_WORKER_HOST");
        let manager_host = env::var("MINI_KUBE_MANAGER_HOST");

        match (worker_host, manager_host) {
            (Ok(worker_host), Ok(manager_host)) => {
                let worker_port = parse_port("MINI_KUBE_WORKER_PORT");
                let manager_port = parse_port("MINI_KUBE_MANAGER_PORT");
                Config::Combined {
                    worker_addr: resolve(&worker_host, worker_port),
                    manager_addr: resolve(&manager_host, manager_port),
                }
            }
            _ => {
                let host = env::var("MINI_KUBE_HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
                let port = parse_port("MINI_KUBE_PORT");
                Config::WorkerOnly {
                    addr: resolve(&host, port),
                }
            }
        }
    }
}

fn resolve(host: &str, port: u16) -> SocketAddr {
    format!("{host}:{port}")
        .parse()
        .unwrap_or_else(|e| {
            error!("invalid bind address {host}:{port}: {e}");
            std::process::exit(1);
        })
}

fn parse_port(var: &str) -> u16 {
    match env::var(var) {
        Ok(raw) => raw.parse().unwrap_or_else(|e| {
            error!("invalid port in {var}={raw}: {e}");
            std::process::exit(1);
        }),
        Err(_) => {
            error!("missing required env var {var}");
            std::process::exit(1);
        }
    }
}
