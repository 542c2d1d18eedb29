//! HTTP client for Manager -> Worker calls (spec.md §4.4, §4.5).
//!
//! Grounded on the teacher's `api/client.rs` shape (a thin wrapper
//! around a `reqwest::Client` with bounded timeouts and typed errors),
//! trimmed down: no retry/backoff here, since spec.md §4.4 step 5
//! handles transport failure by re-enqueueing the event at the
//! dispatch-loop level rather than retrying inside the client.

use std::time::Duration;

use reqwest::{Client, StatusCode};
use thiserror::Error;

use crate::task::{ErrResponse, Task, TaskEvent};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum WorkerClientError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("worker rejected event: {0}")]
    Rejected(String),
}

pub struct WorkerClient {
    http: Client,
}

impl Default for WorkerClient {
    fn default() -> Self {
        Self::new()
    }
}

impl WorkerClient {
    pub fn new() -> Self {
        let http = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .connect_timeout(REQUEST_TIMEOUT)
            .build()
            .expect("building the default reqwest client should never fail");
        Self { http }
    }

    /// POST an event to `worker` (a `host:port` base). Ok(Task) on
    /// 201; `Rejected` if the Worker returned any other status
    /// (decode failure, etc.) — per spec.md §4.4 step 6, these are not
    /// retried.
    pub async fn dispatch(&self, worker: &str, event: &TaskEvent) -> Result<Task, WorkerClientError> {
        let response = self
            .http
            .post(format!("http://{worker}/tasks"))
            .json(event)
            .send()
            .await?;

        if response.status() != StatusCode::CREATED {
            let message = response
                .json::<ErrResponse>()
                .await
                .map(|e| e.message)
                .unwrap_or_else(|_| "unknown worker error".to_string());
            return Err(WorkerClientError::Rejected(message));
        }

        Ok(response.json::<Task>().await?)
    }

    /// GET the full task list from `worker`.
    pub async fn fetch_tasks(&self, worker: &str) -> Result<Vec<Task>, WorkerClientError> {
        let response = self
            .http
            .get(format!("http://{worker}/tasks"))
            .send()
            .await?;
        Ok(response.json::<Vec<Task>>().await?)
    }
}
