//! Manager HTTP surface: mirrors the Worker's (spec.md §4.6), but
//! against the Manager's pending queue and store.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use bytes::Bytes;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};
use crate::task::{State as TaskState, Task, TaskEvent};

use super::ManagerState;

pub fn router(state: Arc<ManagerState>) -> Router {
    Router::new()
        .route("/tasks", post(create_task).get(list_tasks))
        .route("/tasks/:id", delete(stop_task))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::new().allow_methods(Any).allow_origin(Any))
        .with_state(state)
}

async fn create_task(
    State(state): State<Arc<ManagerState>>,
    body: Bytes,
) -> ApiResult<(StatusCode, Json<Task>)> {
    let event: TaskEvent =
        serde_json::from_slice(&body).map_err(|e| ApiError::Decode(e.to_string()))?;
    let task = event.task.clone();
    state.queue.push(event).await;
    Ok((StatusCode::CREATED, Json(task)))
}

async fn list_tasks(State(state): State<Arc<ManagerState>>) -> Json<Vec<Task>> {
    Json(state.store.all_tasks())
}

async fn stop_task(
    State(state): State<Arc<ManagerState>>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    let task = state
        .store
        .get_task(&id)
        .ok_or_else(|| ApiError::UnknownTask(id.to_string()))?;
    state
        .queue
        .push(TaskEvent::new(TaskState::Completed, task))
        .await;
    Ok(StatusCode::ACCEPTED)
}
