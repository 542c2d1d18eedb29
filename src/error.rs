//! Shared HTTP error type for both tiers' routers.
//!
//! Grounded on the teacher's `error.rs`: one `thiserror` enum,
//! `IntoResponse` mapping each variant to a status and a JSON body —
//! here the body is spec.md §6's `ErrResponse` rather than the
//! teacher's ad hoc `{error, message}` shape.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;

use crate::task::ErrResponse;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("malformed request body: {0}")]
    Decode(String),

    #[error("unknown task id: {0}")]
    UnknownTask(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ApiError::Decode(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            ApiError::UnknownTask(id) => (StatusCode::BAD_REQUEST, format!("unknown task id: {id}")),
        };

        let body = ErrResponse {
            http_status_code: status.as_u16(),
            message,
        };

        (status, Json(body)).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
