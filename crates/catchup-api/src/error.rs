//! API error type and [`axum::response::IntoResponse`] implementation.

use axum::{
  Json,
  http::StatusCode,
  response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

/// An error returned by an API handler.
#[derive(Debug, Error)]
pub enum ApiError {
  #[error("bad request: {0}")]
  BadRequest(String),

  #[error(transparent)]
  Engine(#[from] catchup_core::Error),
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let status = match &self {
      ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
      ApiError::Engine(
        catchup_core::Error::InvalidEvent { .. } | catchup_core::Error::InvalidRange { .. },
      ) => StatusCode::UNPROCESSABLE_ENTITY,
      ApiError::Engine(e) if e.is_infrastructure() => StatusCode::SERVICE_UNAVAILABLE,
      ApiError::Engine(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if status.is_server_error() {
      tracing::warn!(%status, "request failed: {self}");
    }
    (status, Json(json!({ "error": self.to_string() }))).into_response()
  }
}
