//! API error type and [`axum::response::IntoResponse`] implementation.

use axum::{
  Json,
  http::StatusCode,
  response::{IntoResponse, Response},
};
use dosti_core::Error as EngineError;
use serde_json::json;
use thiserror::Error;

/// An error returned by an API handler.
#[derive(Debug, Error)]
pub enum ApiError {
  #[error("missing or empty {header} header")]
  Unauthorized { header: &'static str },

  #[error("not found: {0}")]
  NotFound(String),

  #[error("bad request: {0}")]
  BadRequest(String),

  #[error(transparent)]
  Engine(#[from] EngineError),
}

impl ApiError {
  pub fn status(&self) -> StatusCode {
    match self {
      ApiError::Unauthorized { .. } => StatusCode::UNAUTHORIZED,
      ApiError::NotFound(_) => StatusCode::NOT_FOUND,
      ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
      ApiError::Engine(e) => match e {
        EngineError::InvalidParticipants
        | EngineError::EmptyMessage
        | EngineError::InvalidReaction => StatusCode::BAD_REQUEST,
        EngineError::ParticipantMismatch { .. } | EngineError::NotAParticipant { .. } => {
          StatusCode::FORBIDDEN
        }
        EngineError::MessageNotFound(_) => StatusCode::NOT_FOUND,
        EngineError::UserExists(_) => StatusCode::CONFLICT,
        EngineError::MalformedDocument { .. } | EngineError::StoreUnavailable(_) => {
          StatusCode::SERVICE_UNAVAILABLE
        }
      },
    }
  }
}

/// Lift a backend error into [`ApiError::Engine`].
pub(crate) fn store_error<E: Into<EngineError>>(e: E) -> ApiError { ApiError::Engine(e.into()) }

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let status = self.status();
    if status.is_server_error() {
      tracing::error!(error = %self, "request failed");
    }
    (status, Json(json!({ "error": self.to_string() }))).into_response()
  }
}
