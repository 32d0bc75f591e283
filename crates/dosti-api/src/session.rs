//! The acting user of a request.
//!
//! Authentication happens upstream; the authenticated user id arrives in the
//! [`SESSION_HEADER`] header and is turned into an explicit
//! [`dosti_core::Session`] for every engine call.

use axum::{extract::FromRequestParts, http::request::Parts};
use dosti_core::Session;

use crate::error::ApiError;

pub const SESSION_HEADER: &str = "x-dosti-user";

/// Extractor yielding the request's [`Session`]; rejects with 401 when the
/// header is missing, blank or not valid UTF-8.
#[derive(Debug, Clone)]
pub struct CurrentSession(pub Session);

impl<S> FromRequestParts<S> for CurrentSession
where
  S: Send + Sync,
{
  type Rejection = ApiError;

  async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
    parts
      .headers
      .get(SESSION_HEADER)
      .and_then(|v| v.to_str().ok())
      .map(str::trim)
      .filter(|user| !user.is_empty())
      .map(|user| CurrentSession(Session::new(user)))
      .ok_or(ApiError::Unauthorized { header: SESSION_HEADER })
  }
}
