//! Handlers for `/presence` endpoints. The acting user comes from the
//! session header; a user without a record yet is reported, not rejected.

use std::sync::Arc;

use axum::{Json, extract::State};
use dosti_core::{ChatEngine, presence::PresenceUpdate, store::ChatStore};
use serde::Serialize;

use crate::{error::ApiError, session::CurrentSession};

#[derive(Debug, Serialize)]
pub struct PresenceResponse {
  pub update: PresenceUpdate,
}

/// `POST /presence/online`
pub async fn online<S>(
  State(engine): State<Arc<ChatEngine<S>>>,
  CurrentSession(session): CurrentSession,
) -> Result<Json<PresenceResponse>, ApiError>
where
  S: ChatStore + 'static,
{
  let update = engine.connect(&session).await?;
  Ok(Json(PresenceResponse { update }))
}

/// `POST /presence/offline`
pub async fn offline<S>(
  State(engine): State<Arc<ChatEngine<S>>>,
  CurrentSession(session): CurrentSession,
) -> Result<Json<PresenceResponse>, ApiError>
where
  S: ChatStore + 'static,
{
  let update = engine.disconnect(&session).await?;
  Ok(Json(PresenceResponse { update }))
}
