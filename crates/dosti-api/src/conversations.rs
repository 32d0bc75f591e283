//! Handlers for `/conversations` endpoints. Every path names the peer; the
//! conversation itself is derived from the session user and that peer.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/conversations` | Ranked inbox with counterpart presence |
//! | `GET`  | `/conversations/{peer}/messages` | Ordered history |
//! | `POST` | `/conversations/{peer}/messages` | Body: `{"text":"hi"}` |
//! | `POST` | `/conversations/{peer}/seen` | Mark inbound messages seen |
//! | `POST` | `/conversations/{peer}/messages/{id}/reactions` | Body: `{"symbol":"❤️"}`; toggles |

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, State},
  http::StatusCode,
  response::IntoResponse,
};
use dosti_core::{
  ChatEngine, MessageId, UserId,
  directory::ConversationSummary,
  message::Message,
  reactions::ReactionToggle,
  receipts::ReceiptOutcome,
  store::ChatStore,
};
use serde::Deserialize;

use crate::{error::ApiError, session::CurrentSession};

/// `GET /conversations`
pub async fn inbox<S>(
  State(engine): State<Arc<ChatEngine<S>>>,
  CurrentSession(session): CurrentSession,
) -> Result<Json<Vec<ConversationSummary>>, ApiError>
where
  S: ChatStore + 'static,
{
  Ok(Json(engine.inbox(&session).await?))
}

/// `GET /conversations/{peer}/messages`
pub async fn history<S>(
  State(engine): State<Arc<ChatEngine<S>>>,
  CurrentSession(session): CurrentSession,
  Path(peer): Path<UserId>,
) -> Result<Json<Vec<Message>>, ApiError>
where
  S: ChatStore + 'static,
{
  Ok(Json(engine.history(&session, &peer).await?))
}

#[derive(Debug, Deserialize)]
pub struct SendBody {
  pub text: String,
}

/// `POST /conversations/{peer}/messages`
pub async fn send<S>(
  State(engine): State<Arc<ChatEngine<S>>>,
  CurrentSession(session): CurrentSession,
  Path(peer): Path<UserId>,
  Json(body): Json<SendBody>,
) -> Result<impl IntoResponse, ApiError>
where
  S: ChatStore + 'static,
{
  let message = engine.send(&session, &peer, &body.text).await?;
  Ok((StatusCode::CREATED, Json(message)))
}

/// `POST /conversations/{peer}/seen`
pub async fn mark_seen<S>(
  State(engine): State<Arc<ChatEngine<S>>>,
  CurrentSession(session): CurrentSession,
  Path(peer): Path<UserId>,
) -> Result<Json<ReceiptOutcome>, ApiError>
where
  S: ChatStore + 'static,
{
  Ok(Json(engine.mark_seen(&session, &peer).await?))
}

#[derive(Debug, Deserialize)]
pub struct ReactBody {
  pub symbol: String,
}

/// `POST /conversations/{peer}/messages/{id}/reactions`
pub async fn react<S>(
  State(engine): State<Arc<ChatEngine<S>>>,
  CurrentSession(session): CurrentSession,
  Path((peer, message_id)): Path<(UserId, MessageId)>,
  Json(body): Json<ReactBody>,
) -> Result<Json<ReactionToggle>, ApiError>
where
  S: ChatStore + 'static,
{
  Ok(Json(
    engine
      .react(&session, &peer, message_id, &body.symbol)
      .await?,
  ))
}
