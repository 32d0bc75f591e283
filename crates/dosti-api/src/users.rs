//! Handlers for `/users` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/users` | Sign-up; starts the free trial. 409 if the id is taken |
//! | `GET`  | `/users/{id}` | Profile, presence and trial days left; 404 if not found |

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, State},
  http::StatusCode,
  response::IntoResponse,
};
use chrono::Utc;
use dosti_core::{
  ChatEngine, UserId,
  store::ChatStore,
  user::{NewUser, User},
};
use serde::{Deserialize, Serialize};

use crate::error::{ApiError, store_error};

/// A user record as served to clients.
#[derive(Debug, Serialize)]
pub struct UserView {
  #[serde(flatten)]
  pub user:            User,
  pub trial_days_left: Option<i64>,
}

impl UserView {
  fn at_now(user: User) -> Self {
    let trial_days_left = user.trial_days_left(Utc::now());
    Self { user, trial_days_left }
  }
}

// ─── Create ───────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct CreateBody {
  pub user_id:      UserId,
  pub display_name: String,
  #[serde(default)]
  pub avatar_url:   Option<String>,
  #[serde(default)]
  pub bio:          Option<String>,
}

/// `POST /users`
pub async fn create<S>(
  State(engine): State<Arc<ChatEngine<S>>>,
  Json(body): Json<CreateBody>,
) -> Result<impl IntoResponse, ApiError>
where
  S: ChatStore + 'static,
{
  if body.user_id.is_blank() {
    return Err(ApiError::BadRequest("user_id must not be empty".into()));
  }
  if body.display_name.trim().is_empty() {
    return Err(ApiError::BadRequest("display_name must not be empty".into()));
  }

  let mut input = NewUser::new(body.user_id, body.display_name).with_trial(Utc::now());
  input.avatar_url = body.avatar_url;
  input.bio = body.bio;

  let user = engine.store().create_user(input).await.map_err(store_error)?;
  tracing::info!(user = %user.user_id, "user signed up");
  Ok((StatusCode::CREATED, Json(UserView::at_now(user))))
}

// ─── Get one ──────────────────────────────────────────────────────────────────

/// `GET /users/{id}`
pub async fn get_one<S>(
  State(engine): State<Arc<ChatEngine<S>>>,
  Path(id): Path<UserId>,
) -> Result<Json<UserView>, ApiError>
where
  S: ChatStore + 'static,
{
  let user = engine
    .store()
    .get_user(&id)
    .await
    .map_err(store_error)?
    .ok_or_else(|| ApiError::NotFound(format!("user {id} not found")))?;
  Ok(Json(UserView::at_now(user)))
}
