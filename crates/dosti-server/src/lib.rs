//! HTTP front end for Dosti.
//!
//! Mounts the [`dosti_api`] router under `/api` with request tracing, over a
//! [`ChatEngine`] backed by any [`ChatStore`].

use std::{path::PathBuf, sync::Arc};

use axum::Router;
use dosti_core::{ChatEngine, store::ChatStore};
use serde::Deserialize;
use tower_http::trace::TraceLayer;

// ─── Configuration ────────────────────────────────────────────────────────────

/// Runtime server configuration, deserialised from `config.toml` and
/// `DOSTI_*` environment variables.
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
  pub host:          String,
  pub port:          u16,
  pub store_path:    PathBuf,
  /// Change notifications buffered per live subscriber.
  pub feed_capacity: usize,
}

impl ServerConfig {
  pub fn address(&self) -> String { format!("{}:{}", self.host, self.port) }
}

// ─── Router ───────────────────────────────────────────────────────────────────

/// Build the application [`Router`].
pub fn app<S>(engine: Arc<ChatEngine<S>>) -> Router
where
  S: ChatStore + 'static,
{
  Router::new()
    .nest("/api", dosti_api::api_router(engine))
    .layer(TraceLayer::new_for_http())
}

#[cfg(test)]
mod tests {
  use super::*;

  use axum::{
    body::Body,
    http::{Request, StatusCode, header},
  };
  use dosti_api::SESSION_HEADER;
  use dosti_store_sqlite::SqliteStore;
  use serde_json::{Value, json};
  use tower::ServiceExt as _;

  async fn make_app() -> Router {
    let store = SqliteStore::open_in_memory().await.unwrap();
    app(Arc::new(ChatEngine::new(Arc::new(store))))
  }

  async fn call(
    app: &Router,
    method: &str,
    uri: &str,
    user: Option<&str>,
    body: Option<Value>,
  ) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(user) = user {
      builder = builder.header(SESSION_HEADER, user);
    }
    let req = match body {
      Some(body) => builder
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap(),
      None => builder.body(Body::empty()).unwrap(),
    };
    let resp = app.clone().oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
      Value::Null
    } else {
      serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, value)
  }

  async fn sign_up(app: &Router, id: &str, name: &str) {
    let (status, _) = call(
      app,
      "POST",
      "/api/users",
      None,
      Some(json!({ "user_id": id, "display_name": name })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
  }

  // ── Users ───────────────────────────────────────────────────────────────────

  #[tokio::test]
  async fn sign_up_starts_trial_online() {
    let app = make_app().await;
    let (status, body) = call(
      &app,
      "POST",
      "/api/users",
      None,
      Some(json!({ "user_id": "alice", "display_name": "Alice" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["user_id"], "alice");
    assert_eq!(body["is_online"], true);
    assert_eq!(body["is_pro"], false);
    assert_eq!(body["trial_days_left"], 3);

    let (status, body) = call(&app, "GET", "/api/users/alice", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["display_name"], "Alice");
  }

  #[tokio::test]
  async fn duplicate_sign_up_conflicts() {
    let app = make_app().await;
    sign_up(&app, "alice", "Alice").await;
    let (status, body) = call(
      &app,
      "POST",
      "/api/users",
      None,
      Some(json!({ "user_id": "alice", "display_name": "Other" })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body["error"].as_str().is_some());
  }

  #[tokio::test]
  async fn unknown_user_is_404() {
    let app = make_app().await;
    let (status, _) = call(&app, "GET", "/api/users/nobody", None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
  }

  // ── Sessions and presence ───────────────────────────────────────────────────

  #[tokio::test]
  async fn missing_session_is_401() {
    let app = make_app().await;
    let (status, body) = call(&app, "GET", "/api/conversations", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(body["error"].as_str().unwrap().contains(SESSION_HEADER));
  }

  #[tokio::test]
  async fn presence_flips_and_tolerates_missing_users() {
    let app = make_app().await;
    sign_up(&app, "alice", "Alice").await;

    let (status, body) = call(&app, "POST", "/api/presence/offline", Some("alice"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["update"], "applied");
    let (_, user) = call(&app, "GET", "/api/users/alice", None, None).await;
    assert_eq!(user["is_online"], false);

    let (status, body) = call(&app, "POST", "/api/presence/online", Some("ghost"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["update"], "user_missing");
  }

  // ── Conversations ───────────────────────────────────────────────────────────

  #[tokio::test]
  async fn send_open_react_flow() {
    let app = make_app().await;
    sign_up(&app, "alice", "Alice").await;
    sign_up(&app, "bob", "Bob").await;

    let (status, message) = call(
      &app,
      "POST",
      "/api/conversations/bob/messages",
      Some("alice"),
      Some(json!({ "text": "hi" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(message["is_seen"], false);
    let message_id = message["message_id"].as_str().unwrap().to_owned();

    let (_, inbox) = call(&app, "GET", "/api/conversations", Some("bob"), None).await;
    assert_eq!(inbox[0]["counterpart_id"], "alice");
    assert_eq!(inbox[0]["counterpart_name"], "Alice");
    assert_eq!(inbox[0]["last_message"], "hi");
    assert_eq!(inbox[0]["unread"], true);

    let (status, outcome) =
      call(&app, "POST", "/api/conversations/alice/seen", Some("bob"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(outcome["marked_seen"], json!([message_id]));
    assert_eq!(outcome["unread_cleared"], true);

    let (_, history) =
      call(&app, "GET", "/api/conversations/bob/messages", Some("alice"), None).await;
    assert_eq!(history[0]["is_seen"], true);

    let uri = format!("/api/conversations/alice/messages/{message_id}/reactions");
    let (status, toggle) =
      call(&app, "POST", &uri, Some("bob"), Some(json!({ "symbol": "🔥" }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(toggle["added"], true);
    assert_eq!(toggle["reactions"]["🔥"], json!(["bob"]));

    let (_, toggle) =
      call(&app, "POST", &uri, Some("bob"), Some(json!({ "symbol": "🔥" }))).await;
    assert_eq!(toggle["added"], false);
    assert_eq!(toggle["reactions"], json!({}));
  }

  #[tokio::test]
  async fn validation_errors_are_400() {
    let app = make_app().await;

    let (status, _) = call(
      &app,
      "POST",
      "/api/conversations/bob/messages",
      Some("alice"),
      Some(json!({ "text": "  " })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = call(
      &app,
      "POST",
      "/api/conversations/alice/messages",
      Some("alice"),
      Some(json!({ "text": "note to self" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, message) = call(
      &app,
      "POST",
      "/api/conversations/bob/messages",
      Some("alice"),
      Some(json!({ "text": "hi" })),
    )
    .await;
    let uri = format!(
      "/api/conversations/alice/messages/{}/reactions",
      message["message_id"].as_str().unwrap()
    );
    let (status, _) = call(&app, "POST", &uri, Some("bob"), Some(json!({ "symbol": "" }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
  }

  #[tokio::test]
  async fn reaction_on_unknown_message_is_404() {
    let app = make_app().await;
    let uri = "/api/conversations/alice/messages/00000000-0000-0000-0000-000000000000/reactions";
    let (status, _) = call(&app, "POST", uri, Some("bob"), Some(json!({ "symbol": "👍" }))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
  }
}
