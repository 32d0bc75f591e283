//! JSON REST API for Dosti.
//!
//! Exposes an axum [`Router`] over a [`dosti_core::ChatEngine`] backed by any
//! [`dosti_core::store::ChatStore`]. The acting user is taken from the
//! `x-dosti-user` header; authentication, TLS and transport concerns are the
//! caller's responsibility.
//!
//! # Mounting
//!
//! ```rust,ignore
//! .nest("/api", dosti_api::api_router(engine.clone()))
//! ```

pub mod conversations;
pub mod error;
pub mod presence;
pub mod session;
pub mod users;

use std::sync::Arc;

use axum::{
  Router,
  routing::{get, post},
};
use dosti_core::{ChatEngine, store::ChatStore};

pub use error::ApiError;
pub use session::{CurrentSession, SESSION_HEADER};

/// Build a fully-materialised API router for `engine`.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<S>(engine: Arc<ChatEngine<S>>) -> Router<()>
where
  S: ChatStore + 'static,
{
  Router::new()
    // Users
    .route("/users", post(users::create::<S>))
    .route("/users/{id}", get(users::get_one::<S>))
    // Presence
    .route("/presence/online", post(presence::online::<S>))
    .route("/presence/offline", post(presence::offline::<S>))
    // Conversations
    .route("/conversations", get(conversations::inbox::<S>))
    .route(
      "/conversations/{peer}/messages",
      get(conversations::history::<S>).post(conversations::send::<S>),
    )
    .route("/conversations/{peer}/seen", post(conversations::mark_seen::<S>))
    .route(
      "/conversations/{peer}/messages/{id}/reactions",
      post(conversations::react::<S>),
    )
    .with_state(engine)
}
