//! Presence Tracker: the only writer of a user's online flag and
//! last-seen instant.

use std::sync::Arc;

use serde::Serialize;

use crate::{
  Result,
  id::UserId,
  store::{ChatStore, StoreResultExt as _},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PresenceUpdate {
  Applied,
  /// No user record yet (sign-up still in flight); nothing was written.
  UserMissing,
}

pub struct PresenceTracker<S> {
  store: Arc<S>,
}

impl<S> Clone for PresenceTracker<S> {
  fn clone(&self) -> Self { Self { store: Arc::clone(&self.store) } }
}

impl<S: ChatStore> PresenceTracker<S> {
  pub fn new(store: Arc<S>) -> Self { Self { store } }

  /// Session start: online, last seen now.
  pub async fn set_online(&self, user: &UserId) -> Result<PresenceUpdate> {
    self.update(user, true).await
  }

  /// Session end: offline, last seen now.
  pub async fn set_offline(&self, user: &UserId) -> Result<PresenceUpdate> {
    self.update(user, false).await
  }

  async fn update(&self, user: &UserId, online: bool) -> Result<PresenceUpdate> {
    if self.store.update_presence(user, online).await.lift()? {
      tracing::debug!(user = %user, online, "presence updated");
      Ok(PresenceUpdate::Applied)
    } else {
      tracing::warn!(user = %user, online, "presence update for unknown user ignored");
      Ok(PresenceUpdate::UserMissing)
    }
  }
}
