//! Per-session context handed to the engine explicitly.
//!
//! The upstream session collaborator authenticates the user; the engine
//! trusts the identifier it carries.

use serde::{Deserialize, Serialize};

use crate::{
  Result,
  id::{ConversationId, UserId},
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
  pub user: UserId,
}

impl Session {
  pub fn new(user: impl Into<UserId>) -> Self { Self { user: user.into() } }

  pub fn user(&self) -> &UserId { &self.user }

  /// The conversation between this session's user and `peer`.
  pub fn conversation_with(&self, peer: &UserId) -> Result<ConversationId> {
    ConversationId::between(&self.user, peer)
  }
}
