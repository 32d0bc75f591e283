//! Error types for `dosti-core`.

use thiserror::Error;

use crate::id::{MessageId, UserId};

#[derive(Debug, Error)]
pub enum Error {
  #[error("a conversation needs two distinct, non-empty participants")]
  InvalidParticipants,

  #[error("message text is empty")]
  EmptyMessage,

  #[error("{sender} -> {receiver} does not belong to conversation {conversation}")]
  ParticipantMismatch {
    conversation: String,
    sender:       UserId,
    receiver:     UserId,
  },

  #[error("{user} is not a participant of conversation {conversation}")]
  NotAParticipant { conversation: String, user: UserId },

  #[error("message not found: {0}")]
  MessageNotFound(MessageId),

  #[error("reaction symbol is empty")]
  InvalidReaction,

  #[error("user already exists: {0}")]
  UserExists(UserId),

  /// A stored record did not match its data contract.
  #[error("malformed {kind} document: {reason}")]
  MalformedDocument { kind: &'static str, reason: String },

  #[error("store unavailable: {0}")]
  StoreUnavailable(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl Error {
  /// Caller bugs: rejected up front and never worth retrying.
  pub fn is_validation(&self) -> bool {
    matches!(
      self,
      Self::InvalidParticipants
        | Self::EmptyMessage
        | Self::ParticipantMismatch { .. }
        | Self::NotAParticipant { .. }
        | Self::InvalidReaction
    )
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
