//! Participant and conversation identifiers.
//!
//! A conversation between two users is addressed by an identifier derived
//! from both participants, so either side computes the same key without
//! any lookup.

use std::fmt;

use serde::{Deserialize, Serialize, Serializer};
use uuid::Uuid;

use crate::{Error, Result};

/// Joins the two participant ids inside a conversation key.
pub const SEPARATOR: char = '_';

/// Store-assigned message identifier.
pub type MessageId = Uuid;

// ─── UserId ──────────────────────────────────────────────────────────────────

/// Opaque, stable user identifier issued by the auth collaborator.
#[derive(
  Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
  pub fn new(id: impl Into<String>) -> Self { Self(id.into()) }

  pub fn as_str(&self) -> &str { &self.0 }

  pub fn is_blank(&self) -> bool { self.0.trim().is_empty() }
}

impl fmt::Display for UserId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.0)
  }
}

impl From<&str> for UserId {
  fn from(s: &str) -> Self { Self(s.to_owned()) }
}

impl From<String> for UserId {
  fn from(s: String) -> Self { Self(s) }
}

// ─── ConversationId ──────────────────────────────────────────────────────────

/// Canonical identifier of the conversation between exactly two users.
///
/// Keeps the ordered participant pair alongside the rendered key so the
/// participants never have to be recovered by splitting the key. Ids may
/// contain the separator, so two different pairs can render the same key;
/// stores scope records by [`participants`](Self::participants), not by
/// [`key`](Self::key).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConversationId {
  low:  UserId,
  high: UserId,
  key:  String,
}

impl ConversationId {
  /// Derive the conversation key for `a` and `b`: `min(a,b) _ max(a,b)`.
  ///
  /// Fails with [`Error::InvalidParticipants`] when either id is blank or
  /// both are the same user.
  pub fn between(a: &UserId, b: &UserId) -> Result<Self> {
    if a.is_blank() || b.is_blank() || a == b {
      return Err(Error::InvalidParticipants);
    }
    let (low, high) = if a < b { (a, b) } else { (b, a) };
    Ok(Self {
      key:  format!("{low}{SEPARATOR}{high}"),
      low:  low.clone(),
      high: high.clone(),
    })
  }

  pub fn key(&self) -> &str { &self.key }

  /// Both participants, lexicographically ordered.
  pub fn participants(&self) -> (&UserId, &UserId) { (&self.low, &self.high) }

  pub fn includes(&self, user: &UserId) -> bool {
    &self.low == user || &self.high == user
  }

  /// The other participant, or `None` if `user` is not part of this
  /// conversation.
  pub fn counterpart_of(&self, user: &UserId) -> Option<&UserId> {
    if &self.low == user {
      Some(&self.high)
    } else if &self.high == user {
      Some(&self.low)
    } else {
      None
    }
  }
}

impl fmt::Display for ConversationId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.key)
  }
}

impl Serialize for ConversationId {
  fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(&self.key)
  }
}

/// The Identity Resolver: order-independent conversation key for two users.
pub fn conversation_id(a: &UserId, b: &UserId) -> Result<ConversationId> {
  ConversationId::between(a, b)
}
