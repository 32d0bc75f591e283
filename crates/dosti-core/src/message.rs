//! Messages and their reaction maps.
//!
//! A message is immutable once stored except for two fields: the receipt
//! (`is_seen`, `seen_at`), written by the receipt tracker, and the reaction
//! map, written by the reaction aggregator.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
  Error, Result,
  id::{ConversationId, MessageId, UserId},
};

// ─── Reactions ───────────────────────────────────────────────────────────────

/// Symbols offered by the reaction picker. Any non-empty symbol is accepted.
pub const DEFAULT_REACTIONS: [&str; 6] = ["❤️", "😂", "👍", "😢", "🎉", "🔥"];

type RawReactions = BTreeMap<String, BTreeSet<UserId>>;

/// Reaction symbol → set of reacting users.
///
/// Never holds a symbol mapped to an empty set; deserialising such a map
/// fails.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawReactions", into = "RawReactions")]
pub struct ReactionMap(RawReactions);

impl ReactionMap {
  pub fn new() -> Self { Self::default() }

  /// Build from `(symbol, user)` pairs, e.g. rows read back from a store.
  pub fn from_pairs<I>(pairs: I) -> Self
  where
    I: IntoIterator<Item = (String, UserId)>,
  {
    let mut map = Self::new();
    for (symbol, user) in pairs {
      map.insert(symbol, user);
    }
    map
  }

  pub fn contains(&self, symbol: &str, user: &UserId) -> bool {
    self.0.get(symbol).is_some_and(|users| users.contains(user))
  }

  pub fn users(&self, symbol: &str) -> Option<&BTreeSet<UserId>> {
    self.0.get(symbol)
  }

  pub fn count(&self, symbol: &str) -> usize {
    self.0.get(symbol).map_or(0, BTreeSet::len)
  }

  pub fn is_empty(&self) -> bool { self.0.is_empty() }

  pub fn symbols(&self) -> impl Iterator<Item = &str> {
    self.0.keys().map(String::as_str)
  }

  /// Add `user` under `symbol`. Returns `false` if already present.
  pub fn insert(&mut self, symbol: impl Into<String>, user: UserId) -> bool {
    self.0.entry(symbol.into()).or_default().insert(user)
  }

  /// Remove `user` from `symbol`, dropping the symbol once its set is
  /// empty. Returns `false` if the user had not reacted with it.
  pub fn remove(&mut self, symbol: &str, user: &UserId) -> bool {
    let Some(users) = self.0.get_mut(symbol) else {
      return false;
    };
    let removed = users.remove(user);
    if users.is_empty() {
      self.0.remove(symbol);
    }
    removed
  }
}

impl TryFrom<RawReactions> for ReactionMap {
  type Error = Error;

  fn try_from(raw: RawReactions) -> Result<Self> {
    if let Some((symbol, _)) = raw.iter().find(|(_, users)| users.is_empty()) {
      return Err(Error::MalformedDocument {
        kind:   "reaction map",
        reason: format!("symbol {symbol:?} has no reacting users"),
      });
    }
    Ok(Self(raw))
  }
}

impl From<ReactionMap> for RawReactions {
  fn from(map: ReactionMap) -> Self { map.0 }
}

/// Trim a requested reaction symbol, rejecting blanks.
pub fn normalize_symbol(symbol: &str) -> Result<&str> {
  let trimmed = symbol.trim();
  if trimmed.is_empty() {
    Err(Error::InvalidReaction)
  } else {
    Ok(trimmed)
  }
}

// ─── Message ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
  pub message_id:  MessageId,
  pub sender_id:   UserId,
  pub receiver_id: UserId,
  pub text:        String,
  /// Store-assigned; never earlier than any instant already in the
  /// conversation.
  pub created_at:  DateTime<Utc>,
  pub is_seen:     bool,
  pub seen_at:     Option<DateTime<Utc>>,
  #[serde(default)]
  pub reactions:   ReactionMap,
}

impl Message {
  pub fn conversation_id(&self) -> Result<ConversationId> {
    ConversationId::between(&self.sender_id, &self.receiver_id)
  }

  /// An inbound message `viewer` has not acknowledged yet.
  pub fn is_unseen_by(&self, viewer: &UserId) -> bool {
    &self.receiver_id == viewer && !self.is_seen
  }
}

/// Input to [`crate::store::ChatStore::insert_message`]. The identifier and
/// creation instant are assigned by the store.
#[derive(Debug, Clone)]
pub struct NewMessage {
  pub sender_id:   UserId,
  pub receiver_id: UserId,
  pub text:        String,
}
