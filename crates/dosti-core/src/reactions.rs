//! Reaction Aggregator: toggles a user's membership in a message's
//! per-symbol reaction set.
//!
//! A toggle never rewrites the whole map. Current membership decides the
//! direction, then exactly one atomic set-union or set-difference is issued
//! for the `(message, symbol)` path, so concurrent toggles by other users or
//! on other symbols cannot be lost.

use std::sync::Arc;

use serde::Serialize;

use crate::{
  Error, Result,
  id::{ConversationId, MessageId, UserId},
  message::{ReactionMap, normalize_symbol},
  store::{ChatStore, StoreResultExt as _},
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReactionToggle {
  /// `true` if the user now reacts with the symbol, `false` if removed.
  pub added:     bool,
  pub reactions: ReactionMap,
}

pub struct ReactionAggregator<S> {
  store: Arc<S>,
}

impl<S> Clone for ReactionAggregator<S> {
  fn clone(&self) -> Self { Self { store: Arc::clone(&self.store) } }
}

impl<S: ChatStore> ReactionAggregator<S> {
  pub fn new(store: Arc<S>) -> Self { Self { store } }

  pub async fn toggle_reaction(
    &self,
    conversation: &ConversationId,
    message_id: MessageId,
    user: &UserId,
    symbol: &str,
  ) -> Result<ReactionToggle> {
    let symbol = normalize_symbol(symbol)?;
    let message = self
      .store
      .get_message(conversation, message_id)
      .await
      .lift()?
      .ok_or(Error::MessageNotFound(message_id))?;

    let added = !message.reactions.contains(symbol, user);
    let reactions = if added {
      self.store.add_reaction(conversation, message_id, symbol, user).await
    } else {
      self.store.remove_reaction(conversation, message_id, symbol, user).await
    }
    .lift()?
    .ok_or(Error::MessageNotFound(message_id))?;

    tracing::debug!(
      message_id = %message_id,
      user = %user,
      symbol,
      added,
      "reaction toggled"
    );
    Ok(ReactionToggle { added, reactions })
  }
}
