//! Receipt Tracker: flips inbound messages to seen when their receiver
//! opens the conversation.

use std::sync::Arc;

use serde::Serialize;

use crate::{
  Error, Result,
  id::{ConversationId, MessageId, UserId},
  store::{ChatStore, StoreResultExt as _, WriteBatch},
};

/// What a [`ReceiptTracker::mark_seen`] call changed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReceiptOutcome {
  pub marked_seen:    Vec<MessageId>,
  pub unread_cleared: bool,
}

impl ReceiptOutcome {
  pub fn is_noop(&self) -> bool { self.marked_seen.is_empty() && !self.unread_cleared }
}

pub struct ReceiptTracker<S> {
  store: Arc<S>,
}

impl<S> Clone for ReceiptTracker<S> {
  fn clone(&self) -> Self { Self { store: Arc::clone(&self.store) } }
}

impl<S: ChatStore> ReceiptTracker<S> {
  pub fn new(store: Arc<S>) -> Self { Self { store } }

  /// Mark every unseen message addressed to `viewer` as seen and clear
  /// `viewer`'s unread flag for the conversation, in one atomic batch.
  ///
  /// With nothing unseen no message is written; a stale unread flag is
  /// then cleared on a best-effort basis, and a failure to do so is logged
  /// rather than returned. Calling this again without new messages has no
  /// effect.
  pub async fn mark_seen(
    &self,
    conversation: &ConversationId,
    viewer: &UserId,
  ) -> Result<ReceiptOutcome> {
    let counterpart = conversation.counterpart_of(viewer).ok_or_else(|| {
      Error::NotAParticipant {
        conversation: conversation.key().to_owned(),
        user:         viewer.clone(),
      }
    })?;

    let unseen: Vec<MessageId> = self
      .store
      .list_messages(conversation)
      .await
      .lift()?
      .into_iter()
      .filter(|m| m.is_unseen_by(viewer))
      .map(|m| m.message_id)
      .collect();

    if unseen.is_empty() {
      let unread_cleared = self.clear_stale_unread(viewer, counterpart).await;
      return Ok(ReceiptOutcome { marked_seen: Vec::new(), unread_cleared });
    }

    let mut batch = WriteBatch::new();
    for id in &unseen {
      batch.mark_seen(conversation, *id);
    }
    batch.set_unread(viewer, counterpart, false);

    let outcome = self.store.commit(batch).await.lift()?;
    tracing::debug!(
      conversation = %conversation,
      viewer = %viewer,
      seen = outcome.seen.len(),
      "receipts committed"
    );
    Ok(ReceiptOutcome {
      unread_cleared: !outcome.directory_updated.is_empty(),
      marked_seen:    outcome.seen,
    })
  }

  async fn clear_stale_unread(&self, viewer: &UserId, counterpart: &UserId) -> bool {
    let entry = match self.store.get_directory_entry(viewer, counterpart).await.lift() {
      Ok(entry) => entry,
      Err(e) => {
        tracing::warn!(viewer = %viewer, error = %e, "could not read directory entry");
        return false;
      }
    };
    if !entry.is_some_and(|e| e.unread) {
      return false;
    }

    let mut batch = WriteBatch::new();
    batch.set_unread(viewer, counterpart, false);
    match self.store.commit(batch).await.lift() {
      Ok(outcome) => !outcome.directory_updated.is_empty(),
      Err(e) => {
        tracing::warn!(viewer = %viewer, error = %e, "could not clear unread flag");
        false
      }
    }
  }
}
