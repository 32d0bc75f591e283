//! Live, restartable views over the store's change feed.
//!
//! A subscription registers with the feed before reading its backlog, so no
//! write can fall between the initial read and the first notification.
//! Each delivery re-reads authoritative state from the store rather than
//! patching a local copy; a receiver that lagged behind the feed simply
//! re-reads.

use std::{collections::HashMap, sync::Arc};

use serde::Serialize;
use tokio::sync::broadcast::error::RecvError;

use crate::{
  Result,
  id::{ConversationId, MessageId},
  message::Message,
  store::{Change, ChangeFeed, ChatStore, StoreResultExt as _},
};

/// Wait until a change matching `relevant` arrives. Returns `false` once the
/// feed is closed.
pub(crate) async fn wait_for<F>(feed: &mut ChangeFeed, relevant: F) -> bool
where
  F: Fn(&Change) -> bool,
{
  loop {
    match feed.recv().await {
      Ok(change) if relevant(&change) => return true,
      Ok(_) => continue,
      Err(RecvError::Lagged(skipped)) => {
        tracing::debug!(skipped, "change feed lagged; re-reading");
        return true;
      }
      Err(RecvError::Closed) => return false,
    }
  }
}

// ─── Snapshots ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
  Added,
  Modified,
}

/// One message that differs from the previous delivery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DocumentChange {
  pub kind:       ChangeKind,
  pub message_id: MessageId,
}

/// The full ordered message list plus what changed since the last delivery.
#[derive(Debug, Clone, Serialize)]
pub struct MessageSnapshot {
  pub messages: Vec<Message>,
  pub changes:  Vec<DocumentChange>,
}

fn diff(previous: &HashMap<MessageId, Message>, current: &[Message]) -> Vec<DocumentChange> {
  current
    .iter()
    .filter_map(|m| {
      let kind = match previous.get(&m.message_id) {
        None => ChangeKind::Added,
        Some(old) if old != m => ChangeKind::Modified,
        Some(_) => return None,
      };
      Some(DocumentChange { kind, message_id: m.message_id })
    })
    .collect()
}

// ─── MessageSubscription ─────────────────────────────────────────────────────

/// Live ordered message sequence for one conversation.
///
/// The first [`next`](Self::next) yields the whole backlog (every message is
/// `Added`); later calls wait for the conversation to change.
pub struct MessageSubscription<S> {
  store:        Arc<S>,
  conversation: ConversationId,
  feed:         Option<ChangeFeed>,
  primed:       bool,
  last:         HashMap<MessageId, Message>,
}

impl<S: ChatStore> MessageSubscription<S> {
  pub(crate) fn new(store: Arc<S>, conversation: ConversationId) -> Self {
    let feed = store.watch();
    Self {
      store,
      conversation,
      feed: Some(feed),
      primed: false,
      last: HashMap::new(),
    }
  }

  pub fn conversation(&self) -> &ConversationId { &self.conversation }

  /// Next snapshot, or `None` once closed (by [`close`](Self::close) or by
  /// the store shutting its feed down).
  pub async fn next(&mut self) -> Option<Result<MessageSnapshot>> {
    let feed = self.feed.as_mut()?;
    if self.primed {
      let conversation = &self.conversation;
      let open = wait_for(feed, |change| {
        matches!(change, Change::Conversation(id) if id == conversation)
      })
      .await;
      if !open {
        self.feed = None;
        return None;
      }
    }
    self.primed = true;

    let messages = match self.store.list_messages(&self.conversation).await.lift() {
      Ok(messages) => messages,
      Err(e) => return Some(Err(e)),
    };
    let changes = diff(&self.last, &messages);
    self.last = messages.iter().map(|m| (m.message_id, m.clone())).collect();
    Some(Ok(MessageSnapshot { messages, changes }))
  }

  /// Stop delivering and release the feed receiver.
  pub fn close(&mut self) {
    self.feed = None;
    self.last.clear();
  }

  pub fn is_closed(&self) -> bool { self.feed.is_none() }
}
