//! Message Log: the append-only, time-ordered record of a conversation.

use std::sync::Arc;

use crate::{
  Error, Result,
  directory::ConversationDirectory,
  id::{ConversationId, UserId},
  live::MessageSubscription,
  message::{Message, NewMessage},
  store::{ChatStore, StoreResultExt as _},
};

pub struct MessageLog<S> {
  store:     Arc<S>,
  directory: ConversationDirectory<S>,
}

impl<S> Clone for MessageLog<S> {
  fn clone(&self) -> Self {
    Self {
      store:     Arc::clone(&self.store),
      directory: self.directory.clone(),
    }
  }
}

impl<S: ChatStore> MessageLog<S> {
  pub fn new(store: Arc<S>) -> Self {
    let directory = ConversationDirectory::new(Arc::clone(&store));
    Self { store, directory }
  }

  /// Append `text` from `sender` to `receiver` in `conversation`.
  ///
  /// Rejects blank text ([`Error::EmptyMessage`]) and a sender/receiver
  /// pair that is not exactly the conversation's two participants
  /// ([`Error::ParticipantMismatch`]). Once the message is durable, both
  /// directory entries are refreshed; a failure there is logged and left
  /// for the next send to repair.
  pub async fn append(
    &self,
    conversation: &ConversationId,
    sender: &UserId,
    receiver: &UserId,
    text: &str,
  ) -> Result<Message> {
    if text.trim().is_empty() {
      return Err(Error::EmptyMessage);
    }
    let belongs = ConversationId::between(sender, receiver)
      .is_ok_and(|derived| &derived == conversation);
    if !belongs {
      return Err(Error::ParticipantMismatch {
        conversation: conversation.key().to_owned(),
        sender:       sender.clone(),
        receiver:     receiver.clone(),
      });
    }

    let message = self
      .store
      .insert_message(conversation, NewMessage {
        sender_id:   sender.clone(),
        receiver_id: receiver.clone(),
        text:        text.to_owned(),
      })
      .await
      .lift()?;
    tracing::debug!(
      conversation = %conversation,
      message_id = %message.message_id,
      "message appended"
    );

    if let Err(e) = self
      .directory
      .upsert_on_send(sender, receiver, &message.text, message.created_at)
      .await
    {
      tracing::warn!(
        conversation = %conversation,
        error = %e,
        "directory update after send failed"
      );
    }

    Ok(message)
  }

  /// One-shot ordered read of the whole conversation.
  pub async fn history(&self, conversation: &ConversationId) -> Result<Vec<Message>> {
    self.store.list_messages(conversation).await.lift()
  }

  /// Live ordered view: backlog first, then a fresh snapshot on every change.
  pub fn subscribe(&self, conversation: &ConversationId) -> MessageSubscription<S> {
    MessageSubscription::new(Arc::clone(&self.store), conversation.clone())
  }
}
