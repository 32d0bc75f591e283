//! [`ChatEngine`]: all components over one shared store, plus the
//! session-scoped entry points a client action maps onto.

use std::sync::Arc;

use crate::{
  Result,
  directory::{ConversationDirectory, ConversationSummary, DirectorySubscription},
  id::{MessageId, UserId},
  live::MessageSubscription,
  log::MessageLog,
  message::Message,
  presence::{PresenceTracker, PresenceUpdate},
  reactions::{ReactionAggregator, ReactionToggle},
  receipts::{ReceiptOutcome, ReceiptTracker},
  session::Session,
  store::ChatStore,
};

pub struct ChatEngine<S> {
  store:     Arc<S>,
  log:       MessageLog<S>,
  receipts:  ReceiptTracker<S>,
  reactions: ReactionAggregator<S>,
  presence:  PresenceTracker<S>,
  directory: ConversationDirectory<S>,
}

impl<S: ChatStore> ChatEngine<S> {
  pub fn new(store: Arc<S>) -> Self {
    Self {
      log:       MessageLog::new(Arc::clone(&store)),
      receipts:  ReceiptTracker::new(Arc::clone(&store)),
      reactions: ReactionAggregator::new(Arc::clone(&store)),
      presence:  PresenceTracker::new(Arc::clone(&store)),
      directory: ConversationDirectory::new(Arc::clone(&store)),
      store,
    }
  }

  pub fn store(&self) -> &Arc<S> { &self.store }

  pub fn log(&self) -> &MessageLog<S> { &self.log }

  pub fn receipts(&self) -> &ReceiptTracker<S> { &self.receipts }

  pub fn reactions(&self) -> &ReactionAggregator<S> { &self.reactions }

  pub fn presence(&self) -> &PresenceTracker<S> { &self.presence }

  pub fn directory(&self) -> &ConversationDirectory<S> { &self.directory }

  // ── Session-scoped actions ────────────────────────────────────────────

  pub async fn send(&self, session: &Session, to: &UserId, text: &str) -> Result<Message> {
    let conversation = session.conversation_with(to)?;
    self.log.append(&conversation, session.user(), to, text).await
  }

  pub async fn history(&self, session: &Session, peer: &UserId) -> Result<Vec<Message>> {
    let conversation = session.conversation_with(peer)?;
    self.log.history(&conversation).await
  }

  pub fn subscribe(&self, session: &Session, peer: &UserId) -> Result<MessageSubscription<S>> {
    let conversation = session.conversation_with(peer)?;
    Ok(self.log.subscribe(&conversation))
  }

  /// The viewer has the conversation with `peer` open.
  pub async fn mark_seen(&self, session: &Session, peer: &UserId) -> Result<ReceiptOutcome> {
    let conversation = session.conversation_with(peer)?;
    self.receipts.mark_seen(&conversation, session.user()).await
  }

  pub async fn react(
    &self,
    session: &Session,
    peer: &UserId,
    message_id: MessageId,
    symbol: &str,
  ) -> Result<ReactionToggle> {
    let conversation = session.conversation_with(peer)?;
    self
      .reactions
      .toggle_reaction(&conversation, message_id, session.user(), symbol)
      .await
  }

  pub async fn connect(&self, session: &Session) -> Result<PresenceUpdate> {
    self.presence.set_online(session.user()).await
  }

  pub async fn disconnect(&self, session: &Session) -> Result<PresenceUpdate> {
    self.presence.set_offline(session.user()).await
  }

  pub async fn inbox(&self, session: &Session) -> Result<Vec<ConversationSummary>> {
    self.directory.list_for(session.user()).await
  }

  pub fn watch_inbox(&self, session: &Session) -> DirectorySubscription<S> {
    self.directory.watch(session.user())
  }
}
