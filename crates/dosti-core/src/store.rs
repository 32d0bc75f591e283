//! The `ChatStore` trait and the write/notification types that cross it.
//!
//! The trait is the durable document store the engine runs against, and is
//! implemented by storage backends (e.g. `dosti-store-sqlite`). It offers
//! per-record reads and writes, atomic multi-key batches, per-field
//! set-union/set-difference on reaction sets, and a live change feed. The
//! engine components in this crate depend only on this abstraction.

use std::future::Future;

use tokio::sync::broadcast;

use crate::{
  directory::{DirectoryEntry, DirectoryWrite},
  id::{ConversationId, MessageId, UserId},
  message::{Message, NewMessage, ReactionMap},
  user::{NewUser, User},
};

// ─── Change notifications ────────────────────────────────────────────────────

/// Published by the store after every successful write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Change {
  /// A message in the conversation was created or modified.
  Conversation(ConversationId),
  /// A directory entry was created or modified.
  Directory { owner: UserId, counterpart: UserId },
  /// A user record (profile or presence) changed.
  User(UserId),
}

/// Receiving end of the store's change feed. Dropping it unsubscribes.
pub type ChangeFeed = broadcast::Receiver<Change>;

// ─── Batches ─────────────────────────────────────────────────────────────────

/// One write inside a [`WriteBatch`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchOp {
  /// Set `is_seen` and a store-assigned `seen_at` on a message that is
  /// still unseen. A message already seen is left untouched.
  MarkSeen {
    conversation: ConversationId,
    message_id:   MessageId,
  },
  /// Per-field update of a directory entry's unread flag. Missing entries
  /// are not created.
  SetUnread {
    owner:       UserId,
    counterpart: UserId,
    unread:      bool,
  },
}

/// A set of writes committed all-or-nothing by [`ChatStore::commit`].
#[derive(Debug, Clone, Default)]
pub struct WriteBatch {
  ops: Vec<BatchOp>,
}

impl WriteBatch {
  pub fn new() -> Self { Self::default() }

  pub fn mark_seen(
    &mut self,
    conversation: &ConversationId,
    message_id: MessageId,
  ) -> &mut Self {
    self.ops.push(BatchOp::MarkSeen {
      conversation: conversation.clone(),
      message_id,
    });
    self
  }

  pub fn set_unread(
    &mut self,
    owner: &UserId,
    counterpart: &UserId,
    unread: bool,
  ) -> &mut Self {
    self.ops.push(BatchOp::SetUnread {
      owner: owner.clone(),
      counterpart: counterpart.clone(),
      unread,
    });
    self
  }

  pub fn is_empty(&self) -> bool { self.ops.is_empty() }

  pub fn len(&self) -> usize { self.ops.len() }

  pub fn ops(&self) -> &[BatchOp] { &self.ops }

  pub fn into_ops(self) -> Vec<BatchOp> { self.ops }
}

/// What a committed batch actually changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchOutcome {
  /// Messages that transitioned from unseen to seen.
  pub seen:              Vec<MessageId>,
  /// Directory entries whose unread flag changed, as `(owner, counterpart)`.
  pub directory_updated: Vec<(UserId, UserId)>,
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Abstraction over the durable document store.
///
/// Every write that succeeds publishes a [`Change`] on the feed returned by
/// [`ChatStore::watch`]. No method retries internally; failures surface to
/// the caller.
///
/// All methods return `Send` futures so the trait can be used in
/// multi-threaded async runtimes (e.g. tokio with `axum`).
pub trait ChatStore: Send + Sync {
  type Error: std::error::Error + Into<crate::Error> + Send + Sync + 'static;

  // ── Users ─────────────────────────────────────────────────────────────

  /// Persist a new user record, initially online with `last_seen = now`.
  fn create_user(
    &self,
    input: NewUser,
  ) -> impl Future<Output = Result<User, Self::Error>> + Send + '_;

  /// Retrieve a user by id. Returns `None` if not found.
  fn get_user<'a>(
    &'a self,
    id: &'a UserId,
  ) -> impl Future<Output = Result<Option<User>, Self::Error>> + Send + 'a;

  /// Set the online flag and a store-assigned last-seen instant.
  ///
  /// Returns `false`, without error, when no record exists for `id`.
  fn update_presence<'a>(
    &'a self,
    id: &'a UserId,
    online: bool,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + 'a;

  // ── Messages ──────────────────────────────────────────────────────────

  /// Append a message. The id and creation instant are assigned by the
  /// store; the instant is never earlier than the latest one already
  /// stored for `conversation`.
  fn insert_message<'a>(
    &'a self,
    conversation: &'a ConversationId,
    input: NewMessage,
  ) -> impl Future<Output = Result<Message, Self::Error>> + Send + 'a;

  fn get_message<'a>(
    &'a self,
    conversation: &'a ConversationId,
    id: MessageId,
  ) -> impl Future<Output = Result<Option<Message>, Self::Error>> + Send + 'a;

  /// All messages of a conversation ordered by creation instant, insertion
  /// order breaking ties.
  fn list_messages<'a>(
    &'a self,
    conversation: &'a ConversationId,
  ) -> impl Future<Output = Result<Vec<Message>, Self::Error>> + Send + 'a;

  // ── Reaction sets ─────────────────────────────────────────────────────

  /// Atomic set-union of `user` into the `symbol` set of a message.
  /// Returns the resulting map, or `None` if the message does not exist.
  fn add_reaction<'a>(
    &'a self,
    conversation: &'a ConversationId,
    id: MessageId,
    symbol: &'a str,
    user: &'a UserId,
  ) -> impl Future<Output = Result<Option<ReactionMap>, Self::Error>> + Send + 'a;

  /// Atomic set-difference of `user` from the `symbol` set of a message.
  /// A set that becomes empty disappears from the map.
  fn remove_reaction<'a>(
    &'a self,
    conversation: &'a ConversationId,
    id: MessageId,
    symbol: &'a str,
    user: &'a UserId,
  ) -> impl Future<Output = Result<Option<ReactionMap>, Self::Error>> + Send + 'a;

  // ── Directory ─────────────────────────────────────────────────────────

  /// Create or overwrite `owner`'s entry for `counterpart`. A write older
  /// than the stored last-message instant is ignored.
  fn upsert_directory_entry<'a>(
    &'a self,
    owner: &'a UserId,
    counterpart: &'a UserId,
    write: DirectoryWrite,
  ) -> impl Future<Output = Result<DirectoryEntry, Self::Error>> + Send + 'a;

  fn get_directory_entry<'a>(
    &'a self,
    owner: &'a UserId,
    counterpart: &'a UserId,
  ) -> impl Future<Output = Result<Option<DirectoryEntry>, Self::Error>> + Send + 'a;

  /// All of `owner`'s entries, unordered.
  fn list_directory<'a>(
    &'a self,
    owner: &'a UserId,
  ) -> impl Future<Output = Result<Vec<DirectoryEntry>, Self::Error>> + Send + 'a;

  // ── Batches and notifications ─────────────────────────────────────────

  /// Apply every op in `batch` atomically: either all take effect or none.
  fn commit(
    &self,
    batch: WriteBatch,
  ) -> impl Future<Output = Result<BatchOutcome, Self::Error>> + Send + '_;

  /// Subscribe to change notifications from this point on.
  fn watch(&self) -> ChangeFeed;
}

/// Lift a backend error into the engine's taxonomy.
pub(crate) trait StoreResultExt<T> {
  fn lift(self) -> crate::Result<T>;
}

impl<T, E: Into<crate::Error>> StoreResultExt<T> for Result<T, E> {
  fn lift(self) -> crate::Result<T> { self.map_err(Into::into) }
}
