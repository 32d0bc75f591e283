//! [`SqliteStore`]: the SQLite implementation of [`ChatStore`].

use std::path::Path;

use chrono::SubsecRound as _;
use rusqlite::OptionalExtension as _;
use tokio::sync::broadcast;
use uuid::Uuid;

use dosti_core::{
  directory::{DirectoryEntry, DirectoryWrite},
  id::{ConversationId, MessageId, UserId},
  message::{Message, NewMessage, ReactionMap},
  store::{BatchOp, BatchOutcome, Change, ChangeFeed, ChatStore, WriteBatch},
  user::{NewUser, User},
};

use crate::{
  Error, Result,
  encode::{
    DIRECTORY_COLUMNS, MESSAGE_COLUMNS, RawDirectoryEntry, RawMessage, RawReaction,
    RawUser, USER_COLUMNS, decode_dt, decode_uuid, encode_dt, encode_uuid,
    group_reactions, now,
  },
  schema::SCHEMA,
};

/// Change notifications buffered per receiver before it is told it lagged.
pub const DEFAULT_FEED_CAPACITY: usize = 256;

// ─── Row helpers (run on the connection thread) ──────────────────────────────

/// The participant pair a conversation is keyed on in the `messages` table.
/// The rendered key alone is ambiguous when user ids contain the separator.
fn participant_columns(conversation: &ConversationId) -> (String, String) {
  let (low, high) = conversation.participants();
  (low.as_str().to_owned(), high.as_str().to_owned())
}

fn message_exists(
  conn: &rusqlite::Connection,
  (low, high): (&str, &str),
  message_id: &str,
) -> rusqlite::Result<bool> {
  Ok(
    conn
      .query_row(
        "SELECT 1 FROM messages
         WHERE message_id = ?1 AND low_id = ?2 AND high_id = ?3",
        rusqlite::params![message_id, low, high],
        |_| Ok(true),
      )
      .optional()?
      .unwrap_or(false),
  )
}

fn reactions_of(
  conn: &rusqlite::Connection,
  message_id: &str,
) -> rusqlite::Result<Vec<RawReaction>> {
  let mut stmt = conn.prepare(
    "SELECT message_id, symbol, user_id FROM reactions
     WHERE message_id = ?1
     ORDER BY reacted_at",
  )?;
  stmt
    .query_map(rusqlite::params![message_id], |r| {
      Ok((r.get(0)?, r.get(1)?, r.get(2)?))
    })?
    .collect()
}

fn into_reaction_map(rows: Vec<RawReaction>) -> ReactionMap {
  ReactionMap::from_pairs(
    rows
      .into_iter()
      .map(|(_, symbol, user)| (symbol, UserId::new(user))),
  )
}

/// A [`BatchOp`] flattened to owned column values.
enum RawOp {
  Seen { low: String, high: String, message_id: String },
  Unread { owner: String, counterpart: String, unread: bool },
}

// ─── Store ───────────────────────────────────────────────────────────────────

/// A Dosti chat store backed by a single SQLite file.
///
/// Cloning is cheap: the inner connection and the change feed sender are
/// both reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn:    tokio_rusqlite::Connection,
  changes: broadcast::Sender<Change>,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    Self::open_with_capacity(path, DEFAULT_FEED_CAPACITY).await
  }

  pub async fn open_with_capacity(
    path: impl AsRef<Path>,
    feed_capacity: usize,
  ) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    Self::init(conn, feed_capacity).await
  }

  /// Open an in-memory store, for tests.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    Self::init(conn, DEFAULT_FEED_CAPACITY).await
  }

  async fn init(conn: tokio_rusqlite::Connection, feed_capacity: usize) -> Result<Self> {
    let (changes, _) = broadcast::channel(feed_capacity.max(1));
    let store = Self { conn, changes };
    store
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(store)
  }

  #[cfg(test)]
  pub(crate) fn connection(&self) -> &tokio_rusqlite::Connection { &self.conn }

  fn publish(&self, change: Change) {
    // No receivers is not an error: nobody is watching.
    let _ = self.changes.send(change);
  }

  async fn apply_reaction(
    &self,
    conversation: &ConversationId,
    id: MessageId,
    symbol: &str,
    user: &UserId,
    add: bool,
  ) -> Result<Option<ReactionMap>> {
    let (low, high) = participant_columns(conversation);
    let id_str = encode_uuid(id);
    let symbol = symbol.to_owned();
    let user_str = user.as_str().to_owned();
    let at_str = encode_dt(now());

    let outcome: Option<(bool, Vec<RawReaction>)> = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        if !message_exists(&tx, (&low, &high), &id_str)? {
          return Ok(None);
        }
        let affected = if add {
          tx.execute(
            "INSERT OR IGNORE INTO reactions (message_id, symbol, user_id, reacted_at)
             VALUES (?1, ?2, ?3, ?4)",
            rusqlite::params![id_str, symbol, user_str, at_str],
          )?
        } else {
          tx.execute(
            "DELETE FROM reactions
             WHERE message_id = ?1 AND symbol = ?2 AND user_id = ?3",
            rusqlite::params![id_str, symbol, user_str],
          )?
        };
        let rows = reactions_of(&tx, &id_str)?;
        tx.commit()?;
        Ok(Some((affected > 0, rows)))
      })
      .await?;

    let Some((changed, rows)) = outcome else {
      return Ok(None);
    };
    if changed {
      self.publish(Change::Conversation(conversation.clone()));
    }
    Ok(Some(into_reaction_map(rows)))
  }
}

// ─── ChatStore impl ──────────────────────────────────────────────────────────

impl ChatStore for SqliteStore {
  type Error = Error;

  // ── Users ─────────────────────────────────────────────────────────────────

  async fn create_user(&self, input: NewUser) -> Result<User> {
    let created_at = now();
    let user = User {
      user_id:          input.user_id,
      display_name:     input.display_name,
      avatar_url:       input.avatar_url,
      bio:              input.bio,
      is_online:        true,
      last_seen:        Some(created_at),
      is_pro:           input.is_pro,
      trial_ends_at:    input.trial_ends_at.map(|t| t.trunc_subsecs(6)),
      has_active_story: input.has_active_story,
      created_at,
    };

    let id_str     = user.user_id.as_str().to_owned();
    let name       = user.display_name.clone();
    let avatar     = user.avatar_url.clone();
    let bio        = user.bio.clone();
    let is_pro     = user.is_pro;
    let trial_str  = user.trial_ends_at.map(encode_dt);
    let story      = user.has_active_story;
    let at_str     = encode_dt(created_at);

    let inserted = self
      .conn
      .call(move |conn| {
        let result = conn.execute(
          "INSERT INTO users (
             user_id, display_name, avatar_url, bio, is_online, last_seen,
             is_pro, trial_ends_at, has_active_story, created_at
           ) VALUES (?1, ?2, ?3, ?4, 1, ?5, ?6, ?7, ?8, ?5)",
          rusqlite::params![id_str, name, avatar, bio, at_str, is_pro, trial_str, story],
        );
        match result {
          Ok(_) => Ok(true),
          Err(rusqlite::Error::SqliteFailure(e, _))
            if e.code == rusqlite::ErrorCode::ConstraintViolation =>
          {
            Ok(false)
          }
          Err(e) => Err(e.into()),
        }
      })
      .await?;

    if !inserted {
      return Err(Error::UserExists(user.user_id));
    }
    self.publish(Change::User(user.user_id.clone()));
    Ok(user)
  }

  async fn get_user<'a>(&'a self, id: &'a UserId) -> Result<Option<User>> {
    let id_str = id.as_str().to_owned();

    let raw: Option<RawUser> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!("SELECT {USER_COLUMNS} FROM users WHERE user_id = ?1"),
              rusqlite::params![id_str],
              RawUser::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawUser::into_user).transpose()
  }

  async fn update_presence<'a>(&'a self, id: &'a UserId, online: bool) -> Result<bool> {
    let id_str = id.as_str().to_owned();
    let at_str = encode_dt(now());

    let updated = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "UPDATE users SET is_online = ?2, last_seen = ?3 WHERE user_id = ?1",
          rusqlite::params![id_str, online, at_str],
        )?)
      })
      .await?;

    if updated == 0 {
      return Ok(false);
    }
    self.publish(Change::User(id.clone()));
    Ok(true)
  }

  // ── Messages ──────────────────────────────────────────────────────────────

  async fn insert_message<'a>(
    &'a self,
    conversation: &'a ConversationId,
    input: NewMessage,
  ) -> Result<Message> {
    let message_id   = Uuid::new_v4();
    let id_str       = encode_uuid(message_id);
    let conv_str     = conversation.key().to_owned();
    let (low, high)  = participant_columns(conversation);
    let sender_str   = input.sender_id.as_str().to_owned();
    let receiver_str = input.receiver_id.as_str().to_owned();
    let body         = input.text.clone();
    let now_str      = encode_dt(now());

    let created_str: String = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let latest: Option<String> = tx.query_row(
          "SELECT MAX(created_at) FROM messages WHERE low_id = ?1 AND high_id = ?2",
          rusqlite::params![low, high],
          |r| r.get(0),
        )?;
        // Fixed-width encoding: string order is time order.
        let created_at = match latest {
          Some(latest) if latest > now_str => latest,
          _ => now_str,
        };
        tx.execute(
          "INSERT INTO messages (
             message_id, conversation_id, low_id, high_id,
             sender_id, receiver_id, body, created_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
          rusqlite::params![
            id_str,
            conv_str,
            low,
            high,
            sender_str,
            receiver_str,
            body,
            created_at,
          ],
        )?;
        tx.commit()?;
        Ok(created_at)
      })
      .await?;

    let message = Message {
      message_id,
      sender_id: input.sender_id,
      receiver_id: input.receiver_id,
      text: input.text,
      created_at: decode_dt(&created_str)?,
      is_seen: false,
      seen_at: None,
      reactions: ReactionMap::new(),
    };
    self.publish(Change::Conversation(conversation.clone()));
    Ok(message)
  }

  async fn get_message<'a>(
    &'a self,
    conversation: &'a ConversationId,
    id: MessageId,
  ) -> Result<Option<Message>> {
    let (low, high) = participant_columns(conversation);
    let id_str = encode_uuid(id);

    let raw: Option<(RawMessage, Vec<RawReaction>)> = self
      .conn
      .call(move |conn| {
        let message = conn
          .query_row(
            &format!(
              "SELECT {MESSAGE_COLUMNS} FROM messages
               WHERE message_id = ?1 AND low_id = ?2 AND high_id = ?3"
            ),
            rusqlite::params![id_str, low, high],
            RawMessage::from_row,
          )
          .optional()?;
        match message {
          Some(m) => Ok(Some((m, reactions_of(conn, &id_str)?))),
          None => Ok(None),
        }
      })
      .await?;

    raw
      .map(|(m, rows)| m.into_message(into_reaction_map(rows)))
      .transpose()
  }

  async fn list_messages<'a>(
    &'a self,
    conversation: &'a ConversationId,
  ) -> Result<Vec<Message>> {
    let (low, high) = participant_columns(conversation);

    let (raws, reaction_rows): (Vec<RawMessage>, Vec<RawReaction>) = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {MESSAGE_COLUMNS} FROM messages
           WHERE low_id = ?1 AND high_id = ?2
           ORDER BY created_at, seq"
        ))?;
        let raws = stmt
          .query_map(rusqlite::params![low, high], RawMessage::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;

        let mut stmt = conn.prepare(
          "SELECT r.message_id, r.symbol, r.user_id
           FROM reactions r
           JOIN messages m ON m.message_id = r.message_id
           WHERE m.low_id = ?1 AND m.high_id = ?2
           ORDER BY r.reacted_at",
        )?;
        let reactions = stmt
          .query_map(rusqlite::params![low, high], |r| {
            Ok((r.get(0)?, r.get(1)?, r.get(2)?))
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok((raws, reactions))
      })
      .await?;

    let mut grouped = group_reactions(reaction_rows)?;
    raws
      .into_iter()
      .map(|raw| {
        let id = decode_uuid(&raw.message_id)?;
        raw.into_message(grouped.remove(&id).unwrap_or_default())
      })
      .collect()
  }

  // ── Reaction sets ─────────────────────────────────────────────────────────

  async fn add_reaction<'a>(
    &'a self,
    conversation: &'a ConversationId,
    id: MessageId,
    symbol: &'a str,
    user: &'a UserId,
  ) -> Result<Option<ReactionMap>> {
    self.apply_reaction(conversation, id, symbol, user, true).await
  }

  async fn remove_reaction<'a>(
    &'a self,
    conversation: &'a ConversationId,
    id: MessageId,
    symbol: &'a str,
    user: &'a UserId,
  ) -> Result<Option<ReactionMap>> {
    self.apply_reaction(conversation, id, symbol, user, false).await
  }

  // ── Directory ─────────────────────────────────────────────────────────────

  async fn upsert_directory_entry<'a>(
    &'a self,
    owner: &'a UserId,
    counterpart: &'a UserId,
    write: DirectoryWrite,
  ) -> Result<DirectoryEntry> {
    let owner_str       = owner.as_str().to_owned();
    let counterpart_str = counterpart.as_str().to_owned();
    let at_str          = encode_dt(write.at);

    let (changed, raw): (bool, RawDirectoryEntry) = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let changed = tx.execute(
          "INSERT INTO directory_entries (
             owner_id, counterpart_id, last_message, last_message_at, unread
           ) VALUES (?1, ?2, ?3, ?4, ?5)
           ON CONFLICT (owner_id, counterpart_id) DO UPDATE SET
             last_message    = excluded.last_message,
             last_message_at = excluded.last_message_at,
             unread          = excluded.unread
           WHERE directory_entries.last_message_at IS NULL
              OR excluded.last_message_at >= directory_entries.last_message_at",
          rusqlite::params![
            owner_str,
            counterpart_str,
            write.last_message,
            at_str,
            write.unread,
          ],
        )? > 0;
        let raw = tx.query_row(
          &format!(
            "SELECT {DIRECTORY_COLUMNS} FROM directory_entries
             WHERE owner_id = ?1 AND counterpart_id = ?2"
          ),
          rusqlite::params![owner_str, counterpart_str],
          RawDirectoryEntry::from_row,
        )?;
        tx.commit()?;
        Ok((changed, raw))
      })
      .await?;

    if changed {
      self.publish(Change::Directory {
        owner:       owner.clone(),
        counterpart: counterpart.clone(),
      });
    }
    raw.into_entry()
  }

  async fn get_directory_entry<'a>(
    &'a self,
    owner: &'a UserId,
    counterpart: &'a UserId,
  ) -> Result<Option<DirectoryEntry>> {
    let owner_str       = owner.as_str().to_owned();
    let counterpart_str = counterpart.as_str().to_owned();

    let raw: Option<RawDirectoryEntry> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!(
                "SELECT {DIRECTORY_COLUMNS} FROM directory_entries
                 WHERE owner_id = ?1 AND counterpart_id = ?2"
              ),
              rusqlite::params![owner_str, counterpart_str],
              RawDirectoryEntry::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawDirectoryEntry::into_entry).transpose()
  }

  async fn list_directory<'a>(&'a self, owner: &'a UserId) -> Result<Vec<DirectoryEntry>> {
    let owner_str = owner.as_str().to_owned();

    let raws: Vec<RawDirectoryEntry> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {DIRECTORY_COLUMNS} FROM directory_entries WHERE owner_id = ?1"
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![owner_str], RawDirectoryEntry::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawDirectoryEntry::into_entry).collect()
  }

  // ── Batches ───────────────────────────────────────────────────────────────

  async fn commit(&self, batch: WriteBatch) -> Result<BatchOutcome> {
    let ops = batch.into_ops();
    let raw_ops: Vec<RawOp> = ops
      .iter()
      .map(|op| match op {
        BatchOp::MarkSeen { conversation, message_id } => {
          let (low, high) = participant_columns(conversation);
          RawOp::Seen { low, high, message_id: encode_uuid(*message_id) }
        }
        BatchOp::SetUnread { owner, counterpart, unread } => RawOp::Unread {
          owner:       owner.as_str().to_owned(),
          counterpart: counterpart.as_str().to_owned(),
          unread:      *unread,
        },
      })
      .collect();
    let seen_at_str = encode_dt(now());

    let applied: Vec<usize> = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let mut applied = Vec::new();
        for (index, op) in raw_ops.iter().enumerate() {
          let affected = match op {
            RawOp::Seen { low, high, message_id } => tx.execute(
              "UPDATE messages SET is_seen = 1, seen_at = ?4
               WHERE message_id = ?1 AND low_id = ?2 AND high_id = ?3 AND is_seen = 0",
              rusqlite::params![message_id, low, high, seen_at_str],
            )?,
            RawOp::Unread { owner, counterpart, unread } => tx.execute(
              "UPDATE directory_entries SET unread = ?3
               WHERE owner_id = ?1 AND counterpart_id = ?2 AND unread != ?3",
              rusqlite::params![owner, counterpart, unread],
            )?,
          };
          if affected > 0 {
            applied.push(index);
          }
        }
        tx.commit()?;
        Ok(applied)
      })
      .await?;

    let mut outcome = BatchOutcome::default();
    let mut touched: Vec<ConversationId> = Vec::new();
    for index in applied {
      match &ops[index] {
        BatchOp::MarkSeen { conversation, message_id } => {
          outcome.seen.push(*message_id);
          if !touched.contains(conversation) {
            touched.push(conversation.clone());
          }
        }
        BatchOp::SetUnread { owner, counterpart, .. } => {
          outcome.directory_updated.push((owner.clone(), counterpart.clone()));
        }
      }
    }

    for conversation in touched {
      self.publish(Change::Conversation(conversation));
    }
    for (owner, counterpart) in &outcome.directory_updated {
      self.publish(Change::Directory {
        owner:       owner.clone(),
        counterpart: counterpart.clone(),
      });
    }
    tracing::trace!(
      seen = outcome.seen.len(),
      directory = outcome.directory_updated.len(),
      "batch committed"
    );
    Ok(outcome)
  }

  fn watch(&self) -> ChangeFeed { self.changes.subscribe() }
}
