//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! All timestamps are stored as fixed-width RFC 3339 UTC strings with
//! microsecond precision, so string order equals time order. UUIDs are
//! stored as hyphenated lowercase strings.

use chrono::{DateTime, SecondsFormat, SubsecRound as _, Utc};
use dosti_core::{
  directory::DirectoryEntry,
  id::{MessageId, UserId},
  message::{Message, ReactionMap},
  user::User,
};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Uuid ─────────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

/// The store's clock, truncated to the precision it persists.
pub fn now() -> DateTime<Utc> { Utc::now().trunc_subsecs(6) }

pub fn encode_dt(dt: DateTime<Utc>) -> String {
  dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(format!("{s:?}: {e}")))
}

fn decode_opt_dt(s: Option<String>) -> Result<Option<DateTime<Utc>>> {
  s.as_deref().map(decode_dt).transpose()
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// Raw values read directly from a `users` row.
pub struct RawUser {
  pub user_id:          String,
  pub display_name:     String,
  pub avatar_url:       Option<String>,
  pub bio:              Option<String>,
  pub is_online:        bool,
  pub last_seen:        Option<String>,
  pub is_pro:           bool,
  pub trial_ends_at:    Option<String>,
  pub has_active_story: bool,
  pub created_at:       String,
}

pub const USER_COLUMNS: &str = "user_id, display_name, avatar_url, bio, is_online, \
   last_seen, is_pro, trial_ends_at, has_active_story, created_at";

impl RawUser {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      user_id:          row.get(0)?,
      display_name:     row.get(1)?,
      avatar_url:       row.get(2)?,
      bio:              row.get(3)?,
      is_online:        row.get(4)?,
      last_seen:        row.get(5)?,
      is_pro:           row.get(6)?,
      trial_ends_at:    row.get(7)?,
      has_active_story: row.get(8)?,
      created_at:       row.get(9)?,
    })
  }

  pub fn into_user(self) -> Result<User> {
    Ok(User {
      user_id:          UserId::new(self.user_id),
      display_name:     self.display_name,
      avatar_url:       self.avatar_url,
      bio:              self.bio,
      is_online:        self.is_online,
      last_seen:        decode_opt_dt(self.last_seen)?,
      is_pro:           self.is_pro,
      trial_ends_at:    decode_opt_dt(self.trial_ends_at)?,
      has_active_story: self.has_active_story,
      created_at:       decode_dt(&self.created_at)?,
    })
  }
}

/// Raw values read directly from a `messages` row.
pub struct RawMessage {
  pub message_id:  String,
  pub sender_id:   String,
  pub receiver_id: String,
  pub body:        String,
  pub created_at:  String,
  pub is_seen:     bool,
  pub seen_at:     Option<String>,
}

pub const MESSAGE_COLUMNS: &str =
  "message_id, sender_id, receiver_id, body, created_at, is_seen, seen_at";

impl RawMessage {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      message_id:  row.get(0)?,
      sender_id:   row.get(1)?,
      receiver_id: row.get(2)?,
      body:        row.get(3)?,
      created_at:  row.get(4)?,
      is_seen:     row.get(5)?,
      seen_at:     row.get(6)?,
    })
  }

  pub fn into_message(self, reactions: ReactionMap) -> Result<Message> {
    let seen_at = decode_opt_dt(self.seen_at)?;
    if self.is_seen != seen_at.is_some() {
      return Err(Error::Malformed(format!(
        "message {} has is_seen={} but seen_at={seen_at:?}",
        self.message_id, self.is_seen
      )));
    }
    Ok(Message {
      message_id: decode_uuid(&self.message_id)?,
      sender_id: UserId::new(self.sender_id),
      receiver_id: UserId::new(self.receiver_id),
      text: self.body,
      created_at: decode_dt(&self.created_at)?,
      is_seen: self.is_seen,
      seen_at,
      reactions,
    })
  }
}

/// `(message_id, symbol, user_id)` from the `reactions` table.
pub type RawReaction = (String, String, String);

/// Group reaction rows by message.
pub fn group_reactions(
  rows: Vec<RawReaction>,
) -> Result<std::collections::HashMap<MessageId, ReactionMap>> {
  let mut grouped: std::collections::HashMap<MessageId, ReactionMap> =
    std::collections::HashMap::new();
  for (message_id, symbol, user_id) in rows {
    grouped
      .entry(decode_uuid(&message_id)?)
      .or_default()
      .insert(symbol, UserId::new(user_id));
  }
  Ok(grouped)
}

/// Raw values read directly from a `directory_entries` row.
pub struct RawDirectoryEntry {
  pub owner_id:        String,
  pub counterpart_id:  String,
  pub last_message:    Option<String>,
  pub last_message_at: Option<String>,
  pub unread:          bool,
}

pub const DIRECTORY_COLUMNS: &str =
  "owner_id, counterpart_id, last_message, last_message_at, unread";

impl RawDirectoryEntry {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      owner_id:        row.get(0)?,
      counterpart_id:  row.get(1)?,
      last_message:    row.get(2)?,
      last_message_at: row.get(3)?,
      unread:          row.get(4)?,
    })
  }

  pub fn into_entry(self) -> Result<DirectoryEntry> {
    Ok(DirectoryEntry {
      owner_id:        UserId::new(self.owner_id),
      counterpart_id:  UserId::new(self.counterpart_id),
      last_message:    self.last_message,
      last_message_at: decode_opt_dt(self.last_message_at)?,
      unread:          self.unread,
    })
  }
}
