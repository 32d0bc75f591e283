//! Conversation Directory: each user's per-counterpart summaries.
//!
//! Entries are asymmetric: both participants hold their own entry for the
//! same conversation, and the two may disagree on `unread` while agreeing
//! on the last message once both writes have landed.

use std::{cmp::Ordering, collections::HashSet, sync::Arc};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
  Result,
  id::UserId,
  live::wait_for,
  store::{Change, ChangeFeed, ChatStore, StoreResultExt as _},
  user::{Presence, User},
};

// ─── Records ─────────────────────────────────────────────────────────────────

/// `owner`'s summary of their conversation with `counterpart_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryEntry {
  pub owner_id:        UserId,
  pub counterpart_id:  UserId,
  pub last_message:    Option<String>,
  pub last_message_at: Option<DateTime<Utc>>,
  pub unread:          bool,
}

/// Input to [`ChatStore::upsert_directory_entry`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryWrite {
  pub last_message: String,
  pub at:           DateTime<Utc>,
  pub unread:       bool,
}

/// A directory entry joined with the counterpart's profile and presence.
/// Profile fields are `None` when the counterpart has no user record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConversationSummary {
  #[serde(flatten)]
  pub entry:              DirectoryEntry,
  pub counterpart_name:   Option<String>,
  pub counterpart_avatar: Option<String>,
  pub presence:           Option<Presence>,
}

impl ConversationSummary {
  pub fn new(entry: DirectoryEntry, counterpart: Option<&User>) -> Self {
    Self {
      entry,
      counterpart_name: counterpart.map(|u| u.display_name.clone()),
      counterpart_avatar: counterpart.and_then(|u| u.avatar_url.clone()),
      presence: counterpart.map(User::presence),
    }
  }
}

// ─── Ranking ─────────────────────────────────────────────────────────────────

/// Ordering of a conversation list: unread above read, then most recent
/// first. Entries without a last message sort after everything else in
/// their group; the counterpart id settles exact ties.
pub fn ranking(a: &DirectoryEntry, b: &DirectoryEntry) -> Ordering {
  b.unread
    .cmp(&a.unread)
    .then_with(|| b.last_message_at.cmp(&a.last_message_at))
    .then_with(|| a.counterpart_id.cmp(&b.counterpart_id))
}

pub fn rank(summaries: &mut [ConversationSummary]) {
  summaries.sort_by(|a, b| ranking(&a.entry, &b.entry));
}

// ─── Component ───────────────────────────────────────────────────────────────

pub struct ConversationDirectory<S> {
  store: Arc<S>,
}

impl<S> Clone for ConversationDirectory<S> {
  fn clone(&self) -> Self { Self { store: Arc::clone(&self.store) } }
}

impl<S: ChatStore> ConversationDirectory<S> {
  pub fn new(store: Arc<S>) -> Self { Self { store } }

  /// Record a send in both participants' directories: read for the sender,
  /// unread for the receiver. The two writes are independent; a failure
  /// between them is repaired by the next send.
  pub async fn upsert_on_send(
    &self,
    sender: &UserId,
    receiver: &UserId,
    text: &str,
    at: DateTime<Utc>,
  ) -> Result<()> {
    self
      .store
      .upsert_directory_entry(sender, receiver, DirectoryWrite {
        last_message: text.to_owned(),
        at,
        unread: false,
      })
      .await
      .lift()?;
    self
      .store
      .upsert_directory_entry(receiver, sender, DirectoryWrite {
        last_message: text.to_owned(),
        at,
        unread: true,
      })
      .await
      .lift()?;
    Ok(())
  }

  /// `owner`'s ranked conversation list with each counterpart's presence.
  pub async fn list_for(&self, owner: &UserId) -> Result<Vec<ConversationSummary>> {
    let entries = self.store.list_directory(owner).await.lift()?;
    let mut summaries = Vec::with_capacity(entries.len());
    for entry in entries {
      let counterpart = self.store.get_user(&entry.counterpart_id).await.lift()?;
      summaries.push(ConversationSummary::new(entry, counterpart.as_ref()));
    }
    rank(&mut summaries);
    Ok(summaries)
  }

  /// Live ranked list for `owner`.
  pub fn watch(&self, owner: &UserId) -> DirectorySubscription<S> {
    DirectorySubscription {
      directory:    self.clone(),
      owner:        owner.clone(),
      feed:         Some(self.store.watch()),
      primed:       false,
      counterparts: HashSet::new(),
    }
  }
}

// ─── DirectorySubscription ───────────────────────────────────────────────────

/// Re-ranked conversation lists, delivered whenever one of the owner's
/// entries changes or a listed counterpart's user record (presence) does.
pub struct DirectorySubscription<S> {
  directory:    ConversationDirectory<S>,
  owner:        UserId,
  feed:         Option<ChangeFeed>,
  primed:       bool,
  counterparts: HashSet<UserId>,
}

impl<S: ChatStore> DirectorySubscription<S> {
  pub async fn next(&mut self) -> Option<Result<Vec<ConversationSummary>>> {
    let feed = self.feed.as_mut()?;
    if self.primed {
      let (owner, counterparts) = (&self.owner, &self.counterparts);
      let open = wait_for(feed, |change| match change {
        Change::Directory { owner: o, .. } => o == owner,
        Change::User(id) => counterparts.contains(id),
        Change::Conversation(_) => false,
      })
      .await;
      if !open {
        self.feed = None;
        return None;
      }
    }
    self.primed = true;

    let result = self.directory.list_for(&self.owner).await;
    if let Ok(summaries) = &result {
      self.counterparts =
        summaries.iter().map(|s| s.entry.counterpart_id.clone()).collect();
    }
    Some(result)
  }

  pub fn close(&mut self) { self.feed = None; }

  pub fn is_closed(&self) -> bool { self.feed.is_none() }
}
