//! User record: profile fields owned by the account collaborators, and the
//! presence fields owned by [`crate::presence::PresenceTracker`].

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::id::UserId;

/// Length of the free trial granted at sign-up.
pub const TRIAL_DAYS: i64 = 3;

/// Online flag and last-seen instant of a user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Presence {
  pub online:    bool,
  pub last_seen: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
  pub user_id:          UserId,
  pub display_name:     String,
  pub avatar_url:       Option<String>,
  pub bio:              Option<String>,
  /// Written only by the presence tracker.
  pub is_online:        bool,
  /// Written only by the presence tracker.
  pub last_seen:        Option<DateTime<Utc>>,
  pub is_pro:           bool,
  pub trial_ends_at:    Option<DateTime<Utc>>,
  pub has_active_story: bool,
  pub created_at:       DateTime<Utc>,
}

impl User {
  pub fn presence(&self) -> Presence {
    Presence { online: self.is_online, last_seen: self.last_seen }
  }

  /// Whole days of trial left at `now`, rounded up.
  ///
  /// `None` for pro users; `Some(0)` once the trial has lapsed or when no
  /// trial was ever granted.
  pub fn trial_days_left(&self, now: DateTime<Utc>) -> Option<i64> {
    if self.is_pro {
      return None;
    }
    let Some(ends_at) = self.trial_ends_at else {
      return Some(0);
    };
    let day_ms = Duration::days(1).num_milliseconds();
    let left_ms = (ends_at - now).num_milliseconds();
    if left_ms <= 0 {
      Some(0)
    } else {
      Some((left_ms + day_ms - 1) / day_ms)
    }
  }
}

/// Input to [`crate::store::ChatStore::create_user`]. Presence and
/// `created_at` are always set by the store.
#[derive(Debug, Clone)]
pub struct NewUser {
  pub user_id:          UserId,
  pub display_name:     String,
  pub avatar_url:       Option<String>,
  pub bio:              Option<String>,
  pub is_pro:           bool,
  pub trial_ends_at:    Option<DateTime<Utc>>,
  pub has_active_story: bool,
}

impl NewUser {
  pub fn new(user_id: impl Into<UserId>, display_name: impl Into<String>) -> Self {
    Self {
      user_id:          user_id.into(),
      display_name:     display_name.into(),
      avatar_url:       None,
      bio:              None,
      is_pro:           false,
      trial_ends_at:    None,
      has_active_story: false,
    }
  }

  /// Start the standard sign-up trial at `now`.
  pub fn with_trial(mut self, now: DateTime<Utc>) -> Self {
    self.trial_ends_at = Some(now + Duration::days(TRIAL_DAYS));
    self
  }
}
