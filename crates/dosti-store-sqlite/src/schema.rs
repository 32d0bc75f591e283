//! SQL schema for the Dosti SQLite store.
//!
//! Executed once at connection startup via `PRAGMA user_version`. Future
//! migrations will be gated on that version number.

/// Full schema DDL; idempotent thanks to `IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS users (
    user_id          TEXT PRIMARY KEY,
    display_name     TEXT NOT NULL,
    avatar_url       TEXT,
    bio              TEXT,
    is_online        INTEGER NOT NULL DEFAULT 0,
    last_seen        TEXT,            -- RFC 3339 UTC; presence tracker only
    is_pro           INTEGER NOT NULL DEFAULT 0,
    trial_ends_at    TEXT,
    has_active_story INTEGER NOT NULL DEFAULT 0,
    created_at       TEXT NOT NULL
);

-- Messages are never deleted. Only is_seen/seen_at are ever updated.
-- `seq` records insertion order and breaks created_at ties. Rows are
-- scoped by the participant pair (low_id, high_id); conversation_id is the
-- rendered key, kept for display only.
CREATE TABLE IF NOT EXISTS messages (
    seq             INTEGER PRIMARY KEY AUTOINCREMENT,
    message_id      TEXT NOT NULL UNIQUE,
    conversation_id TEXT NOT NULL,
    low_id          TEXT NOT NULL,
    high_id         TEXT NOT NULL,
    sender_id       TEXT NOT NULL,
    receiver_id     TEXT NOT NULL,
    body            TEXT NOT NULL,
    created_at      TEXT NOT NULL,   -- server-assigned, non-decreasing per conversation
    is_seen         INTEGER NOT NULL DEFAULT 0,
    seen_at         TEXT
);

-- One row per (message, symbol, user): a reaction set is the rows sharing
-- (message_id, symbol). Union is INSERT OR IGNORE, difference is DELETE,
-- so an empty set cannot exist.
CREATE TABLE IF NOT EXISTS reactions (
    message_id TEXT NOT NULL REFERENCES messages(message_id),
    symbol     TEXT NOT NULL,
    user_id    TEXT NOT NULL,
    reacted_at TEXT NOT NULL,
    PRIMARY KEY (message_id, symbol, user_id)
);

CREATE TABLE IF NOT EXISTS directory_entries (
    owner_id        TEXT NOT NULL,
    counterpart_id  TEXT NOT NULL,
    last_message    TEXT,
    last_message_at TEXT,
    unread          INTEGER NOT NULL DEFAULT 0,
    PRIMARY KEY (owner_id, counterpart_id)
);

CREATE INDEX IF NOT EXISTS messages_conversation_idx
    ON messages(low_id, high_id, created_at, seq);

-- The seen flag only moves forward.
CREATE TRIGGER IF NOT EXISTS messages_seen_is_monotonic
BEFORE UPDATE OF is_seen ON messages
WHEN OLD.is_seen = 1 AND NEW.is_seen = 0
BEGIN
    SELECT RAISE(ABORT, 'is_seen cannot revert to false');
END;

PRAGMA user_version = 1;
";
