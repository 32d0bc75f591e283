//! Integration tests for `SqliteStore` and the engine running on top of it,
//! against an in-memory database.

use std::{sync::Arc, time::Duration};

use chrono::Utc;
use dosti_core::{
  ChatEngine, ConversationId, Error as CoreError, Session, UserId,
  directory::DirectoryWrite,
  live::ChangeKind,
  message::NewMessage,
  presence::PresenceUpdate,
  store::{Change, ChatStore, WriteBatch},
  user::NewUser,
};
use uuid::Uuid;

use crate::{Error, SqliteStore, encode::encode_uuid};

async fn store() -> SqliteStore {
  SqliteStore::open_in_memory()
    .await
    .expect("in-memory store")
}

/// An engine with `alice` and `bob` signed up.
async fn engine() -> Arc<ChatEngine<SqliteStore>> {
  let s = store().await;
  s.create_user(NewUser::new("alice", "Alice")).await.unwrap();
  s.create_user(NewUser::new("bob", "Bob")).await.unwrap();
  Arc::new(ChatEngine::new(Arc::new(s)))
}

fn alice() -> Session { Session::new("alice") }

fn bob() -> Session { Session::new("bob") }

fn uid(s: &str) -> UserId { UserId::from(s) }

fn conv(a: &str, b: &str) -> ConversationId {
  ConversationId::between(&uid(a), &uid(b)).unwrap()
}

async fn within<F: std::future::Future>(f: F) -> F::Output {
  tokio::time::timeout(Duration::from_secs(5), f)
    .await
    .expect("timed out waiting for the change feed")
}

// ─── Users and presence ──────────────────────────────────────────────────────

#[tokio::test]
async fn create_and_get_user() {
  let s = store().await;
  let now = Utc::now();
  let created = s
    .create_user(NewUser::new("alice", "Alice").with_trial(now))
    .await
    .unwrap();
  assert!(created.is_online);
  assert!(created.last_seen.is_some());
  assert_eq!(created.trial_days_left(now), Some(3));

  let fetched = s.get_user(&uid("alice")).await.unwrap().unwrap();
  assert_eq!(fetched, created);
}

#[tokio::test]
async fn get_user_missing_returns_none() {
  let s = store().await;
  assert!(s.get_user(&uid("nobody")).await.unwrap().is_none());
}

#[tokio::test]
async fn duplicate_user_is_rejected() {
  let s = store().await;
  s.create_user(NewUser::new("alice", "Alice")).await.unwrap();
  let err = s.create_user(NewUser::new("alice", "Again")).await.unwrap_err();
  assert!(matches!(err, Error::UserExists(ref id) if id.as_str() == "alice"));
  assert!(matches!(CoreError::from(err), CoreError::UserExists(_)));
}

#[tokio::test]
async fn presence_round_trip() {
  let engine = engine().await;

  let update = engine.disconnect(&alice()).await.unwrap();
  assert_eq!(update, PresenceUpdate::Applied);
  let user = engine.store().get_user(&uid("alice")).await.unwrap().unwrap();
  assert!(!user.is_online);
  let offline_at = user.last_seen.unwrap();

  engine.connect(&alice()).await.unwrap();
  let user = engine.store().get_user(&uid("alice")).await.unwrap().unwrap();
  assert!(user.is_online);
  assert!(user.last_seen.unwrap() >= offline_at);
}

#[tokio::test]
async fn presence_for_missing_user_is_a_noop() {
  let engine = engine().await;
  let ghost = Session::new("ghost");
  assert_eq!(engine.connect(&ghost).await.unwrap(), PresenceUpdate::UserMissing);
  assert!(engine.store().get_user(&uid("ghost")).await.unwrap().is_none());
}

// ─── Message log ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn creation_instants_never_decrease() {
  let engine = engine().await;
  for i in 0..20 {
    let from = if i % 2 == 0 { alice() } else { bob() };
    let to = if i % 2 == 0 { uid("bob") } else { uid("alice") };
    engine.send(&from, &to, &format!("m{i}")).await.unwrap();
  }

  let history = engine.history(&alice(), &uid("bob")).await.unwrap();
  assert_eq!(history.len(), 20);
  for pair in history.windows(2) {
    assert!(pair[0].created_at <= pair[1].created_at);
  }
  let texts: Vec<_> = history.iter().map(|m| m.text.as_str()).collect();
  let expected: Vec<_> = (0..20).map(|i| format!("m{i}")).collect();
  assert_eq!(texts, expected);
}

#[tokio::test]
async fn conversations_are_isolated() {
  let engine = engine().await;
  engine.send(&alice(), &uid("bob"), "for bob").await.unwrap();
  engine.send(&alice(), &uid("carol"), "for carol").await.unwrap();

  let with_bob = engine.history(&alice(), &uid("bob")).await.unwrap();
  assert_eq!(with_bob.len(), 1);
  assert_eq!(with_bob[0].text, "for bob");
}

#[tokio::test]
async fn separator_in_user_ids_does_not_merge_conversations() {
  let engine = engine().await;
  let (left, right) = (Session::new("a_b"), Session::new("a"));
  assert_eq!(
    conv("a_b", "c").key(),
    conv("a", "b_c").key(),
    "rendered keys coincide; storage must not rely on them"
  );

  let m = engine.send(&left, &uid("c"), "for c only").await.unwrap();

  assert!(engine.history(&right, &uid("b_c")).await.unwrap().is_empty());
  assert_eq!(engine.history(&left, &uid("c")).await.unwrap().len(), 1);

  let err = engine
    .react(&right, &uid("b_c"), m.message_id, "👍")
    .await
    .unwrap_err();
  assert!(matches!(err, CoreError::MessageNotFound(_)));

  let outcome = engine.mark_seen(&Session::new("b_c"), &uid("a")).await.unwrap();
  assert!(outcome.marked_seen.is_empty());
  let stored = engine.history(&left, &uid("c")).await.unwrap();
  assert!(!stored[0].is_seen);
}

#[tokio::test]
async fn blank_text_is_rejected() {
  let engine = engine().await;
  let err = engine.send(&alice(), &uid("bob"), "   ").await.unwrap_err();
  assert!(matches!(err, CoreError::EmptyMessage));
  assert!(engine.history(&alice(), &uid("bob")).await.unwrap().is_empty());
}

#[tokio::test]
async fn sending_to_yourself_is_rejected() {
  let engine = engine().await;
  let err = engine.send(&alice(), &uid("alice"), "hi").await.unwrap_err();
  assert!(matches!(err, CoreError::InvalidParticipants));
}

#[tokio::test]
async fn foreign_sender_is_rejected() {
  let engine = engine().await;
  let err = engine
    .log()
    .append(&conv("alice", "bob"), &uid("mallory"), &uid("bob"), "hi")
    .await
    .unwrap_err();
  assert!(matches!(err, CoreError::ParticipantMismatch { .. }));
  assert!(err.is_validation());
}

// ─── Directory ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn send_updates_both_directories() {
  let engine = engine().await;
  engine.send(&alice(), &uid("bob"), "hi").await.unwrap();

  let bobs = engine.inbox(&bob()).await.unwrap();
  assert_eq!(bobs.len(), 1);
  assert_eq!(bobs[0].entry.counterpart_id, uid("alice"));
  assert_eq!(bobs[0].entry.last_message.as_deref(), Some("hi"));
  assert!(bobs[0].entry.unread);
  assert_eq!(bobs[0].counterpart_name.as_deref(), Some("Alice"));
  assert!(bobs[0].presence.is_some_and(|p| p.online));

  let alices = engine.inbox(&alice()).await.unwrap();
  assert_eq!(alices.len(), 1);
  assert_eq!(alices[0].entry.last_message.as_deref(), Some("hi"));
  assert!(!alices[0].entry.unread);
}

#[tokio::test]
async fn inbox_is_ranked_unread_first() {
  let engine = engine().await;
  engine.store().create_user(NewUser::new("carol", "Carol")).await.unwrap();

  engine.send(&alice(), &uid("bob"), "old").await.unwrap();
  tokio::time::sleep(Duration::from_millis(5)).await;
  engine.send(&bob(), &uid("carol"), "newer, read").await.unwrap();

  let inbox = engine.inbox(&bob()).await.unwrap();
  let order: Vec<_> = inbox.iter().map(|s| s.entry.counterpart_id.as_str()).collect();
  assert_eq!(order, vec!["alice", "carol"]);

  engine.mark_seen(&bob(), &uid("alice")).await.unwrap();
  let inbox = engine.inbox(&bob()).await.unwrap();
  let order: Vec<_> = inbox.iter().map(|s| s.entry.counterpart_id.as_str()).collect();
  assert_eq!(order, vec!["carol", "alice"]);
}

#[tokio::test]
async fn stale_directory_write_is_ignored() {
  let s = store().await;
  let now = Utc::now();
  let (a, b) = (uid("alice"), uid("bob"));

  s.upsert_directory_entry(&a, &b, DirectoryWrite {
    last_message: "newer".into(),
    at:           now,
    unread:       true,
  })
  .await
  .unwrap();
  let entry = s
    .upsert_directory_entry(&a, &b, DirectoryWrite {
      last_message: "older".into(),
      at:           now - chrono::Duration::seconds(5),
      unread:       false,
    })
    .await
    .unwrap();

  assert_eq!(entry.last_message.as_deref(), Some("newer"));
  assert!(entry.unread);
}

// ─── Receipts ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn mark_seen_is_idempotent() {
  let engine = engine().await;
  engine.send(&alice(), &uid("bob"), "one").await.unwrap();
  engine.send(&alice(), &uid("bob"), "two").await.unwrap();
  engine.send(&bob(), &uid("alice"), "mine").await.unwrap();

  let first = engine.mark_seen(&bob(), &uid("alice")).await.unwrap();
  assert_eq!(first.marked_seen.len(), 2);

  let history = engine.history(&bob(), &uid("alice")).await.unwrap();
  let seen_at: Vec<_> = history.iter().map(|m| m.seen_at).collect();
  for m in &history {
    // Bob's own message is only seen when Alice opens the conversation.
    assert_eq!(m.is_seen, m.receiver_id == uid("bob"));
  }

  let second = engine.mark_seen(&bob(), &uid("alice")).await.unwrap();
  assert!(second.is_noop());
  let again = engine.history(&bob(), &uid("alice")).await.unwrap();
  assert_eq!(again.iter().map(|m| m.seen_at).collect::<Vec<_>>(), seen_at);
}

#[tokio::test]
async fn mark_seen_by_outsider_is_rejected() {
  let engine = engine().await;
  let err = engine
    .receipts()
    .mark_seen(&conv("alice", "bob"), &uid("mallory"))
    .await
    .unwrap_err();
  assert!(matches!(err, CoreError::NotAParticipant { ref user, .. } if user.as_str() == "mallory"));
  assert!(err.is_validation());
}

#[tokio::test]
async fn mark_seen_clears_stale_unread_flag() {
  let engine = engine().await;
  let message = engine.send(&alice(), &uid("bob"), "hi").await.unwrap();

  // Seen through a path that left the directory untouched.
  let mut batch = WriteBatch::new();
  batch.mark_seen(&conv("alice", "bob"), message.message_id);
  engine.store().commit(batch).await.unwrap();

  let outcome = engine.mark_seen(&bob(), &uid("alice")).await.unwrap();
  assert!(outcome.marked_seen.is_empty());
  assert!(outcome.unread_cleared);
  assert!(!engine.inbox(&bob()).await.unwrap()[0].entry.unread);
}

#[tokio::test]
async fn batch_skips_already_seen_messages() {
  let s = store().await;
  let c = conv("alice", "bob");
  let m = s
    .insert_message(&c, NewMessage {
      sender_id:   uid("alice"),
      receiver_id: uid("bob"),
      text:        "hi".into(),
    })
    .await
    .unwrap();

  let mut batch = WriteBatch::new();
  batch.mark_seen(&c, m.message_id);
  let first = s.commit(batch.clone()).await.unwrap();
  assert_eq!(first.seen, vec![m.message_id]);
  let seen_at = s.get_message(&c, m.message_id).await.unwrap().unwrap().seen_at;

  let second = s.commit(batch).await.unwrap();
  assert!(second.seen.is_empty());
  let after = s.get_message(&c, m.message_id).await.unwrap().unwrap();
  assert!(after.is_seen);
  assert_eq!(after.seen_at, seen_at);
}

#[tokio::test]
async fn seen_flag_cannot_be_reverted() {
  let s = store().await;
  let c = conv("alice", "bob");
  let m = s
    .insert_message(&c, NewMessage {
      sender_id:   uid("alice"),
      receiver_id: uid("bob"),
      text:        "hi".into(),
    })
    .await
    .unwrap();
  let mut batch = WriteBatch::new();
  batch.mark_seen(&c, m.message_id);
  s.commit(batch).await.unwrap();

  let id_str = encode_uuid(m.message_id);
  let reverted = s
    .connection()
    .call(move |conn| {
      Ok(conn.execute(
        "UPDATE messages SET is_seen = 0, seen_at = NULL WHERE message_id = ?1",
        rusqlite::params![id_str],
      )?)
    })
    .await;
  assert!(reverted.is_err());

  let after = s.get_message(&c, m.message_id).await.unwrap().unwrap();
  assert!(after.is_seen);
  assert!(after.seen_at.is_some());
}

// ─── Reactions ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn toggle_twice_is_a_net_noop() {
  let engine = engine().await;
  let m = engine.send(&bob(), &uid("alice"), "hi").await.unwrap();

  let on = engine.react(&alice(), &uid("bob"), m.message_id, "❤️").await.unwrap();
  assert!(on.added);
  assert!(on.reactions.contains("❤️", &uid("alice")));

  let off = engine.react(&alice(), &uid("bob"), m.message_id, "❤️").await.unwrap();
  assert!(!off.added);
  assert!(off.reactions.users("❤️").is_none());
  assert!(off.reactions.is_empty());

  let stored = engine.history(&alice(), &uid("bob")).await.unwrap();
  assert!(stored[0].reactions.is_empty());
}

#[tokio::test]
async fn concurrent_toggles_are_not_lost() {
  let engine = engine().await;
  let m = engine.send(&bob(), &uid("alice"), "hi").await.unwrap();
  let id = m.message_id;

  let (sa, sb) = (alice(), bob());
  let (ua, ub) = (uid("alice"), uid("bob"));
  let (a, b, c) = tokio::join!(
    engine.react(&sa, &ub, id, "❤️"),
    engine.react(&sb, &ua, id, "😂"),
    engine.react(&sb, &ua, id, "❤️"),
  );
  assert!(a.unwrap().added && b.unwrap().added && c.unwrap().added);

  let stored = engine.history(&alice(), &uid("bob")).await.unwrap();
  let reactions = &stored[0].reactions;
  assert_eq!(reactions.count("❤️"), 2);
  assert!(reactions.contains("😂", &uid("bob")));
}

#[tokio::test]
async fn reaction_on_missing_message_fails() {
  let engine = engine().await;
  let missing = Uuid::new_v4();
  let err = engine
    .react(&alice(), &uid("bob"), missing, "👍")
    .await
    .unwrap_err();
  assert!(matches!(err, CoreError::MessageNotFound(id) if id == missing));
}

#[tokio::test]
async fn reaction_from_another_conversation_is_not_found() {
  let engine = engine().await;
  let m = engine.send(&alice(), &uid("bob"), "hi").await.unwrap();
  let carol = Session::new("carol");
  let err = engine
    .react(&carol, &uid("alice"), m.message_id, "👍")
    .await
    .unwrap_err();
  assert!(matches!(err, CoreError::MessageNotFound(_)));
}

#[tokio::test]
async fn blank_reaction_is_rejected() {
  let engine = engine().await;
  let m = engine.send(&alice(), &uid("bob"), "hi").await.unwrap();
  let err = engine
    .react(&bob(), &uid("alice"), m.message_id, "  ")
    .await
    .unwrap_err();
  assert!(matches!(err, CoreError::InvalidReaction));
}

// ─── Live views ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn store_publishes_changes() {
  let s = store().await;
  let mut feed = s.watch();
  s.create_user(NewUser::new("alice", "Alice")).await.unwrap();
  assert_eq!(feed.recv().await.unwrap(), Change::User(uid("alice")));
}

#[tokio::test]
async fn message_subscription_delivers_backlog_then_changes() {
  let engine = engine().await;
  let first = engine.send(&alice(), &uid("bob"), "backlog").await.unwrap();

  let mut sub = engine.subscribe(&bob(), &uid("alice")).unwrap();
  let snapshot = within(sub.next()).await.unwrap().unwrap();
  assert_eq!(snapshot.messages.len(), 1);
  assert_eq!(snapshot.changes[0].kind, ChangeKind::Added);
  assert_eq!(snapshot.changes[0].message_id, first.message_id);

  let second = engine.send(&bob(), &uid("alice"), "live").await.unwrap();
  let snapshot = within(sub.next()).await.unwrap().unwrap();
  assert_eq!(snapshot.messages.len(), 2);
  assert_eq!(snapshot.changes.len(), 1);
  assert_eq!(snapshot.changes[0].kind, ChangeKind::Added);
  assert_eq!(snapshot.changes[0].message_id, second.message_id);

  engine.mark_seen(&bob(), &uid("alice")).await.unwrap();
  let snapshot = within(sub.next()).await.unwrap().unwrap();
  assert_eq!(snapshot.changes.len(), 1);
  assert_eq!(snapshot.changes[0].kind, ChangeKind::Modified);
  assert_eq!(snapshot.changes[0].message_id, first.message_id);

  sub.close();
  assert!(sub.is_closed());
  assert!(sub.next().await.is_none());
}

#[tokio::test]
async fn inbox_watch_follows_entries_and_presence() {
  let engine = engine().await;
  let mut watch = engine.watch_inbox(&bob());
  assert!(within(watch.next()).await.unwrap().unwrap().is_empty());

  engine.send(&alice(), &uid("bob"), "hi").await.unwrap();
  let list = within(watch.next()).await.unwrap().unwrap();
  assert_eq!(list.len(), 1);
  assert!(list[0].entry.unread);

  engine.disconnect(&alice()).await.unwrap();
  let list = within(watch.next()).await.unwrap().unwrap();
  assert!(list[0].presence.is_some_and(|p| !p.online));

  watch.close();
  assert!(watch.next().await.is_none());
}

// ─── Scenarios ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn send_open_and_react() {
  let engine = engine().await;

  // A sends "hi" to B.
  let hi = engine.send(&alice(), &uid("bob"), "hi").await.unwrap();
  let bobs = engine.inbox(&bob()).await.unwrap();
  assert_eq!(bobs[0].entry.last_message.as_deref(), Some("hi"));
  assert!(bobs[0].entry.unread);
  let alices = engine.inbox(&alice()).await.unwrap();
  assert_eq!(alices[0].entry.last_message.as_deref(), Some("hi"));
  assert!(!alices[0].entry.unread);

  // B opens the conversation.
  let outcome = engine.mark_seen(&bob(), &uid("alice")).await.unwrap();
  assert_eq!(outcome.marked_seen, vec![hi.message_id]);
  assert!(outcome.unread_cleared);
  let stored = engine.history(&bob(), &uid("alice")).await.unwrap();
  assert!(stored[0].is_seen);
  assert!(stored[0].seen_at.is_some());
  assert!(!engine.inbox(&bob()).await.unwrap()[0].entry.unread);

  // A toggles a heart on B's reply twice.
  let reply = engine.send(&bob(), &uid("alice"), "hey").await.unwrap();
  engine.react(&alice(), &uid("bob"), reply.message_id, "❤️").await.unwrap();
  let off = engine.react(&alice(), &uid("bob"), reply.message_id, "❤️").await.unwrap();
  assert!(off.reactions.users("❤️").is_none());
}
