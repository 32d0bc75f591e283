//! Conversation synchronisation engine for the Dosti chat client.
//!
//! Derives conversation identities, keeps the ordered message log, tracks
//! read receipts, aggregates reactions, records presence, and ranks each
//! user's conversation list. Persistence and change delivery are delegated
//! to a [`store::ChatStore`] backend.
//!
//! This crate is deliberately free of HTTP and database dependencies.

pub mod directory;
pub mod engine;
pub mod error;
pub mod id;
pub mod live;
pub mod log;
pub mod message;
pub mod presence;
pub mod reactions;
pub mod receipts;
pub mod session;
pub mod store;
pub mod user;

pub use engine::ChatEngine;
pub use error::{Error, Result};
pub use id::{ConversationId, MessageId, UserId, conversation_id};
pub use session::Session;
