//! SQLite backend for the Dosti chat store.
//!
//! Wraps [`tokio_rusqlite`] so all database access runs on a dedicated thread
//! without blocking the async runtime. Change notifications are fanned out
//! over a [`tokio::sync::broadcast`] channel owned by the store.

mod encode;
mod schema;
mod store;

pub mod error;

pub use error::{Error, Result};
pub use store::{DEFAULT_FEED_CAPACITY, SqliteStore};

#[cfg(test)]
mod tests;
