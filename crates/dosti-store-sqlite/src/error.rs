//! Error type for `dosti-store-sqlite`.

use dosti_core::id::UserId;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("core error: {0}")]
  Core(#[from] dosti_core::Error),

  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("uuid parse error: {0}")]
  Uuid(#[from] uuid::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  /// A row that violates the record contract.
  #[error("malformed row: {0}")]
  Malformed(String),

  #[error("user already exists: {0}")]
  UserExists(UserId),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

impl From<Error> for dosti_core::Error {
  fn from(e: Error) -> Self {
    match e {
      Error::Core(e) => e,
      Error::UserExists(id) => Self::UserExists(id),
      Error::Uuid(e) => Self::MalformedDocument {
        kind:   "record",
        reason: e.to_string(),
      },
      Error::DateParse(reason) | Error::Malformed(reason) => {
        Self::MalformedDocument { kind: "record", reason }
      }
      Error::Database(e) => Self::StoreUnavailable(Box::new(e)),
    }
  }
}
