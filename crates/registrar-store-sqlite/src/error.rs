//! Error type for `registrar-store-sqlite`.

use registrar_core::store::{StoreError, StoreErrorKind};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum Error {
  #[error("core error: {0}")]
  Core(#[from] registrar_core::Error),

  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("uuid parse error: {0}")]
  Uuid(#[from] uuid::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  /// A column held a value outside the range of its domain type.
  #[error("decode error: {0}")]
  Decode(String),

  /// A referenced record (department, professor, room, subject) is missing.
  #[error("{entity} not found: {id}")]
  NotFound { entity: &'static str, id: Uuid },

  /// A unique column (student number, department or room name) is taken.
  #[error("duplicate {0}")]
  Duplicate(String),
}

impl Error {
  pub fn is_not_found(&self) -> bool { matches!(self, Self::NotFound { .. }) }
}

impl StoreError for Error {
  fn kind(&self) -> StoreErrorKind {
    match self {
      Self::NotFound { .. } => StoreErrorKind::NotFound,
      Self::Duplicate(_) => StoreErrorKind::Conflict,
      Self::Core(e) if !e.is_infrastructure() => StoreErrorKind::Invalid,
      _ => StoreErrorKind::Unavailable,
    }
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
