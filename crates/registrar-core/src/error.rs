//! Error types for `registrar-core`.
//!
//! Business-rule rejections are not errors; they are values of
//! [`EnrollOutcome`](crate::enrollment::EnrollOutcome) and
//! [`CancelOutcome`](crate::enrollment::CancelOutcome). This type covers
//! requests that cannot be evaluated at all.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  /// The request was malformed or referenced records that do not exist.
  #[error("invalid request: {0}")]
  InvalidRequest(String),

  /// The caller is authenticated but lacks the required capability.
  #[error("forbidden")]
  Forbidden,

  #[error("capacity must be at least 1, got {0}")]
  ZeroCapacity(u32),

  #[error("meeting must end after it starts ({start} >= {end})")]
  EmptyMeeting {
    start: chrono::NaiveTime,
    end:   chrono::NaiveTime,
  },

  /// Meeting times are stored with whole-second precision.
  #[error("meeting times must be whole seconds, got {0}")]
  FractionalSeconds(chrono::NaiveTime),

  /// The persistence store could not evaluate or commit the request.
  #[error("infrastructure error: {0}")]
  Infrastructure(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl Error {
  /// Wrap a backend error as an infrastructure failure.
  pub fn infrastructure<E>(err: E) -> Self
  where
    E: std::error::Error + Send + Sync + 'static,
  {
    Self::Infrastructure(Box::new(err))
  }

  pub fn is_infrastructure(&self) -> bool {
    matches!(self, Self::Infrastructure(_))
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
