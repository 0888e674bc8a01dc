//! Error types for `campus-core`.

use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum Error {
  #[error("subject not found: {0}")]
  SubjectNotFound(Uuid),

  #[error("username already exists: {0:?}")]
  UsernameTaken(String),

  #[error("unrecognised time of day: {0:?}")]
  InvalidTime(String),

  #[error("unknown weekday: {0:?}")]
  InvalidWeekday(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
