//! Error type for `drip-engine`.

use drip_core::ValidationError;
use thiserror::Error;

/// Errors returned synchronously to the caller of an engine operation.
///
/// Per-contact failures inside a batch pass are not errors at this level;
/// they are collected into [`BatchSummary::errors`](crate::BatchSummary).
#[derive(Debug, Error)]
pub enum Error {
  #[error(transparent)]
  Validation(#[from] ValidationError),

  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl Error {
  pub(crate) fn store<E>(e: E) -> Self
  where
    E: std::error::Error + Send + Sync + 'static,
  {
    Self::Store(Box::new(e))
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
