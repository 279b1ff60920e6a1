//! Error types for the drip-render template renderer.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
  #[error("unknown template key: {0:?}")]
  TemplateNotFound(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
