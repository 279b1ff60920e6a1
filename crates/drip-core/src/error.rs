//! Error types for `drip-core`.

use thiserror::Error;

use crate::enrollment::EnrollmentStatus;

#[derive(Debug, Error)]
pub enum Error {
  /// A terminal enrollment was asked to change.
  #[error("enrollment is {0} and can no longer change")]
  Terminal(EnrollmentStatus),

  #[error("stage index cannot move backwards ({from} -> {to})")]
  StageRegression { from: usize, to: usize },

  #[error("messages_sent cannot decrease ({from} -> {to})")]
  CounterRegression { from: u32, to: u32 },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Rejected enrollment input. `field` names the offending request field.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid {field}: {reason}")]
pub struct ValidationError {
  pub field:  &'static str,
  pub reason: String,
}

impl ValidationError {
  pub fn new(field: &'static str, reason: impl Into<String>) -> Self {
    Self { field, reason: reason.into() }
  }
}

/// A sequence definition that violates its ordering rules.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SequenceError {
  #[error("a sequence needs at least one stage")]
  Empty,

  #[error(
    "stage {index} offset ({offset} days) must be greater than the previous \
     stage ({previous} days)"
  )]
  NotIncreasing {
    index:    usize,
    previous: u32,
    offset:   u32,
  },

  #[error("stage {0} has an empty template key")]
  EmptyTemplate(usize),
}
