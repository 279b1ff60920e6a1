//! The `Dispatcher` trait, which hands a rendered message to a delivery
//! provider.

use std::{future::Future, time::Duration};

use serde::Serialize;
use thiserror::Error;

/// A fully rendered message addressed to one recipient.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutboundMessage {
  pub to:              String,
  pub subject:         String,
  pub html:            String,
  /// Stable per (enrollment, stage); lets a provider drop a re-send of a
  /// message it already accepted.
  pub idempotency_key: String,
}

/// What the provider reported for an accepted message.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Delivery {
  /// Provider-side message id, when one was returned.
  pub provider_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DispatchError {
  #[error("no delivery provider is configured")]
  NotConfigured,

  /// The provider answered and refused the message.
  #[error("provider rejected message: {0}")]
  Provider(String),

  /// The provider could not be reached or its answer could not be read.
  #[error("transport error: {0}")]
  Transport(String),

  #[error("dispatch timed out after {0:?}")]
  Timeout(Duration),
}

/// A delivery provider. Implementations make exactly one attempt per call;
/// retries happen on the next scheduler pass.
pub trait Dispatcher: Send + Sync {
  fn send<'a>(
    &'a self,
    message: &'a OutboundMessage,
  ) -> impl Future<Output = Result<Delivery, DispatchError>> + Send + 'a;
}
