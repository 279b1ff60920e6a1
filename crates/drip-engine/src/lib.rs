//! The drip sequencer: enrollment, scheduled batch dispatch, and opt-out.
//!
//! [`Sequencer`] ties an [`EnrollmentStore`], a [`Dispatcher`], a
//! [`Sequence`] and a [`Renderer`] together. It owns no timer; callers run
//! [`Sequencer::process_due`] on whatever schedule they like.

mod enroll;
mod process;
mod queue;
mod unsubscribe;

pub mod error;

pub use enroll::EnrollOutcome;
pub use error::{Error, Result};
pub use process::{BatchSummary, idempotency_key};
pub use queue::{QueueReport, QueueStats};
pub use unsubscribe::UnsubscribeOutcome;

use std::{sync::Arc, time::Duration};

use drip_core::{dispatch::Dispatcher, sequence::Sequence, store::EnrollmentStore};
use drip_render::Renderer;
use tokio::sync::Mutex;

/// Upper bound on a single provider call before it counts as failed.
pub const DEFAULT_DISPATCH_TIMEOUT: Duration = Duration::from_secs(30);

pub struct Sequencer<S, D> {
  store:            Arc<S>,
  dispatcher:       D,
  sequence:         Sequence,
  renderer:         Renderer,
  dispatch_timeout: Duration,
  /// Held for a whole [`Sequencer::process_due`] pass.
  pass_lock:        Mutex<()>,
}

impl<S, D> Sequencer<S, D>
where
  S: EnrollmentStore,
  D: Dispatcher,
{
  pub fn new(
    store: Arc<S>,
    dispatcher: D,
    sequence: Sequence,
    renderer: Renderer,
  ) -> Self {
    Self {
      store,
      dispatcher,
      sequence,
      renderer,
      dispatch_timeout: DEFAULT_DISPATCH_TIMEOUT,
      pass_lock: Mutex::new(()),
    }
  }

  pub fn with_dispatch_timeout(mut self, timeout: Duration) -> Self {
    self.dispatch_timeout = timeout;
    self
  }

  pub fn store(&self) -> &Arc<S> { &self.store }

  pub fn dispatcher(&self) -> &D { &self.dispatcher }

  pub fn sequence(&self) -> &Sequence { &self.sequence }

  pub fn renderer(&self) -> &Renderer { &self.renderer }
}

#[cfg(test)]
mod tests;
