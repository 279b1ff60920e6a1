//! In-process periodic batch passes.

use std::{sync::Arc, time::Duration};

use chrono::Utc;
use drip_core::{dispatch::Dispatcher, store::EnrollmentStore};
use drip_engine::Sequencer;
use tokio::time::MissedTickBehavior;

/// Run [`Sequencer::process_due`] every `every`, starting immediately.
///
/// Passes never overlap: a slow pass delays the next tick instead of
/// stacking behind it. Runs until the task is dropped or aborted.
pub async fn run<S, D>(sequencer: Arc<Sequencer<S, D>>, every: Duration)
where
  S: EnrollmentStore,
  D: Dispatcher,
{
  let mut interval = tokio::time::interval(every);
  interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

  loop {
    interval.tick().await;
    match sequencer.process_due(Utc::now()).await {
      Ok(summary) if !summary.errors.is_empty() => {
        tracing::warn!(
          failed = summary.errors.len(),
          first = %summary.errors[0],
          "scheduled pass finished with failures"
        );
      }
      Ok(_) => {}
      Err(e) => tracing::error!(error = %e, "scheduled pass could not scan enrollments"),
    }
  }
}
