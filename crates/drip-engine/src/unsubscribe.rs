//! Opt-out.

use drip_core::{
  ValidationError,
  dispatch::Dispatcher,
  store::{EnrollmentFilter, EnrollmentStore},
  validate::normalize_email,
};
use serde::Serialize;

use crate::{Error, Result, Sequencer};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum UnsubscribeOutcome {
  /// `count` active enrollments were moved to `unsubscribed`.
  Unsubscribed { count: usize },
  /// No active enrollment matched the address.
  NotFound,
}

impl<S, D> Sequencer<S, D>
where
  S: EnrollmentStore,
  D: Dispatcher,
{
  /// Move every active enrollment for `email`, in any campaign, to
  /// `unsubscribed`. Calling it again afterwards returns `NotFound`.
  pub async fn unsubscribe(&self, email: &str) -> Result<UnsubscribeOutcome> {
    let email = normalize_email(email);
    if email.is_empty() {
      return Err(ValidationError::new("email", "is required").into());
    }

    let filter = EnrollmentFilter {
      email: Some(email.clone()),
      ..EnrollmentFilter::active()
    };
    let active = self.store.list(&filter).await.map_err(Error::store)?;

    let mut count = 0;
    for mut current in active {
      let id = current.enrollment_id;
      // Retry against fresh progress if a batch pass advanced the record
      // between our read and the write.
      loop {
        let next = current.progress.unsubscribed();
        if self
          .store
          .compare_and_set(id, current.progress.clone(), next)
          .await
          .map_err(Error::store)?
        {
          count += 1;
          break;
        }
        match self.store.get(id).await.map_err(Error::store)? {
          Some(fresh) if fresh.is_active() => current = fresh,
          _ => break,
        }
      }
    }

    if count == 0 {
      tracing::debug!(%email, "unsubscribe: no active enrollment");
      Ok(UnsubscribeOutcome::NotFound)
    } else {
      tracing::info!(%email, count, "unsubscribed");
      Ok(UnsubscribeOutcome::Unsubscribed { count })
    }
  }
}
