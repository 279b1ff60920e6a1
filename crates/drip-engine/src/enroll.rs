//! Enrollment service.

use chrono::{DateTime, Utc};
use drip_core::{
  dispatch::Dispatcher,
  enrollment::{EnrollmentRequest, NewEnrollment},
  store::EnrollmentStore,
};
use serde::Serialize;
use uuid::Uuid;

use crate::{Error, Result, Sequencer};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EnrollOutcome {
  pub enrollment_id: Uuid,
  /// `false` when an active enrollment already existed for the identity.
  pub created:       bool,
}

impl<S, D> Sequencer<S, D>
where
  S: EnrollmentStore,
  D: Dispatcher,
{
  /// Enroll a contact now. See [`Sequencer::enroll_at`].
  pub async fn enroll(&self, request: EnrollmentRequest) -> Result<EnrollOutcome> {
    self.enroll_at(request, Utc::now()).await
  }

  /// Validate `request` and enroll the contact in this sequencer's campaign
  /// as of `now`.
  ///
  /// Idempotent while the contact is active: a repeat returns the existing
  /// id with `created: false`. Never sends anything; the first message goes
  /// out on the first batch pass after the first stage's offset.
  pub async fn enroll_at(
    &self,
    request: EnrollmentRequest,
    now: DateTime<Utc>,
  ) -> Result<EnrollOutcome> {
    let input = NewEnrollment::from_request(self.sequence.name(), request)?;
    let email = input.identity.email.clone();

    let insertion = self
      .store
      .insert_if_absent(input, now)
      .await
      .map_err(Error::store)?;
    let enrollment_id = insertion.enrollment.enrollment_id;

    if insertion.created {
      tracing::info!(%enrollment_id, %email, campaign = self.sequence.name(), "enrolled contact");
    } else {
      tracing::debug!(%enrollment_id, %email, "contact already enrolled; returning existing id");
    }

    Ok(EnrollOutcome { enrollment_id, created: insertion.created })
  }
}
