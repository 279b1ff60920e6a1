//! Scheduler batch pass: find due contacts, render, dispatch, advance.

use chrono::{DateTime, Utc};
use drip_core::{
  dispatch::{DispatchError, Dispatcher, OutboundMessage},
  enrollment::{Enrollment, EnrollmentStatus, Progress},
  sequence::is_due,
  store::{EnrollmentFilter, EnrollmentStore},
};
use serde::Serialize;
use sha2::{Digest, Sha256};
use thiserror::Error;
use uuid::Uuid;

use crate::{Error, Result, Sequencer};

/// Result of one [`Sequencer::process_due`] pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
  /// Active enrollments scanned.
  pub evaluated: usize,
  /// Messages accepted by the provider.
  pub sent:      usize,
  /// Enrollments that received their final stage in this pass.
  pub completed: usize,
  /// One `"<email>: <reason>"` line per contact that failed.
  pub errors:    Vec<String>,
}

/// Stable key for stage `stage_index` of `enrollment_id`; a re-send of the
/// same stage carries the same key.
pub fn idempotency_key(enrollment_id: Uuid, stage_index: usize) -> String {
  let mut hasher = Sha256::new();
  hasher.update(enrollment_id.as_bytes());
  hasher.update((stage_index as u64).to_be_bytes());
  hex::encode(hasher.finalize())
}

/// Why a single contact was not advanced in this pass.
#[derive(Debug, Error)]
enum StepError {
  #[error(transparent)]
  Render(#[from] drip_render::Error),

  #[error(transparent)]
  Dispatch(#[from] DispatchError),

  #[error("store error: {0}")]
  Store(String),

  #[error("message delivered but progress was not recorded: {0}")]
  Unrecorded(String),
}

enum Step {
  NotDue,
  /// The record changed between scan and dispatch (e.g. an opt-out).
  Changed,
  /// The stage was delivered but another writer moved the record first.
  SentUnrecorded,
  /// The record pointed past the end of a shortened sequence.
  Retired,
  Sent { completed: bool },
}

impl<S, D> Sequencer<S, D>
where
  S: EnrollmentStore,
  D: Dispatcher,
{
  /// Run one batch pass as of `now`.
  ///
  /// Every active enrollment in the campaign is evaluated once and receives
  /// at most one message. A contact that fails keeps its progress and is
  /// retried on the next pass; the failure is recorded in the summary and
  /// the pass moves on. Only a failed initial scan is returned as `Err`.
  ///
  /// Passes are serialised: a pass started while another is running waits
  /// for it and then scans fresh records.
  pub async fn process_due(&self, now: DateTime<Utc>) -> Result<BatchSummary> {
    let _pass = self.pass_lock.lock().await;
    let filter = EnrollmentFilter {
      campaign: Some(self.sequence.name().to_owned()),
      ..EnrollmentFilter::active()
    };
    let candidates = self.store.list(&filter).await.map_err(Error::store)?;

    let mut summary = BatchSummary::default();
    for enrollment in &candidates {
      summary.evaluated += 1;
      match self.process_one(enrollment, now).await {
        Ok(Step::NotDue) => {}
        Ok(Step::Changed) => {
          tracing::debug!(
            enrollment_id = %enrollment.enrollment_id,
            "enrollment changed since scan; skipped"
          );
        }
        Ok(Step::SentUnrecorded) => {}
        Ok(Step::Retired) => {}
        Ok(Step::Sent { completed }) => {
          summary.sent += 1;
          if completed {
            summary.completed += 1;
          }
        }
        Err(e) => {
          tracing::warn!(
            enrollment_id = %enrollment.enrollment_id,
            email = %enrollment.identity.email,
            stage = enrollment.progress.stage_index,
            error = %e,
            "stage dispatch failed; will retry next pass"
          );
          summary
            .errors
            .push(format!("{}: {e}", enrollment.identity.email));
        }
      }
    }

    tracing::info!(
      evaluated = summary.evaluated,
      sent = summary.sent,
      completed = summary.completed,
      failed = summary.errors.len(),
      "batch pass finished"
    );
    Ok(summary)
  }

  async fn process_one(
    &self,
    enrollment: &Enrollment,
    now: DateTime<Utc>,
  ) -> Result<Step, StepError> {
    let id = enrollment.enrollment_id;
    let index = enrollment.progress.stage_index;
    let (Some(stage), Some(wait)) =
      (self.sequence.stage(index), self.sequence.required_wait(index))
    else {
      return self.retire(enrollment).await;
    };

    if !is_due(now, enrollment.reference_time(), wait) {
      return Ok(Step::NotDue);
    }

    // Re-read right before sending so an opt-out that landed after the scan
    // wins.
    let current = self
      .store
      .get(id)
      .await
      .map_err(|e| StepError::Store(e.to_string()))?;
    match current {
      Some(c) if c.progress == enrollment.progress => {}
      _ => return Ok(Step::Changed),
    }

    let rendered = self.renderer.render(&stage.template, enrollment)?;
    let message = OutboundMessage {
      to:              enrollment.identity.email.clone(),
      subject:         rendered.subject,
      html:            rendered.html,
      idempotency_key: idempotency_key(id, index),
    };

    let delivery =
      tokio::time::timeout(self.dispatch_timeout, self.dispatcher.send(&message))
        .await
        .map_err(|_| DispatchError::Timeout(self.dispatch_timeout))??;

    let next = enrollment.progress.advanced(now, self.sequence.len());
    let completed = next.status == EnrollmentStatus::Completed;
    match self
      .store
      .compare_and_set(id, enrollment.progress.clone(), next)
      .await
    {
      Ok(true) => {
        tracing::info!(
          enrollment_id = %id,
          email = %enrollment.identity.email,
          stage = index,
          template = %stage.template,
          provider_id = ?delivery.provider_id,
          completed,
          "stage sent"
        );
        Ok(Step::Sent { completed })
      }
      Ok(false) => {
        tracing::warn!(
          enrollment_id = %id,
          stage = index,
          "enrollment changed while sending; delivered stage not recorded"
        );
        Ok(Step::SentUnrecorded)
      }
      Err(e) => Err(StepError::Unrecorded(e.to_string())),
    }
  }

  /// Close out a record whose next stage no longer exists. Nothing is sent.
  async fn retire(&self, enrollment: &Enrollment) -> Result<Step, StepError> {
    let next = Progress {
      status: EnrollmentStatus::Completed,
      ..enrollment.progress.clone()
    };
    let swapped = self
      .store
      .compare_and_set(enrollment.enrollment_id, enrollment.progress.clone(), next)
      .await
      .map_err(|e| StepError::Store(e.to_string()))?;
    if !swapped {
      return Ok(Step::Changed);
    }
    tracing::warn!(
      enrollment_id = %enrollment.enrollment_id,
      stage = enrollment.progress.stage_index,
      stages = self.sequence.len(),
      "stage is past the end of the sequence; enrollment completed"
    );
    Ok(Step::Retired)
  }
}
