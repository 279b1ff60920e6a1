//! Queue inspection for operators.

use drip_core::{
  dispatch::Dispatcher,
  enrollment::{Enrollment, EnrollmentStatus},
  store::{EnrollmentFilter, EnrollmentStore},
};
use serde::Serialize;

use crate::{Error, Result, Sequencer};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct QueueStats {
  pub total:         usize,
  pub active:        usize,
  pub completed:     usize,
  pub unsubscribed:  usize,
  pub messages_sent: u64,
}

impl QueueStats {
  pub fn from_enrollments(enrollments: &[Enrollment]) -> Self {
    enrollments.iter().fold(Self::default(), |mut stats, e| {
      stats.total += 1;
      stats.messages_sent += u64::from(e.progress.messages_sent);
      match e.progress.status {
        EnrollmentStatus::Active => stats.active += 1,
        EnrollmentStatus::Completed => stats.completed += 1,
        EnrollmentStatus::Unsubscribed => stats.unsubscribed += 1,
      }
      stats
    })
  }
}

#[derive(Debug, Clone, Serialize)]
pub struct QueueReport {
  pub stats:       QueueStats,
  pub enrollments: Vec<Enrollment>,
}

impl<S, D> Sequencer<S, D>
where
  S: EnrollmentStore,
  D: Dispatcher,
{
  /// Aggregate counts plus every enrollment ever recorded.
  pub async fn queue(&self) -> Result<QueueReport> {
    let enrollments = self
      .store
      .list(&EnrollmentFilter::default())
      .await
      .map_err(Error::store)?;
    Ok(QueueReport { stats: QueueStats::from_enrollments(&enrollments), enrollments })
  }
}
