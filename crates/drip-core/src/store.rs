//! The `EnrollmentStore` trait and supporting query types.
//!
//! The trait is implemented by storage backends (e.g. `drip-store-sqlite`).
//! The engine depends on this abstraction, not on any concrete backend.

use std::future::Future;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::enrollment::{Enrollment, EnrollmentStatus, NewEnrollment, Progress};

// ─── Query type ──────────────────────────────────────────────────────────────

/// Parameters for [`EnrollmentStore::list`]. Empty fields match everything.
#[derive(Debug, Clone, Default)]
pub struct EnrollmentFilter {
  pub status:   Option<EnrollmentStatus>,
  /// Already-normalised address; compared case-insensitively.
  pub email:    Option<String>,
  pub campaign: Option<String>,
}

impl EnrollmentFilter {
  pub fn active() -> Self {
    Self { status: Some(EnrollmentStatus::Active), ..Self::default() }
  }
}

/// Result of [`EnrollmentStore::insert_if_absent`].
#[derive(Debug, Clone)]
pub struct Insertion {
  pub enrollment: Enrollment,
  /// `false` when an active enrollment already existed and was returned
  /// unchanged.
  pub created:    bool,
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Abstraction over a durable collection of enrollments.
///
/// Records are never deleted. After creation only their [`Progress`] changes,
/// and only through [`EnrollmentStore::compare_and_set`], so concurrent
/// schedulers and opt-outs cannot lose each other's updates.
///
/// All methods return `Send` futures so the trait can be used in multi-threaded
/// async runtimes (e.g. tokio with `axum`).
pub trait EnrollmentStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Atomically return the active enrollment for
  /// `(input.campaign, input.identity)` or create one at `enrolled_at` with
  /// [`Progress::initial`]. The store assigns the enrollment id.
  fn insert_if_absent(
    &self,
    input: NewEnrollment,
    enrolled_at: DateTime<Utc>,
  ) -> impl Future<Output = Result<Insertion, Self::Error>> + Send + '_;

  /// Retrieve an enrollment by id. Returns `None` if not found.
  fn get(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Enrollment>, Self::Error>> + Send + '_;

  /// List enrollments matching `filter`, oldest enrollment first.
  fn list<'a>(
    &'a self,
    filter: &'a EnrollmentFilter,
  ) -> impl Future<Output = Result<Vec<Enrollment>, Self::Error>> + Send + 'a;

  /// Replace the progress of `id` with `next` only if it still equals
  /// `expected`.
  ///
  /// Returns `Ok(false)` when the record is missing or its progress moved on.
  /// Returns an error if `expected → next` violates
  /// [`Progress::check_transition`].
  fn compare_and_set(
    &self,
    id: Uuid,
    expected: Progress,
    next: Progress,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;
}
