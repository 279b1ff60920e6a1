//! [`SqliteStore`]: the SQLite implementation of [`EnrollmentStore`].

use std::path::Path;

use chrono::{DateTime, Utc};
use rusqlite::{OptionalExtension as _, TransactionBehavior};
use uuid::Uuid;

use drip_core::{
  enrollment::{Enrollment, EnrollmentStatus, NewEnrollment, Progress},
  store::{EnrollmentFilter, EnrollmentStore, Insertion},
};

use crate::{
  Error, Result,
  encode::{
    ENROLLMENT_COLUMNS, RawEnrollment, encode_dt, encode_progress,
    encode_status, encode_uuid,
  },
  schema::SCHEMA,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A drip enrollment store backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store, mostly for tests.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }
}

// ─── EnrollmentStore impl ────────────────────────────────────────────────────

impl EnrollmentStore for SqliteStore {
  type Error = Error;

  async fn insert_if_absent(
    &self,
    input:       NewEnrollment,
    enrolled_at: DateTime<Utc>,
  ) -> Result<Insertion> {
    let candidate = Enrollment {
      enrollment_id: Uuid::new_v4(),
      campaign:      input.campaign,
      identity:      input.identity,
      profile:       input.profile,
      enrolled_at,
      progress:      Progress::initial(),
    };

    let id_str        = encode_uuid(candidate.enrollment_id);
    let campaign      = candidate.campaign.clone();
    let email         = candidate.identity.email.clone();
    let npi           = candidate.identity.npi.clone();
    let display_name  = candidate.profile.display_name.clone();
    let specialty     = candidate.profile.specialty.clone();
    let city          = candidate.profile.city.clone();
    let state         = candidate.profile.state.clone();
    let estimated_gap = i64::try_from(candidate.profile.estimated_gap).map_err(|_| {
      Error::Corrupt {
        column: "estimated_gap",
        value:  candidate.profile.estimated_gap.to_string(),
      }
    })?;
    let at_str        = encode_dt(enrolled_at);
    let status_str    = encode_status(EnrollmentStatus::Active);

    let existing: Option<RawEnrollment> = self
      .conn
      .call(move |conn| {
        // IMMEDIATE takes the write lock up front so two writers cannot both
        // miss the existing row.
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let existing = tx
          .query_row(
            &format!(
              "SELECT {ENROLLMENT_COLUMNS} FROM enrollments
               WHERE campaign = ?1 AND email = ?2 AND npi = ?3 AND status = ?4"
            ),
            rusqlite::params![campaign, email, npi, status_str],
            RawEnrollment::from_row,
          )
          .optional()?;

        if existing.is_none() {
          tx.execute(
            "INSERT INTO enrollments (
               enrollment_id, campaign, email, npi, display_name, specialty,
               city, state, estimated_gap, enrolled_at, status,
               stage_index, messages_sent, last_sent_at
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, 0, 0, NULL)",
            rusqlite::params![
              id_str,
              campaign,
              email,
              npi,
              display_name,
              specialty,
              city,
              state,
              estimated_gap,
              at_str,
              status_str,
            ],
          )?;
        }

        tx.commit()?;
        Ok(existing)
      })
      .await?;

    match existing {
      Some(raw) => Ok(Insertion { enrollment: raw.into_enrollment()?, created: false }),
      None      => Ok(Insertion { enrollment: candidate, created: true }),
    }
  }

  async fn get(&self, id: Uuid) -> Result<Option<Enrollment>> {
    let id_str = encode_uuid(id);

    let raw: Option<RawEnrollment> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            &format!(
              "SELECT {ENROLLMENT_COLUMNS} FROM enrollments WHERE enrollment_id = ?1"
            ),
            rusqlite::params![id_str],
            RawEnrollment::from_row,
          )
          .optional()?)
      })
      .await?;

    raw.map(RawEnrollment::into_enrollment).transpose()
  }

  async fn list(&self, filter: &EnrollmentFilter) -> Result<Vec<Enrollment>> {
    let status   = filter.status.map(encode_status);
    let email    = filter.email.as_deref().map(str::to_lowercase);
    let campaign = filter.campaign.clone();

    let raws: Vec<RawEnrollment> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {ENROLLMENT_COLUMNS} FROM enrollments
           WHERE (?1 IS NULL OR status   = ?1)
             AND (?2 IS NULL OR email    = ?2)
             AND (?3 IS NULL OR campaign = ?3)
           ORDER BY enrolled_at, enrollment_id"
        ))?;
        let rows = stmt
          .query_map(
            rusqlite::params![status, email, campaign],
            RawEnrollment::from_row,
          )?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawEnrollment::into_enrollment).collect()
  }

  async fn compare_and_set(
    &self,
    id:       Uuid,
    expected: Progress,
    next:     Progress,
  ) -> Result<bool> {
    expected.check_transition(&next)?;

    let id_str = encode_uuid(id);
    let old    = encode_progress(&expected)?;
    let new    = encode_progress(&next)?;

    let changed: usize = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "UPDATE enrollments
              SET status = ?1, stage_index = ?2, messages_sent = ?3, last_sent_at = ?4
            WHERE enrollment_id = ?5
              AND status        = ?6
              AND stage_index   = ?7
              AND messages_sent = ?8
              AND last_sent_at IS ?9",
          rusqlite::params![
            new.status,
            new.stage_index,
            new.messages_sent,
            new.last_sent_at,
            id_str,
            old.status,
            old.stage_index,
            old.messages_sent,
            old.last_sent_at,
          ],
        )?)
      })
      .await?;

    Ok(changed == 1)
  }
}
