//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are stored as fixed-width RFC 3339 strings (nanoseconds, `Z`)
//! so they sort lexicographically in time order. UUIDs are hyphenated
//! lowercase strings and statuses their lowercase names.

use std::str::FromStr as _;

use chrono::{DateTime, SecondsFormat, Utc};
use drip_core::enrollment::{
  Enrollment, EnrollmentStatus, Identity, Profile, Progress,
};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Uuid ─────────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

// ─── DateTime<Utc> ────────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String {
  dt.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

// ─── EnrollmentStatus ─────────────────────────────────────────────────────────

pub fn encode_status(s: EnrollmentStatus) -> &'static str { s.into() }

pub fn decode_status(s: &str) -> Result<EnrollmentStatus> {
  EnrollmentStatus::from_str(s).map_err(|_| Error::Corrupt {
    column: "status",
    value:  s.to_owned(),
  })
}

// ─── Integers ────────────────────────────────────────────────────────────────

fn decode_count<T: TryFrom<i64>>(column: &'static str, v: i64) -> Result<T> {
  T::try_from(v).map_err(|_| Error::Corrupt { column, value: v.to_string() })
}

// ─── Progress ────────────────────────────────────────────────────────────────

/// Progress columns as bound into SQL parameters.
pub struct EncodedProgress {
  pub status:        &'static str,
  pub stage_index:   i64,
  pub messages_sent: i64,
  pub last_sent_at:  Option<String>,
}

pub fn encode_progress(p: &Progress) -> Result<EncodedProgress> {
  Ok(EncodedProgress {
    status:        encode_status(p.status),
    stage_index:   i64::try_from(p.stage_index).map_err(|_| Error::Corrupt {
      column: "stage_index",
      value:  p.stage_index.to_string(),
    })?,
    messages_sent: i64::from(p.messages_sent),
    last_sent_at:  p.last_sent_at.map(encode_dt),
  })
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// Column list matching the field order of [`RawEnrollment::from_row`].
pub const ENROLLMENT_COLUMNS: &str = "enrollment_id, campaign, email, npi, \
  display_name, specialty, city, state, estimated_gap, enrolled_at, status, \
  stage_index, messages_sent, last_sent_at";

/// Raw values read directly from an `enrollments` row.
pub struct RawEnrollment {
  pub enrollment_id: String,
  pub campaign:      String,
  pub email:         String,
  pub npi:           String,
  pub display_name:  String,
  pub specialty:     String,
  pub city:          Option<String>,
  pub state:         String,
  pub estimated_gap: i64,
  pub enrolled_at:   String,
  pub status:        String,
  pub stage_index:   i64,
  pub messages_sent: i64,
  pub last_sent_at:  Option<String>,
}

impl RawEnrollment {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      enrollment_id: row.get(0)?,
      campaign:      row.get(1)?,
      email:         row.get(2)?,
      npi:           row.get(3)?,
      display_name:  row.get(4)?,
      specialty:     row.get(5)?,
      city:          row.get(6)?,
      state:         row.get(7)?,
      estimated_gap: row.get(8)?,
      enrolled_at:   row.get(9)?,
      status:        row.get(10)?,
      stage_index:   row.get(11)?,
      messages_sent: row.get(12)?,
      last_sent_at:  row.get(13)?,
    })
  }

  pub fn into_enrollment(self) -> Result<Enrollment> {
    Ok(Enrollment {
      enrollment_id: decode_uuid(&self.enrollment_id)?,
      campaign:      self.campaign,
      identity:      Identity { email: self.email, npi: self.npi },
      profile:       Profile {
        display_name:  self.display_name,
        specialty:     self.specialty,
        city:          self.city,
        state:         self.state,
        estimated_gap: decode_count("estimated_gap", self.estimated_gap)?,
      },
      enrolled_at:   decode_dt(&self.enrolled_at)?,
      progress:      Progress {
        status:        decode_status(&self.status)?,
        stage_index:   decode_count("stage_index", self.stage_index)?,
        messages_sent: decode_count("messages_sent", self.messages_sent)?,
        last_sent_at:  self.last_sent_at.as_deref().map(decode_dt).transpose()?,
      },
    })
  }
}
