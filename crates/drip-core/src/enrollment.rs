//! Enrollment types: a contact's participation record in a drip sequence.
//!
//! The identity and profile are immutable snapshots captured at enrollment
//! time. Only [`Progress`] ever changes, and only forward.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString, IntoStaticStr};
use uuid::Uuid;

use crate::{Error, Result, ValidationError, validate};

// ─── Status ──────────────────────────────────────────────────────────────────

/// One-way lifecycle of an enrollment: `Active` moves to exactly one of the
/// two terminal states and never comes back.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  Serialize,
  Deserialize,
  Display,
  EnumString,
  AsRefStr,
  IntoStaticStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum EnrollmentStatus {
  Active,
  Completed,
  Unsubscribed,
}

impl EnrollmentStatus {
  pub fn is_terminal(self) -> bool { !matches!(self, Self::Active) }
}

// ─── Identity & profile ──────────────────────────────────────────────────────

/// Who the messages go to. `(campaign, email, npi)` is the uniqueness key for
/// active enrollments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
  /// Trimmed, lowercased address.
  pub email: String,
  /// 10-digit correlation key linking back to the practice's scan report.
  pub npi:   String,
}

/// Personalisation fields captured from the revenue scan at enrollment time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
  pub display_name:  String,
  pub specialty:     String,
  pub city:          Option<String>,
  pub state:         String,
  /// Estimated annual revenue gap in whole dollars.
  pub estimated_gap: u64,
}

impl Profile {
  /// `"City, ST"` when a city is known, otherwise just the state.
  pub fn region(&self) -> String {
    match self.city.as_deref() {
      Some(city) => format!("{city}, {}", self.state),
      None => self.state.clone(),
    }
  }
}

// ─── Progress ────────────────────────────────────────────────────────────────

/// The mutable part of an enrollment. Stores apply changes to it only through
/// compare-and-set against a previously read value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Progress {
  pub status:        EnrollmentStatus,
  /// Index of the next stage to send (or the final stage once completed).
  pub stage_index:   usize,
  pub messages_sent: u32,
  pub last_sent_at:  Option<DateTime<Utc>>,
}

impl Progress {
  /// Progress of a freshly created enrollment.
  pub fn initial() -> Self {
    Self {
      status:        EnrollmentStatus::Active,
      stage_index:   0,
      messages_sent: 0,
      last_sent_at:  None,
    }
  }

  /// Progress after the current stage was delivered at `sent_at`.
  ///
  /// Moves to the next stage if one exists, otherwise completes the
  /// enrollment while leaving `stage_index` on the final stage.
  pub fn advanced(&self, sent_at: DateTime<Utc>, stage_count: usize) -> Self {
    let has_next = self.stage_index + 1 < stage_count;
    Self {
      status:        if has_next {
        EnrollmentStatus::Active
      } else {
        EnrollmentStatus::Completed
      },
      stage_index:   if has_next {
        self.stage_index + 1
      } else {
        self.stage_index
      },
      messages_sent: self.messages_sent.saturating_add(1),
      last_sent_at:  Some(sent_at),
    }
  }

  /// Same position, terminal `Unsubscribed` status.
  pub fn unsubscribed(&self) -> Self {
    Self { status: EnrollmentStatus::Unsubscribed, ..self.clone() }
  }

  /// Check that moving from `self` to `next` respects the one-way status
  /// machine and the monotonic counters. Only active progress may change;
  /// from there any status is reachable.
  pub fn check_transition(&self, next: &Self) -> Result<()> {
    if self.status.is_terminal() {
      return Err(Error::Terminal(self.status));
    }
    if next.stage_index < self.stage_index {
      return Err(Error::StageRegression {
        from: self.stage_index,
        to:   next.stage_index,
      });
    }
    if next.messages_sent < self.messages_sent {
      return Err(Error::CounterRegression {
        from: self.messages_sent,
        to:   next.messages_sent,
      });
    }
    Ok(())
  }
}

// ─── Enrollment ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Enrollment {
  pub enrollment_id: Uuid,
  pub campaign:      String,
  pub identity:      Identity,
  pub profile:       Profile,
  /// Server-assigned; never changes after creation.
  pub enrolled_at:   DateTime<Utc>,
  #[serde(flatten)]
  pub progress:      Progress,
}

impl Enrollment {
  /// The instant the wait for the current stage is measured from.
  pub fn reference_time(&self) -> DateTime<Utc> {
    self.progress.last_sent_at.unwrap_or(self.enrolled_at)
  }

  pub fn is_active(&self) -> bool {
    self.progress.status == EnrollmentStatus::Active
  }
}

// ─── Input ───────────────────────────────────────────────────────────────────

/// Raw enrollment input exactly as received from a caller. Every field is
/// optional so that a missing field surfaces as a [`ValidationError`] naming
/// it rather than as a deserialisation failure.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EnrollmentRequest {
  pub email:         Option<String>,
  pub npi:           Option<String>,
  pub name:          Option<String>,
  pub specialty:     Option<String>,
  pub city:          Option<String>,
  pub state:         Option<String>,
  /// Whole or fractional dollars; rounded on validation.
  pub estimated_gap: Option<f64>,
}

/// Validated input to
/// [`EnrollmentStore::insert_if_absent`](crate::store::EnrollmentStore::insert_if_absent).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewEnrollment {
  pub campaign: String,
  pub identity: Identity,
  pub profile:  Profile,
}

impl NewEnrollment {
  /// Validate `request` for `campaign`, normalising the email address.
  pub fn from_request(
    campaign: &str,
    request: EnrollmentRequest,
  ) -> Result<Self, ValidationError> {
    let email = validate::email(request.email.as_deref())?;
    let npi = validate::npi(request.npi.as_deref())?;
    let display_name = validate::required("name", request.name.as_deref())?;
    let specialty =
      validate::required("specialty", request.specialty.as_deref())?;
    let state = validate::required("state", request.state.as_deref())?;
    let estimated_gap = validate::estimated_gap(request.estimated_gap)?;
    let city = request
      .city
      .map(|c| c.trim().to_owned())
      .filter(|c| !c.is_empty());

    Ok(Self {
      campaign: campaign.to_owned(),
      identity: Identity { email, npi },
      profile:  Profile {
        display_name,
        specialty,
        city,
        state,
        estimated_gap,
      },
    })
  }
}
