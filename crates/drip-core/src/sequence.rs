//! Sequence definition: the fixed, ordered list of timed stages.
//!
//! Stage offsets are day counts measured from enrollment. The wait before a
//! stage is the difference to the previous stage's offset, counted from the
//! previous stage's actual send time. Lookups are by index only, so editing
//! the definition never rewrites stages already sent.

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

use crate::SequenceError;

/// A whole number of days.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  PartialOrd,
  Ord,
  Hash,
  Serialize,
  Deserialize,
)]
#[serde(transparent)]
pub struct DayOffset(u32);

impl DayOffset {
  pub const fn days(days: u32) -> Self { Self(days) }

  pub const fn get(self) -> u32 { self.0 }

  pub fn as_duration(self) -> TimeDelta { TimeDelta::days(i64::from(self.0)) }
}

/// One timed step of a sequence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stage {
  /// Days after enrollment this stage is scheduled for.
  #[serde(rename = "day")]
  pub offset:   DayOffset,
  /// Key of the message template rendered for this stage.
  pub template: String,
}

impl Stage {
  pub fn new(day: u32, template: impl Into<String>) -> Self {
    Self { offset: DayOffset::days(day), template: template.into() }
  }
}

/// A validated, non-empty list of stages with strictly increasing offsets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Sequence {
  name:   String,
  stages: Vec<Stage>,
}

impl Sequence {
  pub const DEFAULT_NAME: &'static str = "revenue-recovery";

  pub fn new(
    name: impl Into<String>,
    stages: Vec<Stage>,
  ) -> Result<Self, SequenceError> {
    if stages.is_empty() {
      return Err(SequenceError::Empty);
    }
    for (index, stage) in stages.iter().enumerate() {
      if stage.template.trim().is_empty() {
        return Err(SequenceError::EmptyTemplate(index));
      }
    }
    for (index, pair) in stages.windows(2).enumerate() {
      let (previous, current) = (&pair[0], &pair[1]);
      if current.offset <= previous.offset {
        return Err(SequenceError::NotIncreasing {
          index:    index + 1,
          previous: previous.offset.get(),
          offset:   current.offset.get(),
        });
      }
    }
    Ok(Self { name: name.into(), stages })
  }

  /// The five-stage revenue recovery campaign.
  pub fn default_stages() -> Vec<Stage> {
    vec![
      Stage::new(1, "gap-report"),
      Stage::new(3, "peer-benchmark"),
      Stage::new(7, "recovery-playbook"),
      Stage::new(14, "case-study"),
      Stage::new(21, "final-reminder"),
    ]
  }

  pub fn name(&self) -> &str { &self.name }

  pub fn stages(&self) -> &[Stage] { &self.stages }

  pub fn len(&self) -> usize { self.stages.len() }

  /// Always `false`; [`Sequence::new`] rejects empty definitions.
  pub fn is_empty(&self) -> bool { self.stages.is_empty() }

  pub fn stage(&self, index: usize) -> Option<&Stage> { self.stages.get(index) }

  /// How long after the previous send (or enrollment, for the first stage)
  /// stage `index` becomes due. `None` past the last stage.
  pub fn required_wait(&self, index: usize) -> Option<TimeDelta> {
    let current = self.stages.get(index)?.offset;
    let previous = match index.checked_sub(1) {
      Some(prev) => self.stages.get(prev)?.offset,
      None => DayOffset::days(0),
    };
    Some(current.as_duration() - previous.as_duration())
  }
}

impl Default for Sequence {
  fn default() -> Self {
    Self { name: Self::DEFAULT_NAME.to_owned(), stages: Self::default_stages() }
  }
}

/// Whether `required_wait` has elapsed between `reference` and `now`.
pub fn is_due(
  now: DateTime<Utc>,
  reference: DateTime<Utc>,
  required_wait: TimeDelta,
) -> bool {
  now.signed_duration_since(reference) >= required_wait
}
