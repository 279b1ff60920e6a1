//! Sequencer tests against an in-memory SQLite store and scripted
//! dispatchers.

use std::{
  collections::HashSet,
  sync::{Arc, Mutex},
  time::Duration,
};

use chrono::{DateTime, TimeDelta, TimeZone, Utc};
use drip_core::{
  dispatch::{Delivery, DispatchError, Dispatcher, OutboundMessage},
  enrollment::{Enrollment, EnrollmentRequest, EnrollmentStatus, NewEnrollment, Progress},
  sequence::{Sequence, Stage},
  store::{EnrollmentFilter, EnrollmentStore, Insertion},
};
use drip_mailer::Mailer;
use drip_render::Renderer;
use drip_store_sqlite::SqliteStore;
use uuid::Uuid;

use crate::{Error, Sequencer, UnsubscribeOutcome, idempotency_key};

// ─── Fixtures ────────────────────────────────────────────────────────────────

/// Records every accepted message; fails for addresses in `failing`.
#[derive(Default)]
struct ScriptedDispatcher {
  sent:    Mutex<Vec<OutboundMessage>>,
  failing: Mutex<HashSet<String>>,
  delay:   Option<Duration>,
}

impl ScriptedDispatcher {
  fn failing_for(email: &str) -> Self {
    let d = Self::default();
    d.failing.lock().unwrap().insert(email.to_owned());
    d
  }

  fn sent(&self) -> Vec<OutboundMessage> { self.sent.lock().unwrap().clone() }

  fn recover(&self) { self.failing.lock().unwrap().clear(); }
}

impl Dispatcher for ScriptedDispatcher {
  async fn send(&self, message: &OutboundMessage) -> Result<Delivery, DispatchError> {
    if let Some(delay) = self.delay {
      tokio::time::sleep(delay).await;
    }
    if self.failing.lock().unwrap().contains(&message.to) {
      return Err(DispatchError::Provider("mailbox unavailable".into()));
    }
    let mut sent = self.sent.lock().unwrap();
    sent.push(message.clone());
    Ok(Delivery { provider_id: Some(format!("msg-{}", sent.len())) })
  }
}

fn t0() -> DateTime<Utc> { Utc.with_ymd_and_hms(2026, 4, 6, 9, 0, 0).unwrap() }

fn day(n: i64) -> TimeDelta { TimeDelta::days(n) }

fn request(email: &str) -> EnrollmentRequest {
  EnrollmentRequest {
    email:         Some(email.into()),
    npi:           Some("1234567890".into()),
    name:          Some("Dr. Rivera".into()),
    specialty:     Some("Orthopedics".into()),
    city:          Some("Tampa".into()),
    state:         Some("FL".into()),
    estimated_gap: Some(310_000.0),
  }
}

async fn sequencer_with<D: Dispatcher>(
  dispatcher: D,
  sequence: Sequence,
) -> Sequencer<SqliteStore, D> {
  let store = SqliteStore::open_in_memory().await.expect("in-memory store");
  Sequencer::new(
    Arc::new(store),
    dispatcher,
    sequence,
    Renderer::new("https://scan.example.com"),
  )
}

async fn sequencer(dispatcher: ScriptedDispatcher) -> Sequencer<SqliteStore, ScriptedDispatcher> {
  sequencer_with(dispatcher, Sequence::default()).await
}

async fn fetch<D: Dispatcher>(s: &Sequencer<SqliteStore, D>, id: Uuid) -> Enrollment {
  s.store().get(id).await.unwrap().expect("enrollment exists")
}

// ─── Enrollment ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn enrolling_twice_returns_the_same_id() {
  let s = sequencer(ScriptedDispatcher::default()).await;

  let first = s.enroll_at(request("pat@example.com"), t0()).await.unwrap();
  let second = s
    .enroll_at(request("PAT@Example.com"), t0() + TimeDelta::minutes(5))
    .await
    .unwrap();

  assert!(first.created);
  assert!(!second.created);
  assert_eq!(first.enrollment_id, second.enrollment_id);
  assert_eq!(s.queue().await.unwrap().stats.total, 1);
}

#[tokio::test]
async fn enrollment_validation_names_the_field() {
  let s = sequencer(ScriptedDispatcher::default()).await;
  let mut req = request("pat@example.com");
  req.npi = Some("12345".into());

  match s.enroll(req).await {
    Err(Error::Validation(e)) => assert_eq!(e.field, "npi"),
    other => panic!("expected validation error, got {other:?}"),
  }
  assert_eq!(s.queue().await.unwrap().stats.total, 0);
}

#[tokio::test]
async fn enrollment_never_dispatches() {
  let s = sequencer(ScriptedDispatcher::default()).await;
  s.enroll_at(request("pat@example.com"), t0()).await.unwrap();
  assert!(s.dispatcher().sent().is_empty());
}

// ─── Scheduling ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn first_send_waits_for_the_first_offset() {
  let s = sequencer(ScriptedDispatcher::default()).await;
  let id = s.enroll_at(request("pat@example.com"), t0()).await.unwrap().enrollment_id;

  let early = s.process_due(t0()).await.unwrap();
  assert_eq!((early.evaluated, early.sent), (1, 0));
  assert_eq!(fetch(&s, id).await.progress, Progress::initial());

  let due = s.process_due(t0() + day(1)).await.unwrap();
  assert_eq!((due.evaluated, due.sent), (1, 1));
  assert!(due.errors.is_empty());

  let e = fetch(&s, id).await;
  assert_eq!(e.progress.stage_index, 1);
  assert_eq!(e.progress.messages_sent, 1);
  assert_eq!(e.progress.last_sent_at, Some(t0() + day(1)));

  let sent = s.dispatcher().sent();
  assert_eq!(sent.len(), 1);
  assert_eq!(sent[0].to, "pat@example.com");
  assert_eq!(sent[0].idempotency_key, idempotency_key(id, 0));
  assert!(sent[0].subject.contains("$310K"), "{}", sent[0].subject);
}

#[tokio::test]
async fn waits_are_measured_from_the_previous_send() {
  let s = sequencer(ScriptedDispatcher::default()).await;
  let id = s.enroll_at(request("pat@example.com"), t0()).await.unwrap().enrollment_id;

  // Stage 0 goes out late, on day 2 instead of day 1.
  s.process_due(t0() + day(2)).await.unwrap();
  // Stage 1 (day 3) needs two more days from that send, not from enrollment.
  assert_eq!(s.process_due(t0() + day(3)).await.unwrap().sent, 0);
  assert_eq!(s.process_due(t0() + day(4)).await.unwrap().sent, 1);
  assert_eq!(fetch(&s, id).await.progress.stage_index, 2);
}

#[tokio::test]
async fn progression_is_monotonic_and_never_skips() {
  let s = sequencer(ScriptedDispatcher::default()).await;
  let id = s.enroll_at(request("pat@example.com"), t0()).await.unwrap().enrollment_id;

  let mut observed = vec![fetch(&s, id).await.progress];
  // Far overdue on every pass: still at most one stage per pass.
  for pass in 1..=8 {
    s.process_due(t0() + day(100 * pass)).await.unwrap();
    observed.push(fetch(&s, id).await.progress);
  }

  for pair in observed.windows(2) {
    let (before, after) = (&pair[0], &pair[1]);
    assert!(after.stage_index >= before.stage_index);
    assert!(after.stage_index <= before.stage_index + 1);
    assert!(after.messages_sent <= before.messages_sent + 1);
  }

  let keys: Vec<String> =
    s.dispatcher().sent().into_iter().map(|m| m.idempotency_key).collect();
  let expected: Vec<String> = (0..5).map(|i| idempotency_key(id, i)).collect();
  assert_eq!(keys, expected);
}

#[tokio::test]
async fn final_stage_completes_and_stays_completed() {
  let s = sequencer(ScriptedDispatcher::default()).await;
  let id = s.enroll_at(request("pat@example.com"), t0()).await.unwrap().enrollment_id;

  let mut completed = 0;
  for d in [1, 3, 7, 14] {
    let summary = s.process_due(t0() + day(d)).await.unwrap();
    completed += summary.completed;
  }
  assert_eq!(completed, 0);
  let last = s.process_due(t0() + day(21)).await.unwrap();
  assert_eq!((last.sent, last.completed), (1, 1));

  let done = fetch(&s, id).await;
  assert_eq!(done.progress.status, EnrollmentStatus::Completed);
  assert_eq!(done.progress.stage_index, 4);
  assert_eq!(done.progress.messages_sent, 5);

  let later = s.process_due(t0() + day(400)).await.unwrap();
  assert_eq!((later.evaluated, later.sent), (0, 0));
  assert_eq!(fetch(&s, id).await, done);
  assert_eq!(s.dispatcher().sent().len(), 5);
}

#[tokio::test]
async fn one_failing_recipient_does_not_block_the_batch() {
  let s = sequencer(ScriptedDispatcher::failing_for("b@example.com")).await;
  let mut ids = Vec::new();
  for email in ["a@example.com", "b@example.com", "c@example.com", "d@example.com"] {
    ids.push(s.enroll_at(request(email), t0()).await.unwrap().enrollment_id);
  }

  let summary = s.process_due(t0() + day(1)).await.unwrap();
  assert_eq!(summary.evaluated, 4);
  assert_eq!(summary.sent, 3);
  assert_eq!(summary.errors.len(), 1);
  assert!(summary.errors[0].starts_with("b@example.com: "), "{:?}", summary.errors);
  assert!(summary.errors[0].contains("mailbox unavailable"));

  // The failed contact is untouched and retried on the next pass.
  assert_eq!(fetch(&s, ids[1]).await.progress, Progress::initial());
  s.dispatcher().recover();
  let retry = s.process_due(t0() + day(1) + TimeDelta::hours(4)).await.unwrap();
  assert_eq!((retry.sent, retry.errors.len()), (1, 0));
  assert_eq!(fetch(&s, ids[1]).await.progress.stage_index, 1);
}

#[tokio::test]
async fn unconfigured_provider_reports_each_due_contact() {
  let s = sequencer_with(Mailer::Unconfigured, Sequence::default()).await;
  let id = s.enroll_at(request("a@example.com"), t0()).await.unwrap().enrollment_id;
  s.enroll_at(request("b@example.com"), t0()).await.unwrap();

  let summary = s.process_due(t0() + day(1)).await.unwrap();
  assert_eq!(summary.sent, 0);
  assert_eq!(
    summary.errors,
    [
      "a@example.com: no delivery provider is configured",
      "b@example.com: no delivery provider is configured",
    ]
  );
  assert_eq!(fetch(&s, id).await.progress, Progress::initial());
}

#[tokio::test]
async fn unknown_template_is_a_per_contact_failure() {
  let sequence = Sequence::new(
    Sequence::DEFAULT_NAME,
    vec![Stage::new(1, "gap-report"), Stage::new(2, "no-such-template")],
  )
  .unwrap();
  let s = sequencer_with(ScriptedDispatcher::default(), sequence).await;
  let id = s.enroll_at(request("a@example.com"), t0()).await.unwrap().enrollment_id;

  assert_eq!(s.process_due(t0() + day(1)).await.unwrap().sent, 1);
  let summary = s.process_due(t0() + day(2)).await.unwrap();
  assert_eq!(summary.sent, 0);
  assert_eq!(summary.errors.len(), 1);
  assert!(summary.errors[0].contains("no-such-template"));
  assert_eq!(fetch(&s, id).await.progress.stage_index, 1);
}

#[tokio::test]
async fn slow_provider_times_out_for_that_contact_only() {
  let slow = ScriptedDispatcher {
    delay: Some(Duration::from_millis(500)),
    ..ScriptedDispatcher::default()
  };
  let s = sequencer(slow)
    .await
    .with_dispatch_timeout(Duration::from_millis(20));
  let id = s.enroll_at(request("a@example.com"), t0()).await.unwrap().enrollment_id;

  let summary = s.process_due(t0() + day(1)).await.unwrap();
  assert_eq!(summary.sent, 0);
  assert_eq!(summary.errors.len(), 1);
  assert!(summary.errors[0].contains("timed out"), "{:?}", summary.errors);
  assert_eq!(fetch(&s, id).await.progress, Progress::initial());
}

#[tokio::test]
async fn other_campaigns_are_not_processed() {
  let s = sequencer(ScriptedDispatcher::default()).await;
  let other = NewEnrollment::from_request("other-campaign", request("a@example.com")).unwrap();
  s.store().insert_if_absent(other, t0()).await.unwrap();

  let summary = s.process_due(t0() + day(30)).await.unwrap();
  assert_eq!(summary.evaluated, 0);
}

#[tokio::test]
async fn overlapping_passes_send_each_stage_once() {
  let slow = ScriptedDispatcher {
    delay: Some(Duration::from_millis(100)),
    ..ScriptedDispatcher::default()
  };
  let s = sequencer(slow).await;
  let id = s.enroll_at(request("pat@example.com"), t0()).await.unwrap().enrollment_id;

  let (a, b) = tokio::join!(
    s.process_due(t0() + day(1)),
    s.process_due(t0() + day(1))
  );
  let (a, b) = (a.unwrap(), b.unwrap());

  assert_eq!(a.sent + b.sent, 1);
  assert!(a.errors.is_empty() && b.errors.is_empty());
  assert_eq!(s.dispatcher().sent().len(), 1);
  let progress = fetch(&s, id).await.progress;
  assert_eq!((progress.stage_index, progress.messages_sent), (1, 1));
}

#[tokio::test]
async fn shortened_sequence_completes_stranded_enrollments() {
  let store = Arc::new(SqliteStore::open_in_memory().await.unwrap());
  let renderer = Renderer::new("https://scan.example.com");
  let long = Sequencer::new(
    Arc::clone(&store),
    ScriptedDispatcher::default(),
    Sequence::default(),
    renderer.clone(),
  );
  let id = long.enroll_at(request("pat@example.com"), t0()).await.unwrap().enrollment_id;
  for d in [1, 3, 7] {
    long.process_due(t0() + day(d)).await.unwrap();
  }
  assert_eq!(fetch(&long, id).await.progress.stage_index, 3);

  let short = Sequence::new(
    Sequence::DEFAULT_NAME,
    vec![Stage::new(1, "gap-report"), Stage::new(3, "peer-benchmark")],
  )
  .unwrap();
  let s = Sequencer::new(Arc::clone(&store), ScriptedDispatcher::default(), short, renderer);

  let summary = s.process_due(t0() + day(30)).await.unwrap();
  assert_eq!((summary.evaluated, summary.sent), (1, 0));
  assert!(summary.errors.is_empty());

  let progress = fetch(&s, id).await.progress;
  assert_eq!(progress.status, EnrollmentStatus::Completed);
  assert_eq!((progress.stage_index, progress.messages_sent), (3, 3));
  assert!(s.dispatcher().sent().is_empty());

  assert_eq!(s.process_due(t0() + day(60)).await.unwrap().evaluated, 0);
}

// ─── Opt-out ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn opt_out_mid_sequence_stops_all_sends() {
  let s = sequencer(ScriptedDispatcher::default()).await;
  let id = s.enroll_at(request("pat@example.com"), t0()).await.unwrap().enrollment_id;
  s.process_due(t0() + day(1)).await.unwrap();
  s.process_due(t0() + day(3)).await.unwrap();
  let before = fetch(&s, id).await.progress;
  assert_eq!(before.stage_index, 2);

  assert_eq!(
    s.unsubscribe(" Pat@Example.com ").await.unwrap(),
    UnsubscribeOutcome::Unsubscribed { count: 1 }
  );

  for d in [7, 14, 21, 365] {
    let summary = s.process_due(t0() + day(d)).await.unwrap();
    assert_eq!((summary.evaluated, summary.sent), (0, 0));
  }

  let after = fetch(&s, id).await.progress;
  assert_eq!(after.status, EnrollmentStatus::Unsubscribed);
  assert_eq!(after.stage_index, before.stage_index);
  assert_eq!(after.messages_sent, before.messages_sent);
  assert_eq!(after.last_sent_at, before.last_sent_at);
  assert_eq!(s.dispatcher().sent().len(), 2);
}

#[tokio::test]
async fn unsubscribe_is_idempotent() {
  let s = sequencer(ScriptedDispatcher::default()).await;
  s.enroll_at(request("pat@example.com"), t0()).await.unwrap();

  assert_eq!(
    s.unsubscribe("pat@example.com").await.unwrap(),
    UnsubscribeOutcome::Unsubscribed { count: 1 }
  );
  assert_eq!(
    s.unsubscribe("pat@example.com").await.unwrap(),
    UnsubscribeOutcome::NotFound
  );
  assert_eq!(
    s.unsubscribe("nobody@example.com").await.unwrap(),
    UnsubscribeOutcome::NotFound
  );
  assert!(matches!(s.unsubscribe("  ").await, Err(Error::Validation(_))));
}

/// Opts `email` out right after every scan, before the pass dispatches.
struct OptOutAfterScan {
  inner: SqliteStore,
  email: String,
}

impl EnrollmentStore for OptOutAfterScan {
  type Error = drip_store_sqlite::Error;

  async fn insert_if_absent(
    &self,
    input: NewEnrollment,
    enrolled_at: DateTime<Utc>,
  ) -> Result<Insertion, Self::Error> {
    self.inner.insert_if_absent(input, enrolled_at).await
  }

  async fn get(&self, id: Uuid) -> Result<Option<Enrollment>, Self::Error> {
    self.inner.get(id).await
  }

  async fn list(&self, filter: &EnrollmentFilter) -> Result<Vec<Enrollment>, Self::Error> {
    let snapshot = self.inner.list(filter).await?;
    for e in snapshot.iter().filter(|e| e.identity.email == self.email) {
      self
        .inner
        .compare_and_set(e.enrollment_id, e.progress.clone(), e.progress.unsubscribed())
        .await?;
    }
    Ok(snapshot)
  }

  async fn compare_and_set(
    &self,
    id: Uuid,
    expected: Progress,
    next: Progress,
  ) -> Result<bool, Self::Error> {
    self.inner.compare_and_set(id, expected, next).await
  }
}

#[tokio::test]
async fn opt_out_after_scan_wins_over_dispatch() {
  let store = OptOutAfterScan {
    inner: SqliteStore::open_in_memory().await.unwrap(),
    email: "quitter@example.com".into(),
  };
  let s = Sequencer::new(
    Arc::new(store),
    ScriptedDispatcher::default(),
    Sequence::default(),
    Renderer::new("https://scan.example.com"),
  );
  s.enroll_at(request("quitter@example.com"), t0()).await.unwrap();
  s.enroll_at(request("stayer@example.com"), t0()).await.unwrap();

  let summary = s.process_due(t0() + day(1)).await.unwrap();
  assert_eq!(summary.evaluated, 2);
  assert_eq!(summary.sent, 1);
  assert!(summary.errors.is_empty());

  let sent = s.dispatcher().sent();
  assert_eq!(sent.len(), 1);
  assert_eq!(sent[0].to, "stayer@example.com");
}

// ─── Queue ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn queue_reports_aggregate_counts() {
  let s = sequencer(ScriptedDispatcher::default()).await;
  for email in ["a@example.com", "b@example.com", "c@example.com"] {
    s.enroll_at(request(email), t0()).await.unwrap();
  }
  s.process_due(t0() + day(1)).await.unwrap();
  s.unsubscribe("b@example.com").await.unwrap();

  let report = s.queue().await.unwrap();
  assert_eq!(report.stats.total, 3);
  assert_eq!(report.stats.active, 2);
  assert_eq!(report.stats.unsubscribed, 1);
  assert_eq!(report.stats.completed, 0);
  assert_eq!(report.stats.messages_sent, 3);
  assert_eq!(report.enrollments.len(), 3);
}
