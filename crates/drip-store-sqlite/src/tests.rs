//! Integration tests for `SqliteStore` against an in-memory database.

use chrono::{DateTime, TimeDelta, TimeZone, Utc};
use drip_core::{
  enrollment::{EnrollmentStatus, Identity, NewEnrollment, Profile, Progress},
  store::{EnrollmentFilter, EnrollmentStore},
};
use uuid::Uuid;

use crate::{Error, SqliteStore};

async fn store() -> SqliteStore {
  SqliteStore::open_in_memory()
    .await
    .expect("in-memory store")
}

fn t0() -> DateTime<Utc> { Utc.with_ymd_and_hms(2026, 2, 1, 8, 0, 0).unwrap() }

fn new_enrollment(email: &str, npi: &str) -> NewEnrollment {
  NewEnrollment {
    campaign: "revenue-recovery".into(),
    identity: Identity { email: email.into(), npi: npi.into() },
    profile:  Profile {
      display_name:  "Dr. Alice Liddell".into(),
      specialty:     "Cardiology".into(),
      city:          Some("Denver".into()),
      state:         "CO".into(),
      estimated_gap: 875_000,
    },
  }
}

// ─── Insertion ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn insert_and_get_round_trip() {
  let s = store().await;

  let ins = s
    .insert_if_absent(new_enrollment("alice@example.com", "1111111111"), t0())
    .await
    .unwrap();
  assert!(ins.created);
  assert_eq!(ins.enrollment.progress, Progress::initial());

  let fetched = s.get(ins.enrollment.enrollment_id).await.unwrap().unwrap();
  assert_eq!(fetched, ins.enrollment);
  assert_eq!(fetched.enrolled_at, t0());
  assert_eq!(fetched.profile.city.as_deref(), Some("Denver"));
}

#[tokio::test]
async fn get_missing_returns_none() {
  let s = store().await;
  assert!(s.get(Uuid::new_v4()).await.unwrap().is_none());
}

#[tokio::test]
async fn duplicate_active_insert_returns_existing() {
  let s = store().await;
  let first = s
    .insert_if_absent(new_enrollment("alice@example.com", "1111111111"), t0())
    .await
    .unwrap();
  let second = s
    .insert_if_absent(
      new_enrollment("alice@example.com", "1111111111"),
      t0() + TimeDelta::hours(1),
    )
    .await
    .unwrap();

  assert!(!second.created);
  assert_eq!(second.enrollment.enrollment_id, first.enrollment.enrollment_id);
  assert_eq!(second.enrollment.enrolled_at, t0());
  assert_eq!(s.list(&EnrollmentFilter::default()).await.unwrap().len(), 1);
}

#[tokio::test]
async fn different_npi_is_a_different_identity() {
  let s = store().await;
  let a = s
    .insert_if_absent(new_enrollment("alice@example.com", "1111111111"), t0())
    .await
    .unwrap();
  let b = s
    .insert_if_absent(new_enrollment("alice@example.com", "2222222222"), t0())
    .await
    .unwrap();
  assert!(b.created);
  assert_ne!(a.enrollment.enrollment_id, b.enrollment.enrollment_id);
}

#[tokio::test]
async fn re_enrollment_after_terminal_state_creates_new_record() {
  let s = store().await;
  let first = s
    .insert_if_absent(new_enrollment("alice@example.com", "1111111111"), t0())
    .await
    .unwrap()
    .enrollment;
  assert!(
    s.compare_and_set(
      first.enrollment_id,
      first.progress.clone(),
      first.progress.unsubscribed()
    )
    .await
    .unwrap()
  );

  let again = s
    .insert_if_absent(new_enrollment("alice@example.com", "1111111111"), t0())
    .await
    .unwrap();
  assert!(again.created);
  assert_ne!(again.enrollment.enrollment_id, first.enrollment_id);

  // The old record is retained as history.
  let old = s.get(first.enrollment_id).await.unwrap().unwrap();
  assert_eq!(old.progress.status, EnrollmentStatus::Unsubscribed);
}

// ─── Listing ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn list_filters_by_status_and_email() {
  let s = store().await;
  let a = s
    .insert_if_absent(new_enrollment("alice@example.com", "1111111111"), t0())
    .await
    .unwrap()
    .enrollment;
  s.insert_if_absent(
    new_enrollment("bob@example.com", "2222222222"),
    t0() + TimeDelta::minutes(1),
  )
  .await
  .unwrap();
  s.compare_and_set(a.enrollment_id, a.progress.clone(), a.progress.unsubscribed())
    .await
    .unwrap();

  let active = s.list(&EnrollmentFilter::active()).await.unwrap();
  assert_eq!(active.len(), 1);
  assert_eq!(active[0].identity.email, "bob@example.com");

  let by_email = s
    .list(&EnrollmentFilter {
      email: Some("ALICE@example.com".into()),
      ..EnrollmentFilter::default()
    })
    .await
    .unwrap();
  assert_eq!(by_email.len(), 1);
  assert_eq!(by_email[0].enrollment_id, a.enrollment_id);
}

#[tokio::test]
async fn list_orders_by_enrollment_time() {
  let s = store().await;
  for (i, email) in ["c@example.com", "a@example.com", "b@example.com"]
    .into_iter()
    .enumerate()
  {
    s.insert_if_absent(
      new_enrollment(email, "1111111111"),
      t0() - TimeDelta::minutes(i as i64),
    )
    .await
    .unwrap();
  }
  let emails: Vec<String> = s
    .list(&EnrollmentFilter::default())
    .await
    .unwrap()
    .into_iter()
    .map(|e| e.identity.email)
    .collect();
  assert_eq!(emails, ["b@example.com", "a@example.com", "c@example.com"]);
}

// ─── Compare-and-set ─────────────────────────────────────────────────────────

#[tokio::test]
async fn compare_and_set_applies_matching_expectation() {
  let s = store().await;
  let e = s
    .insert_if_absent(new_enrollment("alice@example.com", "1111111111"), t0())
    .await
    .unwrap()
    .enrollment;

  let sent_at = t0() + TimeDelta::days(1);
  let next = e.progress.advanced(sent_at, 5);
  assert!(s.compare_and_set(e.enrollment_id, e.progress.clone(), next.clone()).await.unwrap());

  let stored = s.get(e.enrollment_id).await.unwrap().unwrap();
  assert_eq!(stored.progress, next);
  assert_eq!(stored.progress.last_sent_at, Some(sent_at));
}

#[tokio::test]
async fn compare_and_set_rejects_stale_expectation() {
  let s = store().await;
  let e = s
    .insert_if_absent(new_enrollment("alice@example.com", "1111111111"), t0())
    .await
    .unwrap()
    .enrollment;

  let first = e.progress.advanced(t0() + TimeDelta::days(1), 5);
  assert!(s.compare_and_set(e.enrollment_id, e.progress.clone(), first.clone()).await.unwrap());

  // A second writer still holding the original progress loses.
  let competing = e.progress.advanced(t0() + TimeDelta::days(2), 5);
  assert!(!s.compare_and_set(e.enrollment_id, e.progress.clone(), competing).await.unwrap());

  let stored = s.get(e.enrollment_id).await.unwrap().unwrap();
  assert_eq!(stored.progress, first);
}

#[tokio::test]
async fn compare_and_set_on_missing_record_is_false() {
  let s = store().await;
  let p = Progress::initial();
  assert!(!s.compare_and_set(Uuid::new_v4(), p.clone(), p.unsubscribed()).await.unwrap());
}

#[tokio::test]
async fn compare_and_set_refuses_to_leave_terminal_state() {
  let s = store().await;
  let e = s
    .insert_if_absent(new_enrollment("alice@example.com", "1111111111"), t0())
    .await
    .unwrap()
    .enrollment;
  let gone = e.progress.unsubscribed();
  s.compare_and_set(e.enrollment_id, e.progress.clone(), gone.clone())
    .await
    .unwrap();

  let revived = Progress { status: EnrollmentStatus::Active, ..gone.clone() };
  let err = s
    .compare_and_set(e.enrollment_id, gone, revived)
    .await
    .unwrap_err();
  assert!(matches!(err, Error::Transition(drip_core::Error::Terminal(_))));
}

#[tokio::test]
async fn reopening_a_file_store_keeps_records() {
  let dir = std::env::temp_dir().join(format!("drip-store-{}", Uuid::new_v4()));
  std::fs::create_dir_all(&dir).unwrap();
  let path = dir.join("drip.sqlite");

  let id = {
    let s = SqliteStore::open(&path).await.unwrap();
    s.insert_if_absent(new_enrollment("alice@example.com", "1111111111"), t0())
      .await
      .unwrap()
      .enrollment
      .enrollment_id
  };

  let reopened = SqliteStore::open(&path).await.unwrap();
  assert!(reopened.get(id).await.unwrap().is_some());

  std::fs::remove_dir_all(&dir).ok();
}
