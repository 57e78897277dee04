//! Registration admission, cancellation and promotion scenarios
//!
//! These exercise the capacity-critical paths end to end against a real
//! PostgreSQL instance. Run with `cargo test -- --ignored` when Docker or
//! TEST_DATABASE_URL is available.

mod helpers;

use assert_matches::assert_matches;
use chrono::{Duration, Utc};
use serial_test::serial;

use helpers::test_data::TestApp;
use Eventra::models::registration::{RegistrationStatus, RegistrationType};
use Eventra::utils::errors::EventraError;

#[tokio::test]
#[ignore = "requires a PostgreSQL test database"]
#[serial]
async fn concurrent_admissions_never_oversell_capacity() {
    let app = TestApp::new().await;
    let event = app.published_event(1, Some(5)).await;

    let mut handles = Vec::new();
    for user_id in 100..120 {
        let admission = app.services.admission_service.clone();
        let actor = app.member(user_id);
        let event_id = event.id;
        handles.push(tokio::spawn(async move {
            admission.admit(&actor, event_id, true).await
        }));
    }

    let mut confirmed = 0;
    let mut waitlisted = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(r) if r.status == RegistrationStatus::Confirmed => confirmed += 1,
            Ok(r) if r.status == RegistrationStatus::Waitlist => waitlisted += 1,
            Ok(r) => panic!("unexpected admission status {:?}", r.status),
            Err(e) => panic!("admission failed: {e}"),
        }
    }

    assert_eq!(confirmed, 5);
    assert_eq!(waitlisted, 15);
    assert_eq!(
        app.database
            .registrations
            .count_slot_consuming(event.id)
            .await
            .unwrap(),
        5
    );
}

#[tokio::test]
#[ignore = "requires a PostgreSQL test database"]
#[serial]
async fn two_users_racing_for_the_last_slot() {
    let app = TestApp::new().await;
    let event = app.published_event(1, Some(1)).await;

    let admission_a = app.services.admission_service.clone();
    let admission_b = app.services.admission_service.clone();
    let alice = app.member(100);
    let bob = app.member(101);
    let event_id = event.id;

    let (a, b) = tokio::join!(
        admission_a.admit(&alice, event_id, false),
        admission_b.admit(&bob, event_id, false),
    );

    // Exactly one confirmed; the loser is told the event is full
    let results = [a, b];
    let winners = results
        .iter()
        .filter(|r| matches!(r, Ok(reg) if reg.status == RegistrationStatus::Confirmed))
        .count();
    let losers = results
        .iter()
        .filter(|r| matches!(r, Err(EventraError::EventFull { .. })))
        .count();

    assert_eq!(winners, 1);
    assert_eq!(losers, 1);
}

#[tokio::test]
#[ignore = "requires a PostgreSQL test database"]
#[serial]
async fn race_loser_with_waitlist_opt_in_is_waitlisted() {
    let app = TestApp::new().await;
    let event = app.published_event(1, Some(1)).await;

    let admission_a = app.services.admission_service.clone();
    let admission_b = app.services.admission_service.clone();
    let alice = app.member(100);
    let bob = app.member(101);
    let event_id = event.id;

    let (a, b) = tokio::join!(
        admission_a.admit(&alice, event_id, true),
        admission_b.admit(&bob, event_id, true),
    );

    let statuses: Vec<_> = [a, b]
        .into_iter()
        .map(|r| r.expect("both admissions succeed").status)
        .collect();

    assert!(statuses.contains(&RegistrationStatus::Confirmed));
    assert!(statuses.contains(&RegistrationStatus::Waitlist));
}

#[tokio::test]
#[ignore = "requires a PostgreSQL test database"]
#[serial]
async fn duplicate_admission_is_rejected_with_status_specific_error() {
    let app = TestApp::new().await;
    let event = app.published_event(1, Some(10)).await;
    let alice = app.member(100);

    let first = app
        .services
        .admission_service
        .admit(&alice, event.id, false)
        .await
        .unwrap();
    assert_eq!(first.status, RegistrationStatus::Confirmed);

    assert_matches!(
        app.services
            .admission_service
            .admit(&alice, event.id, false)
            .await,
        Err(EventraError::DuplicateActive {
            status: RegistrationStatus::Confirmed
        })
    );
}

#[tokio::test]
#[ignore = "requires a PostgreSQL test database"]
#[serial]
async fn waitlisted_user_cannot_register_twice() {
    let app = TestApp::new().await;
    let event = app.published_event(1, Some(1)).await;

    app.services
        .admission_service
        .admit(&app.member(100), event.id, false)
        .await
        .unwrap();
    let waitlisted = app
        .services
        .admission_service
        .admit(&app.member(101), event.id, true)
        .await
        .unwrap();
    assert_eq!(waitlisted.status, RegistrationStatus::Waitlist);

    // The active-row unique index converts the second attempt into a
    // DuplicateActive rejection
    assert_matches!(
        app.services
            .admission_service
            .admit(&app.member(101), event.id, true)
            .await,
        Err(EventraError::DuplicateActive {
            status: RegistrationStatus::Waitlist
        })
    );
}

#[tokio::test]
#[ignore = "requires a PostgreSQL test database"]
#[serial]
async fn cancelled_user_may_register_again_with_a_new_row() {
    let app = TestApp::new().await;
    let event = app.published_event(1, Some(10)).await;
    let alice = app.member(100);

    let first = app
        .services
        .admission_service
        .admit(&alice, event.id, false)
        .await
        .unwrap();
    app.services
        .cancellation_service
        .cancel(&alice, first.id)
        .await
        .unwrap();

    let second = app
        .services
        .admission_service
        .admit(&alice, event.id, false)
        .await
        .unwrap();

    assert_ne!(first.id, second.id);
    assert_eq!(second.status, RegistrationStatus::Confirmed);

    // The cancelled row stays historical
    let old = app
        .database
        .registrations
        .find_by_id(first.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(old.status, RegistrationStatus::Cancelled);
}

#[tokio::test]
#[ignore = "requires a PostgreSQL test database"]
#[serial]
async fn organizers_registering_for_their_own_event_are_tagged() {
    let app = TestApp::new().await;
    let event = app.published_event(1, Some(10)).await;

    let own = app
        .services
        .admission_service
        .admit(&app.organizer(1), event.id, false)
        .await
        .unwrap();
    assert_eq!(own.registration_type, RegistrationType::Organizer);

    let regular = app
        .services
        .admission_service
        .admit(&app.member(100), event.id, false)
        .await
        .unwrap();
    assert_eq!(regular.registration_type, RegistrationType::Regular);
}

#[tokio::test]
#[ignore = "requires a PostgreSQL test database"]
#[serial]
async fn admission_after_deadline_is_rejected_despite_free_slots() {
    let app = TestApp::new().await;
    // Deadline yesterday, event starts tomorrow
    let start = Utc::now() + Duration::days(1);
    let deadline = Utc::now() - Duration::days(1);
    let event = app
        .published_event_at(1, Some(10), start, Some(deadline))
        .await;

    assert_matches!(
        app.services
            .admission_service
            .admit(&app.member(100), event.id, false)
            .await,
        Err(EventraError::DeadlinePassed { .. })
    );
}

#[tokio::test]
#[ignore = "requires a PostgreSQL test database"]
#[serial]
async fn cancelling_a_confirmed_registration_promotes_fifo() {
    let app = TestApp::new().await;
    let event = app.published_event(1, Some(2)).await;

    let r1 = app
        .services
        .admission_service
        .admit(&app.member(100), event.id, false)
        .await
        .unwrap();
    app.services
        .admission_service
        .admit(&app.member(101), event.id, false)
        .await
        .unwrap();
    let r3 = app
        .services
        .admission_service
        .admit(&app.member(102), event.id, true)
        .await
        .unwrap();
    let r4 = app
        .services
        .admission_service
        .admit(&app.member(103), event.id, true)
        .await
        .unwrap();

    assert_eq!(r3.status, RegistrationStatus::Waitlist);
    assert_eq!(r4.status, RegistrationStatus::Waitlist);

    // Cancel the first confirmed registration: the OLDEST waitlisted row
    // (r3) must be promoted, r4 stays waitlisted
    let cancelled = app
        .services
        .cancellation_service
        .cancel(&app.member(100), r1.id)
        .await
        .unwrap();
    assert_eq!(cancelled.id, r1.id);
    assert_eq!(cancelled.status, RegistrationStatus::Cancelled);

    let r3_after = app
        .database
        .registrations
        .find_by_id(r3.id)
        .await
        .unwrap()
        .unwrap();
    let r4_after = app
        .database
        .registrations
        .find_by_id(r4.id)
        .await
        .unwrap()
        .unwrap();

    assert_eq!(r3_after.status, RegistrationStatus::Confirmed);
    assert!(r3_after.confirmed_at.is_some());
    assert_eq!(r4_after.status, RegistrationStatus::Waitlist);
}

#[tokio::test]
#[ignore = "requires a PostgreSQL test database"]
#[serial]
async fn cancelling_a_waitlisted_registration_promotes_nobody() {
    let app = TestApp::new().await;
    let event = app.published_event(1, Some(1)).await;

    app.services
        .admission_service
        .admit(&app.member(100), event.id, false)
        .await
        .unwrap();
    let w1 = app
        .services
        .admission_service
        .admit(&app.member(101), event.id, true)
        .await
        .unwrap();
    let w2 = app
        .services
        .admission_service
        .admit(&app.member(102), event.id, true)
        .await
        .unwrap();

    app.services
        .cancellation_service
        .cancel(&app.member(101), w1.id)
        .await
        .unwrap();

    // No slot was freed, so w2 must still be waitlisted
    let w2_after = app
        .database
        .registrations
        .find_by_id(w2.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(w2_after.status, RegistrationStatus::Waitlist);
}

#[tokio::test]
#[ignore = "requires a PostgreSQL test database"]
#[serial]
async fn concurrent_cancellations_never_double_promote() {
    let app = TestApp::new().await;
    let event = app.published_event(1, Some(2)).await;

    let r1 = app
        .services
        .admission_service
        .admit(&app.member(100), event.id, false)
        .await
        .unwrap();
    let r2 = app
        .services
        .admission_service
        .admit(&app.member(101), event.id, false)
        .await
        .unwrap();
    app.services
        .admission_service
        .admit(&app.member(102), event.id, true)
        .await
        .unwrap();
    app.services
        .admission_service
        .admit(&app.member(103), event.id, true)
        .await
        .unwrap();

    let cancel_a = app.services.cancellation_service.clone();
    let cancel_b = app.services.cancellation_service.clone();
    let alice = app.member(100);
    let bob = app.member(101);

    let (a, b) = tokio::join!(cancel_a.cancel(&alice, r1.id), cancel_b.cancel(&bob, r2.id));
    a.unwrap();
    b.unwrap();

    // Two slots freed, two waitlisted rows: each must be promoted exactly
    // once, never the same row twice
    let registrations = app
        .database
        .registrations
        .list_for_event(event.id)
        .await
        .unwrap();
    let confirmed: Vec<_> = registrations
        .iter()
        .filter(|r| r.status == RegistrationStatus::Confirmed)
        .collect();
    let waitlisted: Vec<_> = registrations
        .iter()
        .filter(|r| r.status == RegistrationStatus::Waitlist)
        .collect();

    assert_eq!(confirmed.len(), 2);
    assert_eq!(waitlisted.len(), 0);
    assert_eq!(
        app.database
            .registrations
            .count_slot_consuming(event.id)
            .await
            .unwrap(),
        2
    );
}

#[tokio::test]
#[ignore = "requires a PostgreSQL test database"]
#[serial]
async fn cancelling_twice_reports_already_cancelled() {
    let app = TestApp::new().await;
    let event = app.published_event(1, Some(2)).await;

    let r1 = app
        .services
        .admission_service
        .admit(&app.member(100), event.id, false)
        .await
        .unwrap();
    app.services
        .cancellation_service
        .cancel(&app.member(100), r1.id)
        .await
        .unwrap();

    assert_matches!(
        app.services
            .cancellation_service
            .cancel(&app.member(100), r1.id)
            .await,
        Err(EventraError::AlreadyCancelled { .. })
    );

    // The double cancel freed no second slot
    assert_eq!(
        app.database
            .registrations
            .count_slot_consuming(event.id)
            .await
            .unwrap(),
        0
    );
}

#[tokio::test]
#[ignore = "requires a PostgreSQL test database"]
#[serial]
async fn strangers_cannot_cancel_others_registrations() {
    let app = TestApp::new().await;
    let event = app.published_event(1, Some(2)).await;

    let r1 = app
        .services
        .admission_service
        .admit(&app.member(100), event.id, false)
        .await
        .unwrap();

    assert_matches!(
        app.services
            .cancellation_service
            .cancel(&app.member(555), r1.id)
            .await,
        Err(EventraError::Forbidden(_))
    );

    // Organizer and admin both may
    app.services
        .cancellation_service
        .cancel(&app.organizer(1), r1.id)
        .await
        .unwrap();
}

#[tokio::test]
#[ignore = "requires a PostgreSQL test database"]
#[serial]
async fn organizer_may_promote_a_specific_waitlisted_registration() {
    let app = TestApp::new().await;
    let event = app.published_event(1, Some(2)).await;

    let r1 = app
        .services
        .admission_service
        .admit(&app.member(100), event.id, false)
        .await
        .unwrap();
    app.services
        .admission_service
        .admit(&app.member(101), event.id, false)
        .await
        .unwrap();
    let w1 = app
        .services
        .admission_service
        .admit(&app.member(102), event.id, true)
        .await
        .unwrap();

    // Full event: explicit promotion is refused
    assert_matches!(
        app.services
            .cancellation_service
            .promote_registration(&app.organizer(1), w1.id)
            .await,
        Err(EventraError::EventFull { .. })
    );

    // After a slot frees up it goes through
    app.services
        .cancellation_service
        .cancel(&app.member(100), r1.id)
        .await
        .unwrap();

    // The automatic promotion already took w1; promoting again is invalid
    let w1_after = app
        .database
        .registrations
        .find_by_id(w1.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(w1_after.status, RegistrationStatus::Confirmed);
    assert_matches!(
        app.services
            .cancellation_service
            .promote_registration(&app.organizer(1), w1.id)
            .await,
        Err(EventraError::InvalidStateTransition { .. })
    );
}

#[tokio::test]
#[ignore = "requires a PostgreSQL test database"]
#[serial]
async fn admin_attendance_grace_window() {
    let app = TestApp::new().await;
    // Event ended two days ago
    let start = Utc::now() - Duration::days(2) - Duration::hours(3);
    let event = app.published_event_at(1, Some(10), start, None).await;

    let r1 = app
        .insert_registration(event.id, 100, RegistrationStatus::Confirmed)
        .await;
    let r2 = app
        .insert_registration(event.id, 101, RegistrationStatus::Confirmed)
        .await;

    // Admin inside the 3-day grace window: allowed
    let marked = app
        .services
        .attendance_service
        .mark_attendance(&app.admin(), r1.id, true)
        .await
        .unwrap();
    assert_eq!(marked.status, RegistrationStatus::Attended);

    // The organizer (non-admin) is past their window
    assert_matches!(
        app.services
            .attendance_service
            .mark_attendance(&app.organizer(1), r2.id, false)
            .await,
        Err(EventraError::WindowExpired { .. })
    );
}

#[tokio::test]
#[ignore = "requires a PostgreSQL test database"]
#[serial]
async fn attended_registrations_are_terminal() {
    let app = TestApp::new().await;
    let start = Utc::now() - Duration::hours(5);
    let event = app.published_event_at(1, Some(10), start, None).await;

    let r1 = app
        .insert_registration(event.id, 100, RegistrationStatus::Confirmed)
        .await;

    app.services
        .attendance_service
        .mark_attendance(&app.admin(), r1.id, true)
        .await
        .unwrap();

    // No cancelling a completed attendance
    assert_matches!(
        app.services
            .cancellation_service
            .cancel(&app.admin(), r1.id)
            .await,
        Err(EventraError::TerminalState {
            status: RegistrationStatus::Attended
        })
    );

    // And no re-marking it either
    assert_matches!(
        app.services
            .attendance_service
            .mark_attendance(&app.admin(), r1.id, false)
            .await,
        Err(EventraError::TerminalState { .. })
    );
}

#[tokio::test]
#[ignore = "requires a PostgreSQL test database"]
#[serial]
async fn reconciliation_sweep_promotes_missed_waitlisters() {
    let app = TestApp::new().await;
    let event = app.published_event(1, Some(2)).await;

    // One slot used, one free, but a waitlisted row exists (as if a
    // promotion was missed after a crash)
    app.insert_registration(event.id, 100, RegistrationStatus::Confirmed)
        .await;
    let w1 = app
        .insert_registration(event.id, 101, RegistrationStatus::Waitlist)
        .await;

    let promotions = app
        .services
        .cancellation_service
        .reconcile_waitlists()
        .await
        .unwrap();
    assert_eq!(promotions, 1);

    let w1_after = app
        .database
        .registrations
        .find_by_id(w1.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(w1_after.status, RegistrationStatus::Confirmed);

    // A second run finds nothing to do
    assert_eq!(
        app.services
            .cancellation_service
            .reconcile_waitlists()
            .await
            .unwrap(),
        0
    );
}
