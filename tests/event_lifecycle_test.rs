//! Event lifecycle scenarios: publish, derived status, sweeps, deletion

mod helpers;

use assert_matches::assert_matches;
use chrono::{Duration, Utc};
use serial_test::serial;

use helpers::test_data::TestApp;
use Eventra::models::event::{EffectiveStatus, StoredStatus, UpdateEventRequest};
use Eventra::models::registration::{RegistrationStatus, RegistrationType};
use Eventra::utils::errors::EventraError;

#[tokio::test]
#[ignore = "requires a PostgreSQL test database"]
#[serial]
async fn publishing_is_one_way_and_requires_draft() {
    let app = TestApp::new().await;
    let organizer = app.organizer(1);

    let event = app
        .services
        .event_service
        .create_event(
            &organizer,
            helpers::test_data::event_request(1, Some(10), Utc::now() + Duration::days(7), None),
        )
        .await
        .unwrap();
    assert_eq!(event.stored_status, StoredStatus::Draft);

    let published = app
        .services
        .event_service
        .publish_event(&organizer, event.id)
        .await
        .unwrap();
    assert_eq!(published.stored_status, StoredStatus::Published);

    // Publishing again is an invalid transition
    assert_matches!(
        app.services
            .event_service
            .publish_event(&organizer, event.id)
            .await,
        Err(EventraError::InvalidStateTransition { .. })
    );
}

#[tokio::test]
#[ignore = "requires a PostgreSQL test database"]
#[serial]
async fn draft_events_do_not_accept_registrations() {
    let app = TestApp::new().await;
    let organizer = app.organizer(1);

    let event = app
        .services
        .event_service
        .create_event(
            &organizer,
            helpers::test_data::event_request(1, Some(10), Utc::now() + Duration::days(7), None),
        )
        .await
        .unwrap();

    assert_matches!(
        app.services
            .admission_service
            .admit(&app.member(100), event.id, false)
            .await,
        Err(EventraError::RegistrationNotOpen {
            status: StoredStatus::Draft
        })
    );
}

#[tokio::test]
#[ignore = "requires a PostgreSQL test database"]
#[serial]
async fn published_past_event_resolves_completed() {
    let app = TestApp::new().await;
    // Ended yesterday, stored status still published
    let start = Utc::now() - Duration::days(1) - Duration::hours(3);
    let event = app.published_event_at(1, Some(10), start, None).await;

    let status = app.services.status_service.resolve(event.id).await.unwrap();
    assert_eq!(status, EffectiveStatus::Completed);

    // The stored status only changes when the sweep runs
    let stored = app.services.event_service.get_event(event.id).await.unwrap();
    assert_eq!(stored.stored_status, StoredStatus::Published);
}

#[tokio::test]
#[ignore = "requires a PostgreSQL test database"]
#[serial]
async fn completion_sweep_marks_past_events_and_is_idempotent() {
    let app = TestApp::new().await;
    let past_start = Utc::now() - Duration::days(2);
    let past = app.published_event_at(1, Some(10), past_start, None).await;
    let upcoming = app.published_event(1, Some(10)).await;

    let completed = app
        .services
        .event_service
        .complete_past_events(Utc::now())
        .await
        .unwrap();
    assert_eq!(completed, 1);

    let past_after = app.services.event_service.get_event(past.id).await.unwrap();
    let upcoming_after = app
        .services
        .event_service
        .get_event(upcoming.id)
        .await
        .unwrap();
    assert_eq!(past_after.stored_status, StoredStatus::Completed);
    assert_eq!(upcoming_after.stored_status, StoredStatus::Published);

    // Second run is a no-op
    assert_eq!(
        app.services
            .event_service
            .complete_past_events(Utc::now())
            .await
            .unwrap(),
        0
    );
}

#[tokio::test]
#[ignore = "requires a PostgreSQL test database"]
#[serial]
async fn full_event_resolves_registration_closed() {
    let app = TestApp::new().await;
    let event = app.published_event(1, Some(2)).await;

    app.services
        .admission_service
        .admit(&app.member(100), event.id, false)
        .await
        .unwrap();
    assert_eq!(
        app.services.status_service.resolve(event.id).await.unwrap(),
        EffectiveStatus::RegistrationOpen
    );

    app.services
        .admission_service
        .admit(&app.member(101), event.id, false)
        .await
        .unwrap();
    assert_eq!(
        app.services.status_service.resolve(event.id).await.unwrap(),
        EffectiveStatus::RegistrationClosed
    );
}

#[tokio::test]
#[ignore = "requires a PostgreSQL test database"]
#[serial]
async fn capacity_cannot_shrink_below_held_slots() {
    let app = TestApp::new().await;
    let event = app.published_event(1, Some(5)).await;

    for user_id in 100..103 {
        app.services
            .admission_service
            .admit(&app.member(user_id), event.id, false)
            .await
            .unwrap();
    }

    assert_matches!(
        app.services
            .event_service
            .update_event(
                &app.organizer(1),
                event.id,
                UpdateEventRequest {
                    max_participants: Some(2),
                    ..Default::default()
                },
            )
            .await,
        Err(EventraError::InvalidInput(_))
    );

    // Shrinking to exactly the held count is fine
    let updated = app
        .services
        .event_service
        .update_event(
            &app.organizer(1),
            event.id,
            UpdateEventRequest {
                max_participants: Some(3),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.max_participants, Some(3));
}

#[tokio::test]
#[ignore = "requires a PostgreSQL test database"]
#[serial]
async fn organizers_cannot_delete_events_with_active_registrations() {
    let app = TestApp::new().await;
    let event = app.published_event(1, Some(5)).await;

    app.services
        .admission_service
        .admit(&app.member(100), event.id, false)
        .await
        .unwrap();

    assert_matches!(
        app.services
            .event_service
            .delete_event(&app.organizer(1), event.id)
            .await,
        Err(EventraError::Forbidden(_))
    );

    // Admins may; registrations cascade
    app.services
        .event_service
        .delete_event(&app.admin(), event.id)
        .await
        .unwrap();
    assert_matches!(
        app.services.event_service.get_event(event.id).await,
        Err(EventraError::EventNotFound { .. })
    );
}

#[tokio::test]
#[ignore = "requires a PostgreSQL test database"]
#[serial]
async fn cancelled_events_keep_registrations_but_close_admission() {
    let app = TestApp::new().await;
    let event = app.published_event(1, Some(5)).await;

    let r1 = app
        .services
        .admission_service
        .admit(&app.member(100), event.id, false)
        .await
        .unwrap();

    app.services
        .event_service
        .cancel_event(&app.organizer(1), event.id)
        .await
        .unwrap();

    assert_eq!(
        app.services.status_service.resolve(event.id).await.unwrap(),
        EffectiveStatus::Cancelled
    );
    assert_matches!(
        app.services
            .admission_service
            .admit(&app.member(101), event.id, false)
            .await,
        Err(EventraError::RegistrationNotOpen { .. })
    );

    // Existing registration rows survive event cancellation
    let r1_after = app
        .database
        .registrations
        .find_by_id(r1.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(r1_after.status, RegistrationStatus::Confirmed);
}

#[tokio::test]
#[ignore = "requires a PostgreSQL test database"]
#[serial]
async fn event_managers_may_tag_vips() {
    let app = TestApp::new().await;
    let event = app.published_event(1, Some(5)).await;

    let r1 = app
        .services
        .admission_service
        .admit(&app.member(100), event.id, false)
        .await
        .unwrap();
    assert_eq!(r1.registration_type, RegistrationType::Regular);

    // The registrant themselves may not
    assert_matches!(
        app.services
            .event_service
            .set_registration_type(&app.member(100), r1.id, RegistrationType::Vip)
            .await,
        Err(EventraError::Forbidden(_))
    );

    let tagged = app
        .services
        .event_service
        .set_registration_type(&app.organizer(1), r1.id, RegistrationType::Vip)
        .await
        .unwrap();
    assert_eq!(tagged.registration_type, RegistrationType::Vip);
    assert_eq!(tagged.status, RegistrationStatus::Confirmed);
}

#[tokio::test]
#[ignore = "requires a PostgreSQL test database"]
#[serial]
async fn users_see_only_their_own_registrations() {
    let app = TestApp::new().await;
    let event = app.published_event(1, Some(5)).await;

    app.services
        .admission_service
        .admit(&app.member(100), event.id, false)
        .await
        .unwrap();

    let own = app
        .services
        .event_service
        .list_user_registrations(&app.member(100), 100)
        .await
        .unwrap();
    assert_eq!(own.len(), 1);

    assert_matches!(
        app.services
            .event_service
            .list_user_registrations(&app.member(101), 100)
            .await,
        Err(EventraError::Forbidden(_))
    );

    // Admins may inspect anyone's
    assert_eq!(
        app.services
            .event_service
            .list_user_registrations(&app.admin(), 100)
            .await
            .unwrap()
            .len(),
        1
    );
}
