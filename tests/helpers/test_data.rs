//! Test data builders and the assembled application under test

use chrono::{DateTime, Duration, Utc};
use fake::faker::lorem::en::Sentence;
use fake::Fake;

use Eventra::config::Settings;
use Eventra::database::DatabaseService;
use Eventra::models::actor::{Actor, Role};
use Eventra::models::event::{CreateEventRequest, Event, EventType};
use Eventra::models::registration::{
    CreateRegistrationRequest, PaymentStatus, Registration, RegistrationStatus, RegistrationType,
};
use Eventra::services::ServiceFactory;

use super::database_helper::TestDatabase;

pub const ADMIN_ID: i64 = 9_000;

/// Everything a scenario test needs: the database and the service stack
/// wired against it. Redis stays unreachable in tests; caching degrades to
/// pass-through by design.
pub struct TestApp {
    pub db: TestDatabase,
    pub database: DatabaseService,
    pub services: ServiceFactory,
}

impl TestApp {
    pub async fn new() -> Self {
        let db = TestDatabase::new().await.expect("test database");
        let database = DatabaseService::new(db.pool.clone());

        let mut settings = Settings::default();
        settings.database.url = db.database_url.clone();
        settings.service.admin_ids = vec![ADMIN_ID];
        settings.features.membership_pricing = false;

        let services = ServiceFactory::new(settings, database.clone()).expect("service factory");

        Self {
            db,
            database,
            services,
        }
    }

    pub fn admin(&self) -> Actor {
        Actor::new(ADMIN_ID, Role::Admin)
    }

    pub fn organizer(&self, user_id: i64) -> Actor {
        Actor::new(user_id, Role::Organizer)
    }

    pub fn member(&self, user_id: i64) -> Actor {
        Actor::new(user_id, Role::Member)
    }

    /// Create and publish an event starting next week
    pub async fn published_event(
        &self,
        organizer_id: i64,
        max_participants: Option<i32>,
    ) -> Event {
        let start = Utc::now() + Duration::days(7);
        self.published_event_at(organizer_id, max_participants, start, None)
            .await
    }

    /// Create and publish an event with full schedule control
    pub async fn published_event_at(
        &self,
        organizer_id: i64,
        max_participants: Option<i32>,
        start_date: DateTime<Utc>,
        registration_deadline: Option<DateTime<Utc>>,
    ) -> Event {
        let organizer = self.organizer(organizer_id);
        let event = self
            .services
            .event_service
            .create_event(
                &organizer,
                event_request(organizer_id, max_participants, start_date, registration_deadline),
            )
            .await
            .expect("create event");

        self.services
            .event_service
            .publish_event(&organizer, event.id)
            .await
            .expect("publish event")
    }

    /// Insert a registration row directly, bypassing admission. Used to
    /// arrange states (e.g. confirmed rows on a past event) that the
    /// admission path would rightly refuse to create.
    pub async fn insert_registration(
        &self,
        event_id: i64,
        user_id: i64,
        status: RegistrationStatus,
    ) -> Registration {
        let mut tx = self.database.begin().await.expect("begin");
        let registration = self
            .database
            .registrations
            .insert_in_tx(
                &mut tx,
                CreateRegistrationRequest {
                    event_id,
                    user_id,
                    status,
                    registration_type: RegistrationType::Regular,
                    payment_required: false,
                    payment_status: PaymentStatus::Completed,
                    amount_due_cents: 0,
                    currency: "EUR".to_string(),
                },
                Utc::now(),
            )
            .await
            .expect("insert registration");
        tx.commit().await.expect("commit");

        registration
    }
}

/// A valid creation request with a generated title
pub fn event_request(
    organizer_id: i64,
    max_participants: Option<i32>,
    start_date: DateTime<Utc>,
    registration_deadline: Option<DateTime<Utc>>,
) -> CreateEventRequest {
    CreateEventRequest {
        title: Sentence(2..5).fake(),
        description: Some(Sentence(5..10).fake()),
        location: Some("Community Hall".to_string()),
        event_type: EventType::Free,
        start_date,
        end_date: start_date + Duration::hours(3),
        registration_deadline,
        max_participants,
        price_cents: None,
        member_price_cents: None,
        currency: None,
        organizer_id,
    }
}
