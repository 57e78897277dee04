//! Event repository implementation

use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Transaction};

use crate::models::event::{CreateEventRequest, Event, UpdateEventRequest};
use crate::utils::errors::EventraError;

const EVENT_COLUMNS: &str = "id, title, description, location, stored_status, event_type, \
     start_date, end_date, registration_deadline, max_participants, price_cents, \
     member_price_cents, currency, organizer_id, created_at, updated_at";

#[derive(Debug, Clone)]
pub struct EventRepository {
    pool: PgPool,
}

impl EventRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create a new event in draft state
    pub async fn create(&self, request: CreateEventRequest) -> Result<Event, EventraError> {
        let event = sqlx::query_as::<_, Event>(&format!(
            r#"
            INSERT INTO events (title, description, location, event_type, start_date, end_date,
                                registration_deadline, max_participants, price_cents,
                                member_price_cents, currency, organizer_id)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            RETURNING {EVENT_COLUMNS}
            "#
        ))
        .bind(request.title)
        .bind(request.description)
        .bind(request.location)
        .bind(request.event_type)
        .bind(request.start_date)
        .bind(request.end_date)
        .bind(request.registration_deadline)
        .bind(request.max_participants)
        .bind(request.price_cents)
        .bind(request.member_price_cents)
        .bind(request.currency)
        .bind(request.organizer_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(event)
    }

    /// Find event by ID
    pub async fn find_by_id(&self, id: i64) -> Result<Option<Event>, EventraError> {
        let event = sqlx::query_as::<_, Event>(&format!(
            "SELECT {EVENT_COLUMNS} FROM events WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(event)
    }

    /// Find event by ID and take the per-event row lock.
    ///
    /// All capacity-affecting writes for one event serialize on this lock;
    /// callers must hold it for the whole count-then-write unit.
    pub async fn find_by_id_for_update(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        id: i64,
    ) -> Result<Option<Event>, EventraError> {
        let event = sqlx::query_as::<_, Event>(&format!(
            "SELECT {EVENT_COLUMNS} FROM events WHERE id = $1 FOR UPDATE"
        ))
        .bind(id)
        .fetch_optional(&mut **tx)
        .await?;

        Ok(event)
    }

    /// Update event fields within a transaction
    pub async fn update_in_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        id: i64,
        request: UpdateEventRequest,
    ) -> Result<Event, EventraError> {
        let event = sqlx::query_as::<_, Event>(&format!(
            r#"
            UPDATE events
            SET title = COALESCE($2, title),
                description = COALESCE($3, description),
                location = COALESCE($4, location),
                start_date = COALESCE($5, start_date),
                end_date = COALESCE($6, end_date),
                registration_deadline = COALESCE($7, registration_deadline),
                max_participants = COALESCE($8, max_participants),
                price_cents = COALESCE($9, price_cents),
                member_price_cents = COALESCE($10, member_price_cents),
                updated_at = now()
            WHERE id = $1
            RETURNING {EVENT_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(request.title)
        .bind(request.description)
        .bind(request.location)
        .bind(request.start_date)
        .bind(request.end_date)
        .bind(request.registration_deadline)
        .bind(request.max_participants)
        .bind(request.price_cents)
        .bind(request.member_price_cents)
        .fetch_one(&mut **tx)
        .await?;

        Ok(event)
    }

    /// Publish a draft event. Compare-and-set: returns None when the event
    /// was not in draft state.
    pub async fn publish(&self, id: i64) -> Result<Option<Event>, EventraError> {
        let event = sqlx::query_as::<_, Event>(&format!(
            r#"
            UPDATE events
            SET stored_status = 'published', updated_at = now()
            WHERE id = $1 AND stored_status = 'draft'
            RETURNING {EVENT_COLUMNS}
            "#
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(event)
    }

    /// Cancel an event. Returns None when already cancelled or completed.
    pub async fn cancel(&self, id: i64) -> Result<Option<Event>, EventraError> {
        let event = sqlx::query_as::<_, Event>(&format!(
            r#"
            UPDATE events
            SET stored_status = 'cancelled', updated_at = now()
            WHERE id = $1 AND stored_status IN ('draft', 'published')
            RETURNING {EVENT_COLUMNS}
            "#
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(event)
    }

    /// Mark a published past event completed. Compare-and-set keyed on the
    /// stored status and end date, so the sweep is idempotent.
    pub async fn mark_completed(
        &self,
        id: i64,
        now: DateTime<Utc>,
    ) -> Result<bool, EventraError> {
        let result = sqlx::query(
            r#"
            UPDATE events
            SET stored_status = 'completed', updated_at = now()
            WHERE id = $1 AND stored_status = 'published' AND end_date < $2
            "#,
        )
        .bind(id)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Delete event; registrations cascade
    pub async fn delete(&self, id: i64) -> Result<(), EventraError> {
        sqlx::query("DELETE FROM events WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// Get upcoming published events
    pub async fn list_upcoming(&self, limit: i64) -> Result<Vec<Event>, EventraError> {
        let events = sqlx::query_as::<_, Event>(&format!(
            "SELECT {EVENT_COLUMNS} FROM events \
             WHERE stored_status = 'published' AND start_date > now() \
             ORDER BY start_date ASC LIMIT $1"
        ))
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(events)
    }

    /// Get events owned by an organizer
    pub async fn list_by_organizer(&self, organizer_id: i64) -> Result<Vec<Event>, EventraError> {
        let events = sqlx::query_as::<_, Event>(&format!(
            "SELECT {EVENT_COLUMNS} FROM events WHERE organizer_id = $1 ORDER BY start_date ASC"
        ))
        .bind(organizer_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(events)
    }

    /// Published events whose end date has passed, candidates for the
    /// completion sweep
    pub async fn events_needing_completion(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<i64>, EventraError> {
        let ids: Vec<(i64,)> = sqlx::query_as(
            "SELECT id FROM events WHERE stored_status = 'published' AND end_date < $1",
        )
        .bind(now)
        .fetch_all(&self.pool)
        .await?;

        Ok(ids.into_iter().map(|(id,)| id).collect())
    }
}
