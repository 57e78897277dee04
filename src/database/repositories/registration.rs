//! Registration repository implementation
//!
//! Capacity-sensitive reads and writes come in transaction-scoped variants;
//! those must run under the per-event row lock taken via
//! `EventRepository::find_by_id_for_update`.

use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Transaction};

use crate::models::registration::{CreateRegistrationRequest, Registration, RegistrationStatus};
use crate::utils::errors::EventraError;

const REGISTRATION_COLUMNS: &str = "id, event_id, user_id, status, registration_type, \
     payment_required, payment_status, amount_due_cents, currency, registered_at, \
     confirmed_at, cancelled_at";

#[derive(Debug, Clone)]
pub struct RegistrationRepository {
    pool: PgPool,
}

impl RegistrationRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert a registration row. Must run inside the admission transaction:
    /// the partial unique index on active (event, user) pairs turns a lost
    /// race into a unique violation here.
    pub async fn insert_in_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        request: CreateRegistrationRequest,
        now: DateTime<Utc>,
    ) -> Result<Registration, EventraError> {
        let confirmed_at = match request.status {
            RegistrationStatus::Confirmed => Some(now),
            _ => None,
        };

        let registration = sqlx::query_as::<_, Registration>(&format!(
            r#"
            INSERT INTO registrations (event_id, user_id, status, registration_type,
                                       payment_required, payment_status, amount_due_cents,
                                       currency, registered_at, confirmed_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING {REGISTRATION_COLUMNS}
            "#
        ))
        .bind(request.event_id)
        .bind(request.user_id)
        .bind(request.status)
        .bind(request.registration_type)
        .bind(request.payment_required)
        .bind(request.payment_status)
        .bind(request.amount_due_cents)
        .bind(request.currency)
        .bind(now)
        .bind(confirmed_at)
        .fetch_one(&mut **tx)
        .await?;

        Ok(registration)
    }

    /// Find registration by ID
    pub async fn find_by_id(&self, id: i64) -> Result<Option<Registration>, EventraError> {
        let registration = sqlx::query_as::<_, Registration>(&format!(
            "SELECT {REGISTRATION_COLUMNS} FROM registrations WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(registration)
    }

    /// Find registration by ID with a row lock
    pub async fn find_by_id_for_update(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        id: i64,
    ) -> Result<Option<Registration>, EventraError> {
        let registration = sqlx::query_as::<_, Registration>(&format!(
            "SELECT {REGISTRATION_COLUMNS} FROM registrations WHERE id = $1 FOR UPDATE"
        ))
        .bind(id)
        .fetch_optional(&mut **tx)
        .await?;

        Ok(registration)
    }

    /// The user's active (pending/confirmed/waitlist) registration for an
    /// event, if any
    pub async fn find_active(
        &self,
        event_id: i64,
        user_id: i64,
    ) -> Result<Option<Registration>, EventraError> {
        let registration = sqlx::query_as::<_, Registration>(&format!(
            "SELECT {REGISTRATION_COLUMNS} FROM registrations \
             WHERE event_id = $1 AND user_id = $2 \
               AND status IN ('pending', 'confirmed', 'waitlist')"
        ))
        .bind(event_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(registration)
    }

    /// Count of registrations consuming a capacity slot. Fresh read from the
    /// store; the capacity gate never accepts a cached value.
    pub async fn count_slot_consuming(&self, event_id: i64) -> Result<i64, EventraError> {
        let count: (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM registrations \
             WHERE event_id = $1 AND status IN ('pending', 'confirmed', 'attended', 'no_show')",
        )
        .bind(event_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(count.0)
    }

    /// Slot-consuming count inside the admission/promotion transaction,
    /// after the event row lock is held
    pub async fn count_slot_consuming_in_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        event_id: i64,
    ) -> Result<i64, EventraError> {
        let count: (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM registrations \
             WHERE event_id = $1 AND status IN ('pending', 'confirmed', 'attended', 'no_show')",
        )
        .bind(event_id)
        .fetch_one(&mut **tx)
        .await?;

        Ok(count.0)
    }

    /// Count of all non-cancelled registrations, used by status resolution
    pub async fn count_non_cancelled(&self, event_id: i64) -> Result<i64, EventraError> {
        let count: (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM registrations WHERE event_id = $1 AND status != 'cancelled'",
        )
        .bind(event_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(count.0)
    }

    /// Count of active registrations for an event (deletion guard)
    pub async fn count_active_for_event(&self, event_id: i64) -> Result<i64, EventraError> {
        let count: (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM registrations \
             WHERE event_id = $1 AND status IN ('pending', 'confirmed', 'waitlist')",
        )
        .bind(event_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(count.0)
    }

    /// Oldest waitlisted registration for an event, strict FIFO by
    /// registration time with id as tie-breaker
    pub async fn oldest_waitlisted_in_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        event_id: i64,
    ) -> Result<Option<Registration>, EventraError> {
        let registration = sqlx::query_as::<_, Registration>(&format!(
            "SELECT {REGISTRATION_COLUMNS} FROM registrations \
             WHERE event_id = $1 AND status = 'waitlist' \
             ORDER BY registered_at ASC, id ASC LIMIT 1 FOR UPDATE"
        ))
        .bind(event_id)
        .fetch_optional(&mut **tx)
        .await?;

        Ok(registration)
    }

    /// Cancel a registration row within a transaction
    pub async fn mark_cancelled_in_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        id: i64,
        now: DateTime<Utc>,
    ) -> Result<Registration, EventraError> {
        let registration = sqlx::query_as::<_, Registration>(&format!(
            r#"
            UPDATE registrations
            SET status = 'cancelled', cancelled_at = $2
            WHERE id = $1
            RETURNING {REGISTRATION_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(now)
        .fetch_one(&mut **tx)
        .await?;

        Ok(registration)
    }

    /// Promote a waitlisted registration to confirmed. Guarded on the
    /// current status so a raced row is never promoted twice.
    pub async fn promote_in_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        id: i64,
        now: DateTime<Utc>,
    ) -> Result<Option<Registration>, EventraError> {
        let registration = sqlx::query_as::<_, Registration>(&format!(
            r#"
            UPDATE registrations
            SET status = 'confirmed', confirmed_at = $2
            WHERE id = $1 AND status = 'waitlist'
            RETURNING {REGISTRATION_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(now)
        .fetch_optional(&mut **tx)
        .await?;

        Ok(registration)
    }

    /// Record attendance. Guarded on slot-holding states; returns None when
    /// the registration was not in a markable state.
    pub async fn mark_attendance(
        &self,
        id: i64,
        status: RegistrationStatus,
    ) -> Result<Option<Registration>, EventraError> {
        let registration = sqlx::query_as::<_, Registration>(&format!(
            r#"
            UPDATE registrations
            SET status = $2
            WHERE id = $1 AND status IN ('confirmed', 'pending')
            RETURNING {REGISTRATION_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(status)
        .fetch_optional(&self.pool)
        .await?;

        Ok(registration)
    }

    /// Change a registration's type (e.g. tagging a VIP)
    pub async fn update_registration_type(
        &self,
        id: i64,
        registration_type: crate::models::registration::RegistrationType,
    ) -> Result<Option<Registration>, EventraError> {
        let registration = sqlx::query_as::<_, Registration>(&format!(
            r#"
            UPDATE registrations
            SET registration_type = $2
            WHERE id = $1
            RETURNING {REGISTRATION_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(registration_type)
        .fetch_optional(&self.pool)
        .await?;

        Ok(registration)
    }

    /// Record an externally-reported payment outcome
    pub async fn update_payment_status(
        &self,
        id: i64,
        payment_status: crate::models::registration::PaymentStatus,
    ) -> Result<Option<Registration>, EventraError> {
        let registration = sqlx::query_as::<_, Registration>(&format!(
            r#"
            UPDATE registrations
            SET payment_status = $2
            WHERE id = $1
            RETURNING {REGISTRATION_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(payment_status)
        .fetch_optional(&self.pool)
        .await?;

        Ok(registration)
    }

    /// All registrations for an event in registration order
    pub async fn list_for_event(&self, event_id: i64) -> Result<Vec<Registration>, EventraError> {
        let registrations = sqlx::query_as::<_, Registration>(&format!(
            "SELECT {REGISTRATION_COLUMNS} FROM registrations \
             WHERE event_id = $1 ORDER BY registered_at ASC, id ASC"
        ))
        .bind(event_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(registrations)
    }

    /// All registrations owned by a user, newest first
    pub async fn list_for_user(&self, user_id: i64) -> Result<Vec<Registration>, EventraError> {
        let registrations = sqlx::query_as::<_, Registration>(&format!(
            "SELECT {REGISTRATION_COLUMNS} FROM registrations \
             WHERE user_id = $1 ORDER BY registered_at DESC"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(registrations)
    }

    /// User ids holding active registrations for an event, for bulk
    /// notification on event cancellation
    pub async fn active_user_ids_for_event(&self, event_id: i64) -> Result<Vec<i64>, EventraError> {
        let ids: Vec<(i64,)> = sqlx::query_as(
            "SELECT user_id FROM registrations \
             WHERE event_id = $1 AND status IN ('pending', 'confirmed', 'waitlist')",
        )
        .bind(event_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(ids.into_iter().map(|(id,)| id).collect())
    }

    /// Published events that still have waitlisted rows, scanned by the
    /// reconciliation sweep
    pub async fn event_ids_with_waitlist(&self) -> Result<Vec<i64>, EventraError> {
        let ids: Vec<(i64,)> = sqlx::query_as(
            r#"
            SELECT DISTINCT r.event_id
            FROM registrations r
            JOIN events e ON e.id = r.event_id
            WHERE r.status = 'waitlist' AND e.stored_status = 'published'
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(ids.into_iter().map(|(id,)| id).collect())
    }
}
