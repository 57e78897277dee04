//! Event status resolution
//!
//! The status shown to callers is derived at read time from the stored
//! status, the event dates and a live registration count. Only PUBLISHED
//! events derive; every other stored status is authoritative.

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::database::DatabaseService;
use crate::models::event::{EffectiveStatus, Event, StoredStatus};
use crate::utils::errors::{EventraError, Result};

/// Compute the effective status of an event.
///
/// Pure and total over valid input. `non_cancelled_count` must be a fresh
/// count of every registration that is not cancelled; callers on the write
/// path obtain it from the store, never from a cache.
pub fn effective_status(
    event: &Event,
    non_cancelled_count: i64,
    now: DateTime<Utc>,
) -> EffectiveStatus {
    match event.stored_status {
        StoredStatus::Draft => return EffectiveStatus::Draft,
        StoredStatus::Cancelled => return EffectiveStatus::Cancelled,
        StoredStatus::Completed => return EffectiveStatus::Completed,
        StoredStatus::Published => {}
    }

    if now > event.end_date {
        return EffectiveStatus::Completed;
    }

    if now > event.start_date {
        return EffectiveStatus::Ongoing;
    }

    let capacity_reached = match event.max_participants {
        Some(max) => non_cancelled_count >= max as i64,
        None => false,
    };

    if capacity_reached || now > event.effective_deadline() {
        return EffectiveStatus::RegistrationClosed;
    }

    EffectiveStatus::RegistrationOpen
}

/// Resolves effective status against the live store
#[derive(Debug, Clone)]
pub struct StatusService {
    db: DatabaseService,
}

impl StatusService {
    pub fn new(db: DatabaseService) -> Self {
        Self { db }
    }

    /// Effective status of an event, computed from a fresh registration
    /// count read at call time
    pub async fn resolve(&self, event_id: i64) -> Result<EffectiveStatus> {
        let event = self
            .db
            .events
            .find_by_id(event_id)
            .await?
            .ok_or(EventraError::EventNotFound { event_id })?;

        let count = self.db.registrations.count_non_cancelled(event_id).await?;
        let status = effective_status(&event, count, Utc::now());

        debug!(event_id = event_id, count = count, status = %status, "Resolved effective status");
        Ok(status)
    }
}
