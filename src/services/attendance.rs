//! Attendance marking
//!
//! Organizers record who showed up. Non-admins must act before the event
//! ends; admins keep a configurable grace window after the end date.

use chrono::{DateTime, Duration, Utc};
use tracing::info;

use crate::config::settings::Settings;
use crate::database::DatabaseService;
use crate::models::actor::Actor;
use crate::models::registration::{Registration, RegistrationStatus};
use crate::services::auth::AuthService;
use crate::services::cache::CacheService;
use crate::utils::errors::{EventraError, Result};

/// End of the attendance-marking window for an actor
pub(crate) fn attendance_window_end(
    event_end: DateTime<Utc>,
    is_admin: bool,
    grace_days: i64,
) -> DateTime<Utc> {
    if is_admin {
        event_end + Duration::days(grace_days)
    } else {
        event_end
    }
}

/// Attendance service
#[derive(Clone)]
pub struct AttendanceService {
    db: DatabaseService,
    cache: CacheService,
    auth: AuthService,
    settings: Settings,
}

impl AttendanceService {
    /// Create a new AttendanceService instance
    pub fn new(
        db: DatabaseService,
        cache: CacheService,
        auth: AuthService,
        settings: Settings,
    ) -> Self {
        Self {
            db,
            cache,
            auth,
            settings,
        }
    }

    /// Mark a registration ATTENDED or NO_SHOW.
    ///
    /// Only the event organizer or an admin may mark attendance, and only
    /// for registrations currently holding a slot as CONFIRMED or PENDING.
    pub async fn mark_attendance(
        &self,
        actor: &Actor,
        registration_id: i64,
        attended: bool,
    ) -> Result<Registration> {
        let now = Utc::now();

        let registration = self
            .db
            .registrations
            .find_by_id(registration_id)
            .await?
            .ok_or(EventraError::RegistrationNotFound { registration_id })?;

        let event = self
            .db
            .events
            .find_by_id(registration.event_id)
            .await?
            .ok_or(EventraError::EventNotFound {
                event_id: registration.event_id,
            })?;

        self.auth.require_event_manager(actor, &event)?;

        let window_end = attendance_window_end(
            event.end_date,
            self.auth.is_admin(actor),
            self.settings.registration.attendance_grace_days,
        );
        if now > window_end {
            return Err(EventraError::WindowExpired { window_end });
        }

        if !matches!(
            registration.status,
            RegistrationStatus::Confirmed | RegistrationStatus::Pending
        ) {
            return Err(EventraError::TerminalState {
                status: registration.status,
            });
        }

        let target = if attended {
            RegistrationStatus::Attended
        } else {
            RegistrationStatus::NoShow
        };

        // The update re-checks the current status, so a concurrent
        // transition surfaces as a conflict instead of being overwritten
        let updated = self
            .db
            .registrations
            .mark_attendance(registration_id, target)
            .await?
            .ok_or(EventraError::StoreConflict)?;

        info!(
            registration_id = registration_id,
            event_id = event.id,
            acting_user_id = actor.user_id,
            status = %updated.status,
            "Attendance recorded"
        );

        if let Err(e) = self.cache.invalidate_event(event.id).await {
            tracing::warn!(event_id = event.id, error = %e, "Event cache invalidation failed");
        }
        if let Err(e) = self.cache.invalidate_user(updated.user_id).await {
            tracing::warn!(user_id = updated.user_id, error = %e, "User cache invalidation failed");
        }

        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_non_admin_window_ends_with_event() {
        let end = Utc::now();
        assert_eq!(attendance_window_end(end, false, 3), end);
    }

    #[test]
    fn test_admin_window_extends_by_grace_days() {
        let end = Utc::now();
        assert_eq!(attendance_window_end(end, true, 3), end + Duration::days(3));
    }

    #[test]
    fn test_admin_two_days_after_end_is_inside_window() {
        // Admin marks attendance two days late: allowed. A non-admin at the
        // same moment is past their window.
        let end = Utc::now() - Duration::days(2);
        let now = Utc::now();

        assert!(now <= attendance_window_end(end, true, 3));
        assert!(now > attendance_window_end(end, false, 3));
    }
}
