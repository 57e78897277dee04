//! Registration cancellation and waitlist promotion
//!
//! Cancellation is the primary, durable effect and commits on its own.
//! Promotion of the oldest waitlisted registration runs right after in a
//! separate transaction under the event row lock; a promotion failure is
//! logged and retried by the reconciliation sweep, never rolled into the
//! cancellation result.

use std::collections::HashMap;

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::database::DatabaseService;
use crate::models::actor::Actor;
use crate::models::registration::{Registration, RegistrationStatus};
use crate::services::auth::AuthService;
use crate::services::cache::CacheService;
use crate::services::notification::{NotificationKind, NotificationService};
use crate::utils::errors::{EventraError, Result};

/// Cancellation and promotion service
#[derive(Clone)]
pub struct CancellationService {
    db: DatabaseService,
    cache: CacheService,
    auth: AuthService,
    notifications: NotificationService,
}

impl CancellationService {
    /// Create a new CancellationService instance
    pub fn new(
        db: DatabaseService,
        cache: CacheService,
        auth: AuthService,
        notifications: NotificationService,
    ) -> Self {
        Self {
            db,
            cache,
            auth,
            notifications,
        }
    }

    /// Cancel a registration on behalf of its owner, the event organizer or
    /// an admin. Returns the cancelled registration; if it held a slot, the
    /// oldest waitlisted registration is promoted best-effort.
    pub async fn cancel(&self, actor: &Actor, registration_id: i64) -> Result<Registration> {
        let now = Utc::now();
        let mut tx = self.db.begin().await?;

        let registration = self
            .db
            .registrations
            .find_by_id_for_update(&mut tx, registration_id)
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

        self.auth
            .require_cancellation_rights(actor, &registration, &event)?;

        match registration.status {
            RegistrationStatus::Cancelled => {
                return Err(EventraError::AlreadyCancelled { registration_id });
            }
            RegistrationStatus::Attended | RegistrationStatus::NoShow => {
                return Err(EventraError::TerminalState {
                    status: registration.status,
                });
            }
            _ => {}
        }

        let freed_slot = registration.status.consumes_slot();
        let cancelled = self
            .db
            .registrations
            .mark_cancelled_in_tx(&mut tx, registration_id, now)
            .await?;
        tx.commit().await?;

        info!(
            registration_id = registration_id,
            event_id = event.id,
            acting_user_id = actor.user_id,
            freed_slot = freed_slot,
            "Registration cancelled"
        );

        // Promotion is best-effort: the cancellation above is already
        // durable, the reconciliation sweep picks up anything missed here
        if freed_slot {
            if let Err(e) = self.promote_next(event.id).await {
                warn!(event_id = event.id, error = %e, "Waitlist promotion failed after cancellation");
            }
        }

        self.invalidate_views(event.id, cancelled.user_id).await;
        self.notify_cancelled(&event.title, &cancelled).await;

        Ok(cancelled)
    }

    /// Promote the oldest waitlisted registration of an event into a free
    /// slot, if both exist. Runs under the event row lock with a fresh
    /// count, so two concurrent cancellations can never promote the same
    /// row or oversubscribe the event.
    pub async fn promote_next(&self, event_id: i64) -> Result<Option<Registration>> {
        let now = Utc::now();
        let mut tx = self.db.begin().await?;

        let event = self
            .db
            .events
            .find_by_id_for_update(&mut tx, event_id)
            .await?
            .ok_or(EventraError::EventNotFound { event_id })?;

        if let Some(max) = event.max_participants {
            let slot_count = self
                .db
                .registrations
                .count_slot_consuming_in_tx(&mut tx, event_id)
                .await?;
            if slot_count >= max as i64 {
                debug!(event_id = event_id, "No free slot, skipping promotion");
                return Ok(None);
            }
        }

        let Some(oldest) = self
            .db
            .registrations
            .oldest_waitlisted_in_tx(&mut tx, event_id)
            .await?
        else {
            return Ok(None);
        };

        let promoted = self
            .db
            .registrations
            .promote_in_tx(&mut tx, oldest.id, now)
            .await?;
        tx.commit().await?;

        let Some(promoted) = promoted else {
            // The row left the waitlist between the select and the update
            return Ok(None);
        };

        info!(
            registration_id = promoted.id,
            event_id = event_id,
            user_id = promoted.user_id,
            "Waitlisted registration promoted"
        );

        self.invalidate_views(event_id, promoted.user_id).await;
        self.notify_promoted(&event.title, &promoted).await;

        Ok(Some(promoted))
    }

    /// Explicit promotion of a specific waitlisted registration by an admin
    /// or the event organizer, subject to the same capacity gate
    pub async fn promote_registration(
        &self,
        actor: &Actor,
        registration_id: i64,
    ) -> Result<Registration> {
        let now = Utc::now();

        let registration = self
            .db
            .registrations
            .find_by_id(registration_id)
            .await?
            .ok_or(EventraError::RegistrationNotFound { registration_id })?;

        let event_id = registration.event_id;
        let mut tx = self.db.begin().await?;

        // Event lock first, matching every other capacity-affecting path
        let event = self
            .db
            .events
            .find_by_id_for_update(&mut tx, event_id)
            .await?
            .ok_or(EventraError::EventNotFound { event_id })?;

        self.auth.require_event_manager(actor, &event)?;

        let registration = self
            .db
            .registrations
            .find_by_id_for_update(&mut tx, registration_id)
            .await?
            .ok_or(EventraError::RegistrationNotFound { registration_id })?;

        if registration.status != RegistrationStatus::Waitlist {
            return Err(EventraError::InvalidStateTransition {
                from: registration.status.to_string(),
                to: RegistrationStatus::Confirmed.to_string(),
            });
        }

        if let Some(max) = event.max_participants {
            let slot_count = self
                .db
                .registrations
                .count_slot_consuming_in_tx(&mut tx, event_id)
                .await?;
            if slot_count >= max as i64 {
                return Err(EventraError::EventFull { event_id });
            }
        }

        let promoted = self
            .db
            .registrations
            .promote_in_tx(&mut tx, registration_id, now)
            .await?
            .ok_or(EventraError::StoreConflict)?;
        tx.commit().await?;

        info!(
            registration_id = registration_id,
            event_id = event_id,
            acting_user_id = actor.user_id,
            "Registration promoted by event manager"
        );

        self.invalidate_views(event_id, promoted.user_id).await;
        self.notify_promoted(&event.title, &promoted).await;

        Ok(promoted)
    }

    /// Reconciliation sweep: re-scan events that still have waitlisted rows
    /// and promote into any slots freed by paths that missed their
    /// promotion. Idempotent; returns the number of promotions performed.
    pub async fn reconcile_waitlists(&self) -> Result<u64> {
        let event_ids = self.db.registrations.event_ids_with_waitlist().await?;
        let mut promotions = 0u64;

        for event_id in event_ids {
            loop {
                match self.promote_next(event_id).await {
                    Ok(Some(_)) => promotions += 1,
                    Ok(None) => break,
                    Err(e) => {
                        warn!(event_id = event_id, error = %e, "Reconciliation promotion failed");
                        break;
                    }
                }
            }
        }

        if promotions > 0 {
            info!(promotions = promotions, "Waitlist reconciliation promoted registrations");
        }
        Ok(promotions)
    }

    async fn invalidate_views(&self, event_id: i64, user_id: i64) {
        if let Err(e) = self.cache.invalidate_event(event_id).await {
            warn!(event_id = event_id, error = %e, "Event cache invalidation failed");
        }
        if let Err(e) = self.cache.invalidate_user(user_id).await {
            warn!(user_id = user_id, error = %e, "User cache invalidation failed");
        }
    }

    async fn notify_cancelled(&self, event_title: &str, registration: &Registration) {
        let mut parameters = HashMap::new();
        parameters.insert("event_title".to_string(), event_title.to_string());
        self.notifications
            .notify(
                registration.user_id,
                NotificationKind::RegistrationCancelled,
                &parameters,
            )
            .await;
    }

    async fn notify_promoted(&self, event_title: &str, registration: &Registration) {
        let mut parameters = HashMap::new();
        parameters.insert("event_title".to_string(), event_title.to_string());
        self.notifications
            .notify(
                registration.user_id,
                NotificationKind::WaitlistPromoted,
                &parameters,
            )
            .await;
    }
}
