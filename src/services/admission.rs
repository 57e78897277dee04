//! Registration admission
//!
//! Admission decides CONFIRMED vs WAITLIST vs rejection and inserts the
//! registration row. The capacity check and the insert run as one unit
//! under the per-event row lock, so concurrent admissions for the last
//! slot serialize instead of both observing a free slot.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::config::settings::Settings;
use crate::database::DatabaseService;
use crate::models::actor::Actor;
use crate::models::event::{Event, EventType, StoredStatus};
use crate::models::registration::{
    CreateRegistrationRequest, PaymentStatus, Registration, RegistrationStatus, RegistrationType,
};
use crate::services::cache::CacheService;
use crate::services::membership::MembershipService;
use crate::services::notification::{NotificationKind, NotificationService};
use crate::utils::errors::{EventraError, Result};

/// Decide the admission outcome for an event snapshot and a fresh
/// slot-consuming count. First failing check wins; the caller re-runs this
/// under the event lock so the count cannot move before the insert.
pub(crate) fn decide_admission(
    event: &Event,
    slot_count: i64,
    wants_waitlist: bool,
    now: DateTime<Utc>,
) -> Result<RegistrationStatus> {
    if event.stored_status != StoredStatus::Published {
        return Err(EventraError::RegistrationNotOpen {
            status: event.stored_status,
        });
    }

    let deadline = event.effective_deadline();
    if now > deadline {
        return Err(EventraError::DeadlinePassed { deadline });
    }

    let is_full = match event.max_participants {
        Some(max) => slot_count >= max as i64,
        None => false,
    };

    if is_full && !wants_waitlist {
        return Err(EventraError::EventFull { event_id: event.id });
    }

    Ok(if is_full {
        RegistrationStatus::Waitlist
    } else {
        RegistrationStatus::Confirmed
    })
}

/// Price selection: free events cost nothing; members get the member price
/// when one is set; a paid event without any price resolves to zero.
pub(crate) fn amount_due_cents(event: &Event, membership_verified: bool) -> i64 {
    if event.event_type == EventType::Free {
        return 0;
    }

    if membership_verified {
        if let Some(member_price) = event.member_price_cents {
            return member_price;
        }
    }

    event.price_cents.unwrap_or(0)
}

/// Admission service: creates registrations under the capacity gate
#[derive(Clone)]
pub struct AdmissionService {
    db: DatabaseService,
    cache: CacheService,
    membership: MembershipService,
    notifications: NotificationService,
    settings: Settings,
}

impl AdmissionService {
    /// Create a new AdmissionService instance
    pub fn new(
        db: DatabaseService,
        cache: CacheService,
        membership: MembershipService,
        notifications: NotificationService,
        settings: Settings,
    ) -> Self {
        Self {
            db,
            cache,
            membership,
            notifications,
            settings,
        }
    }

    /// Attempt to register the acting user for an event.
    ///
    /// Returns the created registration (CONFIRMED or WAITLIST) or a typed
    /// rejection. Transient store conflicts are retried a bounded number of
    /// times; a lost uniqueness race surfaces as `DuplicateActive`.
    pub async fn admit(
        &self,
        actor: &Actor,
        event_id: i64,
        wants_waitlist: bool,
    ) -> Result<Registration> {
        debug!(
            user_id = actor.user_id,
            event_id = event_id,
            wants_waitlist = wants_waitlist,
            "Admission attempt"
        );

        // An existing confirmed or pending registration rejects up front,
        // with a status-specific message
        if let Some(existing) = self
            .db
            .registrations
            .find_active(event_id, actor.user_id)
            .await?
        {
            if matches!(
                existing.status,
                RegistrationStatus::Confirmed | RegistrationStatus::Pending
            ) {
                return Err(EventraError::DuplicateActive {
                    status: existing.status,
                });
            }
        }

        // Plain read for existence and pricing inputs; the authoritative
        // snapshot is re-read under the lock inside the transaction
        let event = self
            .db
            .events
            .find_by_id(event_id)
            .await?
            .ok_or(EventraError::EventNotFound { event_id })?;

        // Membership is resolved outside the transaction so the event lock
        // never waits on an HTTP call
        let membership_verified = if event.event_type == EventType::Paid {
            self.membership.verified_for_pricing(actor.user_id).await
        } else {
            false
        };

        let mut attempt = 0;
        let registration = loop {
            attempt += 1;
            match self
                .try_admit(actor, event_id, wants_waitlist, membership_verified)
                .await
            {
                Ok(registration) => break registration,
                Err(e) if e.is_unique_violation() => {
                    // Lost the race against another admission for the same
                    // (user, event) pair
                    let status = self
                        .db
                        .registrations
                        .find_active(event_id, actor.user_id)
                        .await?
                        .map(|r| r.status);
                    return Err(match status {
                        Some(status) => EventraError::DuplicateActive { status },
                        None => EventraError::StoreConflict,
                    });
                }
                Err(e) if e.is_store_conflict() => {
                    if attempt >= self.settings.registration.max_conflict_retries {
                        warn!(
                            user_id = actor.user_id,
                            event_id = event_id,
                            attempts = attempt,
                            "Admission retries exhausted"
                        );
                        return Err(EventraError::StoreConflict);
                    }
                    debug!(
                        user_id = actor.user_id,
                        event_id = event_id,
                        attempt = attempt,
                        "Store conflict during admission, retrying"
                    );
                }
                Err(e) => return Err(e),
            }
        };

        self.invalidate_views(event_id, actor.user_id).await;
        self.notify_admission(&event, &registration).await;

        crate::utils::logging::log_admission(
            actor.user_id,
            event_id,
            &registration.status.to_string(),
            None,
        );
        Ok(registration)
    }

    /// One admission transaction: lock the event row, count, decide, insert
    async fn try_admit(
        &self,
        actor: &Actor,
        event_id: i64,
        wants_waitlist: bool,
        membership_verified: bool,
    ) -> Result<Registration> {
        let now = Utc::now();
        let mut tx = self.db.begin().await?;

        let event = self
            .db
            .events
            .find_by_id_for_update(&mut tx, event_id)
            .await?
            .ok_or(EventraError::EventNotFound { event_id })?;

        let slot_count = self
            .db
            .registrations
            .count_slot_consuming_in_tx(&mut tx, event_id)
            .await?;

        let status = decide_admission(&event, slot_count, wants_waitlist, now)?;

        let amount_due_cents = amount_due_cents(&event, membership_verified);
        let payment_required = amount_due_cents > 0;
        let registration_type = if actor.user_id == event.organizer_id {
            RegistrationType::Organizer
        } else {
            RegistrationType::Regular
        };

        let request = CreateRegistrationRequest {
            event_id,
            user_id: actor.user_id,
            status,
            registration_type,
            payment_required,
            payment_status: if payment_required {
                PaymentStatus::Pending
            } else {
                PaymentStatus::Completed
            },
            amount_due_cents,
            currency: event.currency.clone(),
        };

        let registration = self.db.registrations.insert_in_tx(&mut tx, request, now).await?;
        tx.commit().await?;

        Ok(registration)
    }

    /// Record a payment outcome reported by the external payment service.
    /// Payment capture itself is not modeled here.
    pub async fn record_payment_outcome(
        &self,
        registration_id: i64,
        payment_status: PaymentStatus,
    ) -> Result<Registration> {
        let updated = self
            .db
            .registrations
            .update_payment_status(registration_id, payment_status)
            .await?
            .ok_or(EventraError::RegistrationNotFound { registration_id })?;

        self.invalidate_views(updated.event_id, updated.user_id).await;

        info!(
            registration_id = registration_id,
            payment_status = ?payment_status,
            "Payment outcome recorded"
        );
        Ok(updated)
    }

    /// Evict registration-derived views. The write is already committed;
    /// cache trouble is logged and never fails the admission.
    async fn invalidate_views(&self, event_id: i64, user_id: i64) {
        if let Err(e) = self.cache.invalidate_event(event_id).await {
            warn!(event_id = event_id, error = %e, "Event cache invalidation failed");
        }
        if let Err(e) = self.cache.invalidate_user(user_id).await {
            warn!(user_id = user_id, error = %e, "User cache invalidation failed");
        }
    }

    async fn notify_admission(&self, event: &Event, registration: &Registration) {
        let kind = match registration.status {
            RegistrationStatus::Waitlist => NotificationKind::RegistrationWaitlisted,
            _ => NotificationKind::RegistrationConfirmed,
        };

        let mut parameters = HashMap::new();
        parameters.insert("event_title".to_string(), event.title.clone());
        parameters.insert(
            "event_date".to_string(),
            event.start_date.format("%Y-%m-%d %H:%M UTC").to_string(),
        );

        self.notifications
            .notify(registration.user_id, kind, &parameters)
            .await;
    }
}
