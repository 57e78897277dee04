//! Event lifecycle service implementation
//!
//! This service handles event creation, updates, publishing, cancellation
//! and deletion, the cached display reads, and the sweep marking past
//! published events completed.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::config::settings::Settings;
use crate::database::DatabaseService;
use crate::models::actor::{Actor, Role};
use crate::models::event::{CreateEventRequest, Event, UpdateEventRequest};
use crate::models::registration::Registration;
use crate::services::auth::AuthService;
use crate::services::cache::CacheService;
use crate::services::notification::{NotificationKind, NotificationService};
use crate::utils::errors::{EventraError, Result};

const DEFAULT_UPCOMING_LIMIT: i64 = 50;

/// Schedule sanity shared by create and update paths
pub(crate) fn validate_schedule(
    start_date: DateTime<Utc>,
    end_date: DateTime<Utc>,
    registration_deadline: Option<DateTime<Utc>>,
) -> Result<()> {
    if end_date <= start_date {
        return Err(EventraError::InvalidInput(
            "Event end date must be after its start date".to_string(),
        ));
    }

    if let Some(deadline) = registration_deadline {
        if deadline >= start_date {
            return Err(EventraError::InvalidInput(
                "Registration deadline must be before the event start".to_string(),
            ));
        }
    }

    Ok(())
}

/// Event lifecycle service
#[derive(Clone)]
pub struct EventService {
    db: DatabaseService,
    cache: CacheService,
    auth: AuthService,
    notifications: NotificationService,
    settings: Settings,
}

impl EventService {
    /// Create a new EventService instance
    pub fn new(
        db: DatabaseService,
        cache: CacheService,
        auth: AuthService,
        notifications: NotificationService,
        settings: Settings,
    ) -> Self {
        Self {
            db,
            cache,
            auth,
            notifications,
            settings,
        }
    }

    /// Create a new event in draft state, owned by the acting organizer
    pub async fn create_event(&self, actor: &Actor, request: CreateEventRequest) -> Result<Event> {
        if actor.role != Role::Organizer && !self.auth.is_admin(actor) {
            return Err(EventraError::Forbidden(format!(
                "User {} may not create events",
                actor.user_id
            )));
        }

        if request.organizer_id != actor.user_id && !self.auth.is_admin(actor) {
            return Err(EventraError::Forbidden(
                "Only admins may create events for another organizer".to_string(),
            ));
        }

        validate_schedule(
            request.start_date,
            request.end_date,
            request.registration_deadline,
        )?;

        if matches!(request.max_participants, Some(max) if max <= 0) {
            return Err(EventraError::InvalidInput(
                "Max participants must be positive".to_string(),
            ));
        }

        if request.price_cents.map_or(false, |p| p < 0)
            || request.member_price_cents.map_or(false, |p| p < 0)
        {
            return Err(EventraError::InvalidInput(
                "Prices cannot be negative".to_string(),
            ));
        }

        let mut request = request;
        if request.currency.is_none() {
            request.currency = Some(self.settings.service.default_currency.clone());
        }

        let event = self.db.events.create(request).await?;
        info!(event_id = event.id, organizer_id = event.organizer_id, "Event created");

        Ok(event)
    }

    /// Update event fields. Capacity may not drop below the current
    /// slot-consuming count, checked under the event lock.
    pub async fn update_event(
        &self,
        actor: &Actor,
        event_id: i64,
        request: UpdateEventRequest,
    ) -> Result<Event> {
        let mut tx = self.db.begin().await?;

        let event = self
            .db
            .events
            .find_by_id_for_update(&mut tx, event_id)
            .await?
            .ok_or(EventraError::EventNotFound { event_id })?;

        self.auth.require_event_manager(actor, &event)?;

        validate_schedule(
            request.start_date.unwrap_or(event.start_date),
            request.end_date.unwrap_or(event.end_date),
            request.registration_deadline.or(event.registration_deadline),
        )?;

        if let Some(new_max) = request.max_participants {
            if new_max <= 0 {
                return Err(EventraError::InvalidInput(
                    "Max participants must be positive".to_string(),
                ));
            }

            let slot_count = self
                .db
                .registrations
                .count_slot_consuming_in_tx(&mut tx, event_id)
                .await?;
            if (new_max as i64) < slot_count {
                return Err(EventraError::InvalidInput(format!(
                    "Capacity {} is below the {} registrations already holding a slot",
                    new_max, slot_count
                )));
            }
        }

        let updated = self.db.events.update_in_tx(&mut tx, event_id, request).await?;
        tx.commit().await?;

        self.invalidate_event_views(event_id).await;
        info!(event_id = event_id, acting_user_id = actor.user_id, "Event updated");

        Ok(updated)
    }

    /// Publish a draft event. One-way; only draft events can be published.
    pub async fn publish_event(&self, actor: &Actor, event_id: i64) -> Result<Event> {
        let event = self
            .db
            .events
            .find_by_id(event_id)
            .await?
            .ok_or(EventraError::EventNotFound { event_id })?;

        self.auth.require_event_manager(actor, &event)?;

        let published = self.db.events.publish(event_id).await?.ok_or_else(|| {
            EventraError::InvalidStateTransition {
                from: event.stored_status.to_string(),
                to: "published".to_string(),
            }
        })?;

        self.invalidate_event_views(event_id).await;
        info!(event_id = event_id, acting_user_id = actor.user_id, "Event published");

        Ok(published)
    }

    /// Cancel an event and notify everyone holding an active registration
    pub async fn cancel_event(&self, actor: &Actor, event_id: i64) -> Result<Event> {
        let event = self
            .db
            .events
            .find_by_id(event_id)
            .await?
            .ok_or(EventraError::EventNotFound { event_id })?;

        self.auth.require_event_manager(actor, &event)?;

        let cancelled = self.db.events.cancel(event_id).await?.ok_or_else(|| {
            EventraError::InvalidStateTransition {
                from: event.stored_status.to_string(),
                to: "cancelled".to_string(),
            }
        })?;

        info!(event_id = event_id, acting_user_id = actor.user_id, "Event cancelled");

        let user_ids = self
            .db
            .registrations
            .active_user_ids_for_event(event_id)
            .await
            .unwrap_or_else(|e| {
                warn!(event_id = event_id, error = %e, "Could not load registrants for notification");
                Vec::new()
            });

        self.invalidate_event_views(event_id).await;
        for user_id in &user_ids {
            if let Err(e) = self.cache.invalidate_user(*user_id).await {
                warn!(user_id = user_id, error = %e, "User cache invalidation failed");
            }
        }

        let mut parameters = HashMap::new();
        parameters.insert("event_title".to_string(), cancelled.title.clone());
        self.notifications
            .notify_many(&user_ids, NotificationKind::EventCancelled, &parameters)
            .await;

        Ok(cancelled)
    }

    /// Delete an event. Non-admins may only delete events without active
    /// registrations; registrations cascade with the event row.
    pub async fn delete_event(&self, actor: &Actor, event_id: i64) -> Result<()> {
        let event = self
            .db
            .events
            .find_by_id(event_id)
            .await?
            .ok_or(EventraError::EventNotFound { event_id })?;

        self.auth.require_event_manager(actor, &event)?;

        if !self.auth.is_admin(actor) {
            let active = self
                .db
                .registrations
                .count_active_for_event(event_id)
                .await?;
            if active > 0 {
                return Err(EventraError::Forbidden(format!(
                    "Event {} still has {} active registrations",
                    event_id, active
                )));
            }
        }

        let user_ids = self
            .db
            .registrations
            .active_user_ids_for_event(event_id)
            .await
            .unwrap_or_default();

        if self.auth.is_admin(actor) && !user_ids.is_empty() {
            crate::utils::logging::log_admin_action(
                actor.user_id,
                "delete_event_with_registrations",
                Some(&event_id.to_string()),
            );
        }

        self.db.events.delete(event_id).await?;

        self.invalidate_event_views(event_id).await;
        for user_id in user_ids {
            if let Err(e) = self.cache.invalidate_user(user_id).await {
                warn!(user_id = user_id, error = %e, "User cache invalidation failed");
            }
        }

        info!(event_id = event_id, acting_user_id = actor.user_id, "Event deleted");
        Ok(())
    }

    /// Get an event, bypassing the cache
    pub async fn get_event(&self, event_id: i64) -> Result<Event> {
        self.db
            .events
            .find_by_id(event_id)
            .await?
            .ok_or(EventraError::EventNotFound { event_id })
    }

    /// Display read of an event, served from cache when possible
    pub async fn get_event_cached(&self, event_id: i64) -> Result<Event> {
        let key = CacheService::event_key(event_id);
        match self.cache.get::<Event>(&key).await {
            Ok(Some(event)) => return Ok(event),
            Ok(None) => {}
            Err(e) => debug!(event_id = event_id, error = %e, "Cache read failed"),
        }

        let event = self.get_event(event_id).await?;
        if let Err(e) = self.cache.set(&key, &event, None).await {
            debug!(event_id = event_id, error = %e, "Cache write failed");
        }

        Ok(event)
    }

    /// Display listing of upcoming published events, cached with TTL
    pub async fn list_upcoming(&self, limit: Option<i64>) -> Result<Vec<Event>> {
        let limit = limit.unwrap_or(DEFAULT_UPCOMING_LIMIT);
        let key = CacheService::upcoming_key(limit);

        match self.cache.get::<Vec<Event>>(&key).await {
            Ok(Some(events)) => return Ok(events),
            Ok(None) => {}
            Err(e) => debug!(error = %e, "Cache read failed"),
        }

        let events = self.db.events.list_upcoming(limit).await?;
        if let Err(e) = self.cache.set(&key, &events, None).await {
            debug!(error = %e, "Cache write failed");
        }

        Ok(events)
    }

    /// Registrations of one event, for its organizer or an admin
    pub async fn list_event_registrations(
        &self,
        actor: &Actor,
        event_id: i64,
    ) -> Result<Vec<Registration>> {
        let event = self.get_event(event_id).await?;
        self.auth.require_event_manager(actor, &event)?;

        self.db.registrations.list_for_event(event_id).await
    }

    /// Override a registration's type, e.g. tagging a VIP. Status is not
    /// touched; type is a non-status field event managers may edit.
    pub async fn set_registration_type(
        &self,
        actor: &Actor,
        registration_id: i64,
        registration_type: crate::models::registration::RegistrationType,
    ) -> Result<Registration> {
        let registration = self
            .db
            .registrations
            .find_by_id(registration_id)
            .await?
            .ok_or(EventraError::RegistrationNotFound { registration_id })?;

        let event = self.get_event(registration.event_id).await?;
        self.auth.require_event_manager(actor, &event)?;

        let updated = self
            .db
            .registrations
            .update_registration_type(registration_id, registration_type)
            .await?
            .ok_or(EventraError::RegistrationNotFound { registration_id })?;

        self.invalidate_event_views(event.id).await;
        if let Err(e) = self.cache.invalidate_user(updated.user_id).await {
            warn!(user_id = updated.user_id, error = %e, "User cache invalidation failed");
        }

        info!(
            registration_id = registration_id,
            registration_type = ?registration_type,
            acting_user_id = actor.user_id,
            "Registration type updated"
        );
        Ok(updated)
    }

    /// A user's own registrations ("my registrations" view), cached per user
    pub async fn list_user_registrations(
        &self,
        actor: &Actor,
        user_id: i64,
    ) -> Result<Vec<Registration>> {
        if actor.user_id != user_id && !self.auth.is_admin(actor) {
            return Err(EventraError::Forbidden(format!(
                "User {} may not view registrations of user {}",
                actor.user_id, user_id
            )));
        }

        let key = CacheService::user_registrations_key(user_id);
        match self.cache.get::<Vec<Registration>>(&key).await {
            Ok(Some(registrations)) => return Ok(registrations),
            Ok(None) => {}
            Err(e) => debug!(user_id = user_id, error = %e, "Cache read failed"),
        }

        let registrations = self.db.registrations.list_for_user(user_id).await?;
        if let Err(e) = self.cache.set(&key, &registrations, None).await {
            debug!(user_id = user_id, error = %e, "Cache write failed");
        }

        Ok(registrations)
    }

    /// Completion sweep: mark published events whose end date has passed as
    /// completed. Compare-and-set per event keeps this idempotent under
    /// concurrent sweeps.
    pub async fn complete_past_events(&self, now: DateTime<Utc>) -> Result<u64> {
        let ids = self.db.events.events_needing_completion(now).await?;
        let mut completed = 0u64;

        for event_id in ids {
            if self.db.events.mark_completed(event_id, now).await? {
                self.invalidate_event_views(event_id).await;
                completed += 1;
            }
        }

        if completed > 0 {
            info!(completed = completed, "Completion sweep marked past events completed");
        }
        Ok(completed)
    }

    async fn invalidate_event_views(&self, event_id: i64) {
        if let Err(e) = self.cache.invalidate_event(event_id).await {
            warn!(event_id = event_id, error = %e, "Event cache invalidation failed");
        }
    }
}
