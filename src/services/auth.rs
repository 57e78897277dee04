//! Authorization service implementation
//!
//! Identity verification is external; this service only answers role and
//! ownership questions for already-verified actors. Admins come from the
//! actor role or the configured admin id list.

use tracing::debug;

use crate::config::settings::Settings;
use crate::models::actor::Actor;
use crate::models::event::Event;
use crate::models::registration::Registration;
use crate::utils::errors::{EventraError, Result};

/// Authorization service for ownership and role checks
#[derive(Debug, Clone)]
pub struct AuthService {
    settings: Settings,
}

impl AuthService {
    /// Create a new AuthService instance
    pub fn new(settings: Settings) -> Self {
        Self { settings }
    }

    /// Check if the actor has admin rights
    pub fn is_admin(&self, actor: &Actor) -> bool {
        actor.is_admin() || self.settings.service.admin_ids.contains(&actor.user_id)
    }

    /// Check if the actor owns the event
    pub fn is_event_organizer(&self, actor: &Actor, event: &Event) -> bool {
        event.organizer_id == actor.user_id
    }

    /// Check if the actor may manage (edit, publish, cancel) the event
    pub fn can_manage_event(&self, actor: &Actor, event: &Event) -> bool {
        self.is_admin(actor) || self.is_event_organizer(actor, event)
    }

    /// Require event management rights
    pub fn require_event_manager(&self, actor: &Actor, event: &Event) -> Result<()> {
        if self.can_manage_event(actor, event) {
            return Ok(());
        }

        debug!(user_id = actor.user_id, event_id = event.id, "Event management denied");
        Err(EventraError::Forbidden(format!(
            "User {} may not manage event {}",
            actor.user_id, event.id
        )))
    }

    /// Require rights to cancel a registration: the owner, the event's
    /// organizer, or an admin
    pub fn require_cancellation_rights(
        &self,
        actor: &Actor,
        registration: &Registration,
        event: &Event,
    ) -> Result<()> {
        if actor.user_id == registration.user_id || self.can_manage_event(actor, event) {
            return Ok(());
        }

        debug!(
            user_id = actor.user_id,
            registration_id = registration.id,
            "Registration cancellation denied"
        );
        Err(EventraError::Forbidden(format!(
            "User {} may not cancel registration {}",
            actor.user_id, registration.id
        )))
    }

    /// Require admin rights
    pub fn require_admin(&self, actor: &Actor) -> Result<()> {
        if self.is_admin(actor) {
            return Ok(());
        }

        Err(EventraError::Forbidden(format!(
            "User {} lacks admin rights",
            actor.user_id
        )))
    }
}
