//! Notification service implementation
//!
//! Notifications are fire-and-forget: delivery failures are logged and never
//! fail the operation that triggered them. Actual delivery (email, push) is
//! an external collaborator behind the `Notifier` trait; the default sender
//! only records the message in the log stream.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::join_all;
use tracing::{debug, info, warn};

use crate::config::settings::Settings;
use crate::utils::errors::Result;

/// Events worth telling a user about
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    RegistrationConfirmed,
    RegistrationWaitlisted,
    WaitlistPromoted,
    RegistrationCancelled,
    EventCancelled,
}

impl NotificationKind {
    fn template_key(&self) -> &'static str {
        match self {
            NotificationKind::RegistrationConfirmed => "registration_confirmed",
            NotificationKind::RegistrationWaitlisted => "registration_waitlisted",
            NotificationKind::WaitlistPromoted => "waitlist_promoted",
            NotificationKind::RegistrationCancelled => "registration_cancelled",
            NotificationKind::EventCancelled => "event_cancelled",
        }
    }
}

/// Delivery seam for the external notification collaborator
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn deliver(&self, user_id: i64, message: &str) -> Result<()>;
}

/// Default sender: writes the notification to the log stream
#[derive(Debug, Default)]
pub struct TracingNotifier;

#[async_trait]
impl Notifier for TracingNotifier {
    async fn deliver(&self, user_id: i64, message: &str) -> Result<()> {
        info!(user_id = user_id, message = %message, "Notification delivered");
        Ok(())
    }
}

/// Notification service for message formatting and dispatch
#[derive(Clone)]
pub struct NotificationService {
    sender: Arc<dyn Notifier>,
    templates: HashMap<String, String>,
    enabled: bool,
}

impl NotificationService {
    /// Create a new NotificationService with the default sender
    pub fn new(settings: &Settings) -> Self {
        Self::with_sender(settings, Arc::new(TracingNotifier))
    }

    /// Create a NotificationService with a custom delivery backend
    pub fn with_sender(settings: &Settings, sender: Arc<dyn Notifier>) -> Self {
        Self {
            sender,
            templates: Self::load_default_templates(),
            enabled: settings.features.notifications,
        }
    }

    /// Notify one user. Never fails the caller: delivery errors are logged.
    pub async fn notify(
        &self,
        user_id: i64,
        kind: NotificationKind,
        parameters: &HashMap<String, String>,
    ) {
        if !self.enabled {
            debug!(user_id = user_id, kind = ?kind, "Notifications disabled, skipping");
            return;
        }

        let message = match self.format_message(kind.template_key(), parameters) {
            Ok(message) => message,
            Err(e) => {
                warn!(user_id = user_id, kind = ?kind, error = %e, "Failed to format notification");
                return;
            }
        };

        if let Err(e) = self.sender.deliver(user_id, &message).await {
            warn!(user_id = user_id, kind = ?kind, error = %e, "Failed to deliver notification");
        }
    }

    /// Notify many users at once, e.g. every active registrant of a
    /// cancelled event
    pub async fn notify_many(
        &self,
        user_ids: &[i64],
        kind: NotificationKind,
        parameters: &HashMap<String, String>,
    ) {
        if user_ids.is_empty() {
            return;
        }

        debug!(count = user_ids.len(), kind = ?kind, "Sending bulk notifications");
        join_all(
            user_ids
                .iter()
                .map(|&user_id| self.notify(user_id, kind, parameters)),
        )
        .await;
    }

    /// Format a message using a template and parameters
    fn format_message(
        &self,
        template_key: &str,
        parameters: &HashMap<String, String>,
    ) -> Result<String> {
        let template = self.templates.get(template_key).ok_or_else(|| {
            crate::utils::errors::EventraError::InvalidInput(format!(
                "Template not found: {}",
                template_key
            ))
        })?;

        let mut formatted = template.clone();
        for (key, value) in parameters {
            let placeholder = format!("{{{}}}", key);
            formatted = formatted.replace(&placeholder, value);
        }

        Ok(formatted)
    }

    /// Load default message templates
    fn load_default_templates() -> HashMap<String, String> {
        let mut templates = HashMap::new();

        templates.insert(
            "registration_confirmed".to_string(),
            "Your spot for {event_title} is confirmed. See you on {event_date}!".to_string(),
        );
        templates.insert(
            "registration_waitlisted".to_string(),
            "{event_title} is currently full. You are on the waitlist and will be \
             confirmed automatically when a spot opens up."
                .to_string(),
        );
        templates.insert(
            "waitlist_promoted".to_string(),
            "Good news! A spot opened up for {event_title} and your registration is \
             now confirmed."
                .to_string(),
        );
        templates.insert(
            "registration_cancelled".to_string(),
            "Your registration for {event_title} has been cancelled.".to_string(),
        );
        templates.insert(
            "event_cancelled".to_string(),
            "{event_title} has been cancelled by the organizer. We are sorry!".to_string(),
        );

        templates
    }
}
