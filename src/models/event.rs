//! Event model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Persisted, organizer/admin-controlled event state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "stored_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum StoredStatus {
    Draft,
    Published,
    Cancelled,
    Completed,
}

/// Event status as computed at read time from stored status, dates and
/// live registration counts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EffectiveStatus {
    Draft,
    Cancelled,
    Completed,
    Ongoing,
    RegistrationClosed,
    RegistrationOpen,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "event_type", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    Free,
    Paid,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Event {
    pub id: i64,
    pub title: String,
    pub description: Option<String>,
    pub location: Option<String>,
    pub stored_status: StoredStatus,
    pub event_type: EventType,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub registration_deadline: Option<DateTime<Utc>>,
    pub max_participants: Option<i32>,
    pub price_cents: Option<i64>,
    pub member_price_cents: Option<i64>,
    pub currency: String,
    pub organizer_id: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Event {
    /// Whether the event has no capacity limit
    pub fn is_unlimited(&self) -> bool {
        self.max_participants.is_none()
    }

    /// Registration deadline, defaulting to the start date when absent
    pub fn effective_deadline(&self) -> DateTime<Utc> {
        self.registration_deadline.unwrap_or(self.start_date)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateEventRequest {
    pub title: String,
    pub description: Option<String>,
    pub location: Option<String>,
    pub event_type: EventType,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub registration_deadline: Option<DateTime<Utc>>,
    pub max_participants: Option<i32>,
    pub price_cents: Option<i64>,
    pub member_price_cents: Option<i64>,
    pub currency: Option<String>,
    pub organizer_id: i64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateEventRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub location: Option<String>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub registration_deadline: Option<DateTime<Utc>>,
    pub max_participants: Option<i32>,
    pub price_cents: Option<i64>,
    pub member_price_cents: Option<i64>,
}

impl std::fmt::Display for StoredStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            StoredStatus::Draft => "draft",
            StoredStatus::Published => "published",
            StoredStatus::Cancelled => "cancelled",
            StoredStatus::Completed => "completed",
        };
        write!(f, "{}", s)
    }
}

impl std::fmt::Display for EffectiveStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            EffectiveStatus::Draft => "draft",
            EffectiveStatus::Cancelled => "cancelled",
            EffectiveStatus::Completed => "completed",
            EffectiveStatus::Ongoing => "ongoing",
            EffectiveStatus::RegistrationClosed => "registration_closed",
            EffectiveStatus::RegistrationOpen => "registration_open",
        };
        write!(f, "{}", s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample_event(deadline: Option<DateTime<Utc>>) -> Event {
        let start = Utc.with_ymd_and_hms(2026, 9, 1, 18, 0, 0).unwrap();
        Event {
            id: 1,
            title: "Lindy Hop Social".to_string(),
            description: None,
            location: None,
            stored_status: StoredStatus::Published,
            event_type: EventType::Free,
            start_date: start,
            end_date: start + chrono::Duration::hours(4),
            registration_deadline: deadline,
            max_participants: Some(20),
            price_cents: None,
            member_price_cents: None,
            currency: "EUR".to_string(),
            organizer_id: 42,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_effective_deadline_defaults_to_start_date() {
        let event = sample_event(None);
        assert_eq!(event.effective_deadline(), event.start_date);

        let explicit = event.start_date - chrono::Duration::days(1);
        let event = sample_event(Some(explicit));
        assert_eq!(event.effective_deadline(), explicit);
    }

    #[test]
    fn test_unlimited_when_max_participants_absent() {
        let mut event = sample_event(None);
        assert!(!event.is_unlimited());
        event.max_participants = None;
        assert!(event.is_unlimited());
    }
}
