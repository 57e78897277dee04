//! Registration model
//!
//! A registration is one row per successful admission attempt. Rows are
//! historical: cancellation flips status, it never deletes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Registration state machine states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "registration_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum RegistrationStatus {
    Pending,
    Confirmed,
    Waitlist,
    Cancelled,
    Attended,
    NoShow,
}

impl RegistrationStatus {
    /// Whether a registration in this state consumes a capacity slot.
    /// Waitlisted and cancelled rows never do.
    pub fn consumes_slot(&self) -> bool {
        matches!(
            self,
            RegistrationStatus::Pending
                | RegistrationStatus::Confirmed
                | RegistrationStatus::Attended
                | RegistrationStatus::NoShow
        )
    }

    /// Whether this state counts toward the one-active-per-(user, event)
    /// uniqueness rule
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            RegistrationStatus::Pending
                | RegistrationStatus::Confirmed
                | RegistrationStatus::Waitlist
        )
    }

    /// Terminal states admit no further transitions
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RegistrationStatus::Cancelled
                | RegistrationStatus::Attended
                | RegistrationStatus::NoShow
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "registration_type", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum RegistrationType {
    Regular,
    Vip,
    Organizer,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "payment_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Processing,
    Completed,
    Failed,
    Refunded,
    Cancelled,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Registration {
    pub id: i64,
    pub event_id: i64,
    pub user_id: i64,
    pub status: RegistrationStatus,
    pub registration_type: RegistrationType,
    pub payment_required: bool,
    pub payment_status: PaymentStatus,
    pub amount_due_cents: i64,
    pub currency: String,
    pub registered_at: DateTime<Utc>,
    pub confirmed_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateRegistrationRequest {
    pub event_id: i64,
    pub user_id: i64,
    pub status: RegistrationStatus,
    pub registration_type: RegistrationType,
    pub payment_required: bool,
    pub payment_status: PaymentStatus,
    pub amount_due_cents: i64,
    pub currency: String,
}

impl std::fmt::Display for RegistrationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            RegistrationStatus::Pending => "pending",
            RegistrationStatus::Confirmed => "confirmed",
            RegistrationStatus::Waitlist => "waitlist",
            RegistrationStatus::Cancelled => "cancelled",
            RegistrationStatus::Attended => "attended",
            RegistrationStatus::NoShow => "no_show",
        };
        write!(f, "{}", s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slot_consumption_matches_capacity_rule() {
        assert!(RegistrationStatus::Pending.consumes_slot());
        assert!(RegistrationStatus::Confirmed.consumes_slot());
        assert!(RegistrationStatus::Attended.consumes_slot());
        assert!(RegistrationStatus::NoShow.consumes_slot());

        assert!(!RegistrationStatus::Waitlist.consumes_slot());
        assert!(!RegistrationStatus::Cancelled.consumes_slot());
    }

    #[test]
    fn test_active_states_match_uniqueness_rule() {
        assert!(RegistrationStatus::Pending.is_active());
        assert!(RegistrationStatus::Confirmed.is_active());
        assert!(RegistrationStatus::Waitlist.is_active());

        assert!(!RegistrationStatus::Cancelled.is_active());
        assert!(!RegistrationStatus::Attended.is_active());
        assert!(!RegistrationStatus::NoShow.is_active());
    }

    #[test]
    fn test_terminal_states() {
        assert!(RegistrationStatus::Cancelled.is_terminal());
        assert!(RegistrationStatus::Attended.is_terminal());
        assert!(RegistrationStatus::NoShow.is_terminal());
        assert!(!RegistrationStatus::Waitlist.is_terminal());
    }
}
