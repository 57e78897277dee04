//! Error handling for Eventra
//!
//! This module defines the main error types used throughout the application
//! and provides a unified error handling strategy. Business-rule rejections
//! are typed so callers can offer the right next action; infrastructure
//! failures carry their source error.

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::models::event::StoredStatus;
use crate::models::registration::RegistrationStatus;

/// Main error type for the Eventra application
#[derive(Error, Debug)]
pub enum EventraError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Database migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Membership API error: {0}")]
    Membership(#[from] MembershipError),

    #[error("Event not found: {event_id}")]
    EventNotFound { event_id: i64 },

    #[error("Registration not found: {registration_id}")]
    RegistrationNotFound { registration_id: i64 },

    #[error("Permission denied: {0}")]
    Forbidden(String),

    #[error("User already has a {status} registration for this event")]
    DuplicateActive { status: RegistrationStatus },

    #[error("Event is not open for registration (stored status: {status})")]
    RegistrationNotOpen { status: StoredStatus },

    #[error("Registration deadline passed at {deadline}")]
    DeadlinePassed { deadline: DateTime<Utc> },

    #[error("Event {event_id} is full; the waitlist is still open")]
    EventFull { event_id: i64 },

    #[error("Registration {registration_id} is already cancelled")]
    AlreadyCancelled { registration_id: i64 },

    #[error("Registration in terminal state {status} cannot be transitioned")]
    TerminalState { status: RegistrationStatus },

    #[error("Invalid state transition: {from} -> {to}")]
    InvalidStateTransition { from: String, to: String },

    #[error("Attendance window closed at {window_end}")]
    WindowExpired { window_end: DateTime<Utc> },

    #[error("Concurrent update lost and retries exhausted")]
    StoreConflict,

    #[error("Service unavailable: {0}")]
    Unavailable(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Membership verification API specific errors
#[derive(Error, Debug)]
pub enum MembershipError {
    #[error("Membership API request failed: {0}")]
    RequestFailed(String),

    #[error("Membership API timeout")]
    Timeout,

    #[error("Invalid membership response: {0}")]
    InvalidResponse(String),

    #[error("Membership service unavailable")]
    ServiceUnavailable,
}

/// Result type alias for Eventra operations
pub type Result<T> = std::result::Result<T, EventraError>;

/// Result type alias for membership operations
pub type MembershipResult<T> = std::result::Result<T, MembershipError>;

impl EventraError {
    /// Check if the error is recoverable
    pub fn is_recoverable(&self) -> bool {
        match self {
            EventraError::Database(_) => false,
            EventraError::Migration(_) => false,
            EventraError::Redis(_) => true,
            EventraError::Http(_) => true,
            EventraError::Serialization(_) => false,
            EventraError::Io(_) => true,
            EventraError::Config(_) => false,
            EventraError::Membership(_) => true,
            EventraError::StoreConflict => true,
            EventraError::Unavailable(_) => true,
            _ => false,
        }
    }

    /// Get error severity level
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            EventraError::Database(_) => ErrorSeverity::Critical,
            EventraError::Migration(_) => ErrorSeverity::Critical,
            EventraError::Config(_) => ErrorSeverity::Critical,
            EventraError::Redis(_) => ErrorSeverity::Error,
            EventraError::StoreConflict => ErrorSeverity::Error,
            EventraError::Unavailable(_) => ErrorSeverity::Error,
            EventraError::Forbidden(_) => ErrorSeverity::Warning,
            EventraError::InvalidInput(_) => ErrorSeverity::Info,
            EventraError::DuplicateActive { .. }
            | EventraError::RegistrationNotOpen { .. }
            | EventraError::DeadlinePassed { .. }
            | EventraError::EventFull { .. }
            | EventraError::AlreadyCancelled { .. }
            | EventraError::TerminalState { .. }
            | EventraError::InvalidStateTransition { .. }
            | EventraError::WindowExpired { .. } => ErrorSeverity::Info,
            _ => ErrorSeverity::Error,
        }
    }

    /// Whether the wrapped database error is a unique constraint violation
    pub fn is_unique_violation(&self) -> bool {
        matches!(
            self,
            EventraError::Database(sqlx::Error::Database(db))
                if db.code().as_deref() == Some("23505")
        )
    }

    /// Whether the wrapped database error is a serialization failure or
    /// deadlock, i.e. a transient conflict worth retrying
    pub fn is_store_conflict(&self) -> bool {
        matches!(
            self,
            EventraError::Database(sqlx::Error::Database(db))
                if matches!(db.code().as_deref(), Some("40001") | Some("40P01"))
        )
    }
}

/// Error severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    Info,
    Warning,
    Error,
    Critical,
}

impl std::fmt::Display for ErrorSeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorSeverity::Info => write!(f, "INFO"),
            ErrorSeverity::Warning => write!(f, "WARN"),
            ErrorSeverity::Error => write!(f, "ERROR"),
            ErrorSeverity::Critical => write!(f, "CRITICAL"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicate_active_messages_distinguish_status() {
        let confirmed = EventraError::DuplicateActive {
            status: RegistrationStatus::Confirmed,
        };
        let pending = EventraError::DuplicateActive {
            status: RegistrationStatus::Pending,
        };

        assert!(confirmed.to_string().contains("confirmed"));
        assert!(pending.to_string().contains("pending"));
        assert_ne!(confirmed.to_string(), pending.to_string());
    }

    #[test]
    fn test_business_rejections_are_info_severity() {
        let err = EventraError::EventFull { event_id: 7 };
        assert_eq!(err.severity(), ErrorSeverity::Info);
        assert!(!err.is_recoverable());

        let err = EventraError::DeadlinePassed {
            deadline: chrono::Utc::now(),
        };
        assert_eq!(err.severity(), ErrorSeverity::Info);
    }

    #[test]
    fn test_store_conflict_is_recoverable() {
        assert!(EventraError::StoreConflict.is_recoverable());
        assert_eq!(EventraError::StoreConflict.severity(), ErrorSeverity::Error);
    }

    #[test]
    fn test_event_full_mentions_waitlist() {
        let err = EventraError::EventFull { event_id: 3 };
        assert!(err.to_string().contains("waitlist"));
    }
}
