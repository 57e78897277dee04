//! Eventra event registration platform
//!
//! The core of an event-registration service: an event lifecycle state
//! machine combined with capacity-bounded admission and FIFO waitlist
//! promotion. Organizers publish events with capacity limits; users
//! register, get confirmed or waitlisted, and may cancel; attendance is
//! tracked after the fact.

#![allow(non_snake_case)]

pub mod config;
pub mod database;
pub mod models;
pub mod services;
pub mod utils;

// Re-export commonly used types
pub use config::Settings;
pub use utils::errors::{EventraError, Result};

// Re-export main components for easy access
pub use database::DatabaseService;
pub use services::ServiceFactory;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");

/// Get library information
pub fn info() -> String {
    format!("{} v{}", NAME, VERSION)
}
