//! Data models module
//!
//! This module contains all data structures used throughout the application

pub mod actor;
pub mod event;
pub mod registration;

// Re-export commonly used models
pub use actor::{Actor, Role};
pub use event::{
    CreateEventRequest, EffectiveStatus, Event, EventType, StoredStatus, UpdateEventRequest,
};
pub use registration::{
    CreateRegistrationRequest, PaymentStatus, Registration, RegistrationStatus, RegistrationType,
};
