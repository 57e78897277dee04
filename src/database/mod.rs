//! Database module
//!
//! Connection pool management, repositories and the database service facade

pub mod connection;
pub mod repositories;
pub mod service;

pub use connection::{create_pool, health_check, run_migrations, DatabasePool};
pub use repositories::{EventRepository, RegistrationRepository};
pub use service::DatabaseService;
