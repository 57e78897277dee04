//! Application settings management
//!
//! This module defines the configuration structure and provides methods
//! for loading settings from TOML files and environment variables.

use serde::{Deserialize, Serialize};

/// Main application configuration structure
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Settings {
    pub service: ServiceConfig,
    pub database: DatabaseConfig,
    pub redis: RedisConfig,
    pub membership: MembershipConfig,
    pub registration: RegistrationConfig,
    pub logging: LoggingConfig,
    pub features: FeaturesConfig,
}

/// Service-level configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServiceConfig {
    pub admin_ids: Vec<i64>,
    pub default_currency: String,
}

/// Database configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
}

/// Redis configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RedisConfig {
    pub url: String,
    pub prefix: String,
    pub ttl_seconds: u64,
}

/// Membership verification API configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MembershipConfig {
    pub api_url: String,
    pub timeout_seconds: u64,
    pub cache_ttl_seconds: u64,
}

/// Registration behavior configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RegistrationConfig {
    /// Days after event end during which admins may still mark attendance
    pub attendance_grace_days: i64,
    /// Bounded internal retries for transient store conflicts
    pub max_conflict_retries: u32,
    /// Interval for the sweep marking past published events completed
    pub completion_sweep_interval_seconds: u64,
    /// Interval for the waitlist reconciliation sweep
    pub reconciliation_sweep_interval_seconds: u64,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    pub level: String,
    pub file_path: String,
    pub max_files: u32,
}

/// Feature flags configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FeaturesConfig {
    pub membership_pricing: bool,
    pub notifications: bool,
}

impl Settings {
    /// Load settings from configuration file and environment variables
    pub fn new() -> Result<Self, config::ConfigError> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name("config").required(false))
            .add_source(config::Environment::with_prefix("EVENTRA"))
            .build()?;

        settings.try_deserialize()
    }

    /// Validate configuration settings
    pub fn validate(&self) -> Result<(), crate::utils::errors::EventraError> {
        super::validation::validate_settings(self)
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            service: ServiceConfig {
                admin_ids: vec![],
                default_currency: "EUR".to_string(),
            },
            database: DatabaseConfig {
                url: "postgresql://localhost/eventra".to_string(),
                max_connections: 10,
                min_connections: 1,
            },
            redis: RedisConfig {
                url: "redis://localhost:6379".to_string(),
                prefix: "eventra:".to_string(),
                ttl_seconds: 60,
            },
            membership: MembershipConfig {
                api_url: "https://members.example.org/api".to_string(),
                timeout_seconds: 5,
                cache_ttl_seconds: 3600,
            },
            registration: RegistrationConfig {
                attendance_grace_days: 3,
                max_conflict_retries: 3,
                completion_sweep_interval_seconds: 300,
                reconciliation_sweep_interval_seconds: 300,
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                file_path: "/var/log/eventra".to_string(),
                max_files: 5,
            },
            features: FeaturesConfig {
                membership_pricing: true,
                notifications: true,
            },
        }
    }
}
