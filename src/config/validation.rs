//! Configuration validation module
//!
//! This module provides validation functions for application configuration
//! to ensure all required settings are properly configured.

use super::Settings;
use crate::utils::errors::{EventraError, Result};

/// Validate all configuration settings
pub fn validate_settings(settings: &Settings) -> Result<()> {
    validate_service_config(&settings.service)?;
    validate_database_config(&settings.database)?;
    validate_redis_config(&settings.redis)?;
    validate_membership_config(&settings.membership)?;
    validate_registration_config(&settings.registration)?;
    validate_logging_config(&settings.logging)?;

    Ok(())
}

/// Validate service configuration
fn validate_service_config(config: &super::ServiceConfig) -> Result<()> {
    if config.default_currency.len() != 3 {
        return Err(EventraError::Config(
            "Default currency must be a three-letter ISO code".to_string(),
        ));
    }

    Ok(())
}

/// Validate database configuration
fn validate_database_config(config: &super::DatabaseConfig) -> Result<()> {
    if config.url.is_empty() {
        return Err(EventraError::Config("Database URL is required".to_string()));
    }

    if config.max_connections == 0 {
        return Err(EventraError::Config(
            "Max connections must be greater than 0".to_string(),
        ));
    }

    if config.min_connections > config.max_connections {
        return Err(EventraError::Config(
            "Min connections cannot be greater than max connections".to_string(),
        ));
    }

    Ok(())
}

/// Validate Redis configuration
fn validate_redis_config(config: &super::RedisConfig) -> Result<()> {
    if config.url.is_empty() {
        return Err(EventraError::Config("Redis URL is required".to_string()));
    }

    if config.ttl_seconds == 0 {
        return Err(EventraError::Config(
            "Cache TTL must be greater than 0".to_string(),
        ));
    }

    Ok(())
}

/// Validate membership API configuration
fn validate_membership_config(config: &super::MembershipConfig) -> Result<()> {
    if config.api_url.is_empty() {
        return Err(EventraError::Config(
            "Membership API URL is required".to_string(),
        ));
    }

    if config.timeout_seconds == 0 {
        return Err(EventraError::Config(
            "Membership timeout must be greater than 0".to_string(),
        ));
    }

    Ok(())
}

/// Validate registration configuration
fn validate_registration_config(config: &super::RegistrationConfig) -> Result<()> {
    if config.attendance_grace_days < 0 {
        return Err(EventraError::Config(
            "Attendance grace days cannot be negative".to_string(),
        ));
    }

    if config.max_conflict_retries == 0 {
        return Err(EventraError::Config(
            "At least one conflict retry must be allowed".to_string(),
        ));
    }

    if config.completion_sweep_interval_seconds == 0
        || config.reconciliation_sweep_interval_seconds == 0
    {
        return Err(EventraError::Config(
            "Sweep intervals must be greater than 0".to_string(),
        ));
    }

    Ok(())
}

/// Validate logging configuration
fn validate_logging_config(config: &super::LoggingConfig) -> Result<()> {
    if config.level.is_empty() {
        return Err(EventraError::Config("Log level is required".to_string()));
    }

    let valid_levels = ["trace", "debug", "info", "warn", "error"];
    if !valid_levels.contains(&config.level.as_str()) {
        return Err(EventraError::Config(format!(
            "Invalid log level: {}. Valid levels: {:?}",
            config.level, valid_levels
        )));
    }

    Ok(())
}
