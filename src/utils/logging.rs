//! Logging configuration and setup
//!
//! This module provides logging initialization and structured logging
//! utilities for the Eventra application.

use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::LoggingConfig;
use crate::utils::errors::Result;

/// Initialize logging based on configuration.
///
/// Returns the worker guard for the file appender; dropping it stops the
/// background writer, so the caller holds it for the process lifetime.
pub fn init_logging(config: &LoggingConfig) -> Result<tracing_appender::non_blocking::WorkerGuard> {
    let file_appender = tracing_appender::rolling::daily(&config.file_path, "eventra.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(&config.level))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stdout))
        .with(tracing_subscriber::fmt::layer().with_writer(non_blocking))
        .init();

    info!("Logging initialized with level: {}", config.level);
    Ok(guard)
}

/// Log admission outcomes with structured data
pub fn log_admission(user_id: i64, event_id: i64, outcome: &str, details: Option<&str>) {
    info!(
        user_id = user_id,
        event_id = event_id,
        outcome = outcome,
        details = details,
        "Admission processed"
    );
}

/// Log background sweep runs
pub fn log_sweep_run(sweep: &str, affected: u64, duration_ms: u64) {
    info!(
        sweep = sweep,
        affected = affected,
        duration_ms = duration_ms,
        "Sweep completed"
    );
}

/// Log admin actions
pub fn log_admin_action(admin_id: i64, action: &str, target: Option<&str>) {
    warn!(
        admin_id = admin_id,
        action = action,
        target = target,
        "Admin action performed"
    );
}
