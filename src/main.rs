//! Eventra registration service
//!
//! Main application entry point: wires configuration, logging, the
//! database and cache, then runs the background sweeps until shutdown.
//! Transport (HTTP/GraphQL) is hosted separately and talks to the same
//! store; this process owns the scheduled maintenance work.

use std::time::Duration;

use tracing::{error, info, warn};

use Eventra::{
    config::Settings,
    database::{connection::create_pool, run_migrations, DatabaseService},
    services::ServiceFactory,
    utils::logging,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    // Load configuration
    let settings = Settings::new()?;
    settings.validate()?;

    // Initialize logging; the guard must outlive the runtime
    let _guard = logging::init_logging(&settings.logging)?;

    info!("Starting Eventra registration service...");

    // Initialize database connection
    info!("Connecting to database...");
    let db_pool = create_pool(&settings.database).await?;

    // Run database migrations
    run_migrations(&db_pool).await?;

    // Initialize services
    info!("Initializing services...");
    let database = DatabaseService::new(db_pool.clone());
    let services = ServiceFactory::new(settings.clone(), database)?;

    let health = services.health_check(&db_pool).await;
    if !health.is_healthy() {
        for issue in health.get_issues() {
            error!(issue = %issue, "Startup health check failed");
        }
        anyhow::bail!("Service failed its startup health check");
    }
    if !health.redis_healthy {
        warn!("Redis unavailable at startup; display caching degraded");
    }

    // Completion sweep: mark past published events completed
    let completion_interval =
        Duration::from_secs(settings.registration.completion_sweep_interval_seconds);
    let event_service = services.event_service.clone();
    let completion_sweep = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(completion_interval);
        loop {
            ticker.tick().await;
            let started = std::time::Instant::now();
            match event_service.complete_past_events(chrono::Utc::now()).await {
                Ok(completed) => logging::log_sweep_run(
                    "completion",
                    completed,
                    started.elapsed().as_millis() as u64,
                ),
                Err(e) => warn!(error = %e, "Completion sweep run failed"),
            }
        }
    });

    // Reconciliation sweep: promote waitlisted registrations into slots
    // freed outside the normal cancellation path
    let reconciliation_interval =
        Duration::from_secs(settings.registration.reconciliation_sweep_interval_seconds);
    let cancellation_service = services.cancellation_service.clone();
    let reconciliation_sweep = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(reconciliation_interval);
        loop {
            ticker.tick().await;
            let started = std::time::Instant::now();
            match cancellation_service.reconcile_waitlists().await {
                Ok(promotions) => logging::log_sweep_run(
                    "waitlist_reconciliation",
                    promotions,
                    started.elapsed().as_millis() as u64,
                ),
                Err(e) => warn!(error = %e, "Reconciliation sweep run failed"),
            }
        }
    });

    info!("Eventra registration service is ready");

    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received");

    completion_sweep.abort();
    reconciliation_sweep.abort();

    info!("Eventra registration service has been shut down.");
    Ok(())
}
