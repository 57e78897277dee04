//! Services module
//!
//! This module contains business logic services

pub mod admission;
pub mod attendance;
pub mod auth;
pub mod cache;
pub mod cancellation;
pub mod event;
pub mod membership;
pub mod notification;
pub mod status;

// Re-export commonly used services
pub use admission::AdmissionService;
pub use attendance::AttendanceService;
pub use auth::AuthService;
pub use cache::CacheService;
pub use cancellation::CancellationService;
pub use event::EventService;
pub use membership::{CachedMembershipResult, MembershipService};
pub use notification::{NotificationKind, NotificationService, Notifier, TracingNotifier};
pub use status::{effective_status, StatusService};

use crate::config::settings::Settings;
use crate::database::DatabaseService;
use crate::utils::errors::Result;

/// Service factory for creating and managing all services
#[derive(Clone)]
pub struct ServiceFactory {
    pub status_service: StatusService,
    pub admission_service: AdmissionService,
    pub cancellation_service: CancellationService,
    pub attendance_service: AttendanceService,
    pub event_service: EventService,
    pub auth_service: AuthService,
    pub cache_service: CacheService,
    pub membership_service: MembershipService,
    pub notification_service: NotificationService,
}

impl ServiceFactory {
    /// Create a new ServiceFactory with all services initialized
    pub fn new(settings: Settings, db: DatabaseService) -> Result<Self> {
        let cache_service = CacheService::new(settings.clone())?;
        let redis_client = redis::Client::open(settings.redis.url.as_str())?;
        let membership_service = MembershipService::new(redis_client, settings.clone())?;
        let notification_service = NotificationService::new(&settings);
        let auth_service = AuthService::new(settings.clone());

        let status_service = StatusService::new(db.clone());
        let admission_service = AdmissionService::new(
            db.clone(),
            cache_service.clone(),
            membership_service.clone(),
            notification_service.clone(),
            settings.clone(),
        );
        let cancellation_service = CancellationService::new(
            db.clone(),
            cache_service.clone(),
            auth_service.clone(),
            notification_service.clone(),
        );
        let attendance_service = AttendanceService::new(
            db.clone(),
            cache_service.clone(),
            auth_service.clone(),
            settings.clone(),
        );
        let event_service = EventService::new(
            db,
            cache_service.clone(),
            auth_service.clone(),
            notification_service.clone(),
            settings,
        );

        Ok(Self {
            status_service,
            admission_service,
            cancellation_service,
            attendance_service,
            event_service,
            auth_service,
            cache_service,
            membership_service,
            notification_service,
        })
    }

    /// Health check for all services
    pub async fn health_check(&self, db: &crate::database::DatabasePool) -> ServiceHealthStatus {
        let redis_healthy = self.cache_service.health_check().await.unwrap_or(false);
        let database_healthy = crate::database::health_check(db).await.is_ok();
        let membership_enabled = self.membership_service.is_enabled();

        ServiceHealthStatus {
            database_healthy,
            redis_healthy,
            membership_enabled,
        }
    }
}

/// Health status for all services
#[derive(Debug, Clone)]
pub struct ServiceHealthStatus {
    pub database_healthy: bool,
    pub redis_healthy: bool,
    pub membership_enabled: bool,
}

impl ServiceHealthStatus {
    /// Check if all critical services are healthy. Redis is degraded-mode
    /// tolerable: caching is display-only by contract.
    pub fn is_healthy(&self) -> bool {
        self.database_healthy
    }

    /// Get list of unhealthy services
    pub fn get_issues(&self) -> Vec<String> {
        let mut issues = Vec::new();

        if !self.database_healthy {
            issues.push("Database connection failed".to_string());
        }
        if !self.redis_healthy {
            issues.push("Redis connection failed".to_string());
        }

        issues
    }
}
