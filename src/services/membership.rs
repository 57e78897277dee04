//! Membership verification service implementation
//!
//! This service queries the external membership API used for member pricing,
//! including HTTP client setup, response parsing, Redis caching of results,
//! and graceful degradation: any failure resolves to non-member pricing.

use std::time::Duration;

use redis::AsyncCommands;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::settings::Settings;
use crate::utils::errors::{EventraError, MembershipError, Result};

/// Membership API response structure
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MembershipResponse {
    pub active: bool,
    pub tier: Option<String>,
    pub expires_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// Membership check result with caching info
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedMembershipResult {
    pub verified: bool,
    pub tier: Option<String>,
    pub checked_at: chrono::DateTime<chrono::Utc>,
}

/// Membership service for member-price eligibility
#[derive(Debug, Clone)]
pub struct MembershipService {
    client: Client,
    redis_client: redis::Client,
    settings: Settings,
}

impl MembershipService {
    /// Create a new MembershipService instance
    pub fn new(redis_client: redis::Client, settings: Settings) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(settings.membership.timeout_seconds))
            .user_agent("Eventra/1.0")
            .build()
            .map_err(EventraError::Http)?;

        Ok(Self {
            client,
            redis_client,
            settings,
        })
    }

    /// Whether the feature is enabled
    pub fn is_enabled(&self) -> bool {
        self.settings.features.membership_pricing
    }

    /// Check a user's membership, consulting the cache first
    pub async fn check_member(&self, user_id: i64) -> Result<CachedMembershipResult> {
        debug!(user_id = user_id, "Checking membership");

        if let Some(cached) = self.get_cached_result(user_id).await {
            debug!(user_id = user_id, "Found cached membership result");
            return Ok(cached);
        }

        let result = self.make_membership_request(user_id).await?;
        self.cache_result(user_id, &result).await;

        Ok(result)
    }

    /// Membership verification for the pricing rule. Never fails admission:
    /// a disabled feature or an unreachable API resolves to non-member.
    pub async fn verified_for_pricing(&self, user_id: i64) -> bool {
        if !self.is_enabled() {
            return false;
        }

        match self.check_member(user_id).await {
            Ok(result) => result.verified,
            Err(e) => {
                warn!(user_id = user_id, error = %e, "Membership check failed, using non-member pricing");
                false
            }
        }
    }

    /// Get cached result from Redis. Cache trouble is a miss, not an error.
    async fn get_cached_result(&self, user_id: i64) -> Option<CachedMembershipResult> {
        let mut conn = match self.redis_client.get_async_connection().await {
            Ok(conn) => conn,
            Err(e) => {
                warn!(user_id = user_id, error = %e, "Membership cache unavailable");
                return None;
            }
        };

        let cache_key = self.cache_key(user_id);
        let cached_data: Option<String> = match conn.get(&cache_key).await {
            Ok(data) => data,
            Err(e) => {
                warn!(user_id = user_id, error = %e, "Membership cache read failed");
                return None;
            }
        };

        let data = cached_data?;
        match serde_json::from_str::<CachedMembershipResult>(&data) {
            Ok(result) => Some(result),
            Err(e) => {
                warn!(user_id = user_id, error = %e, "Corrupted membership cache entry");
                let _: std::result::Result<i32, _> = conn.del(&cache_key).await;
                None
            }
        }
    }

    /// Cache a membership result, best-effort
    async fn cache_result(&self, user_id: i64, result: &CachedMembershipResult) {
        let serialized = match serde_json::to_string(result) {
            Ok(s) => s,
            Err(_) => return,
        };

        match self.redis_client.get_async_connection().await {
            Ok(mut conn) => {
                let outcome: std::result::Result<(), _> = conn
                    .set_ex(
                        self.cache_key(user_id),
                        serialized,
                        self.settings.membership.cache_ttl_seconds,
                    )
                    .await;
                if let Err(e) = outcome {
                    warn!(user_id = user_id, error = %e, "Membership cache write failed");
                }
            }
            Err(e) => {
                warn!(user_id = user_id, error = %e, "Membership cache unavailable");
            }
        }
    }

    /// Make the API request
    async fn make_membership_request(&self, user_id: i64) -> Result<CachedMembershipResult> {
        let url = format!(
            "{}/members/{}",
            self.settings.membership.api_url.trim_end_matches('/'),
            user_id
        );

        let response = self.client.get(&url).send().await.map_err(|e| {
            if e.is_timeout() {
                EventraError::Membership(MembershipError::Timeout)
            } else {
                EventraError::Membership(MembershipError::RequestFailed(e.to_string()))
            }
        })?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            // Unknown user id means no membership
            return Ok(CachedMembershipResult {
                verified: false,
                tier: None,
                checked_at: chrono::Utc::now(),
            });
        }

        if !response.status().is_success() {
            return Err(EventraError::Membership(MembershipError::ServiceUnavailable));
        }

        let body: MembershipResponse = response.json().await.map_err(|e| {
            EventraError::Membership(MembershipError::InvalidResponse(e.to_string()))
        })?;

        info!(user_id = user_id, verified = body.active, "Membership API response received");
        Ok(CachedMembershipResult {
            verified: body.active,
            tier: body.tier,
            checked_at: chrono::Utc::now(),
        })
    }

    fn cache_key(&self, user_id: i64) -> String {
        format!("{}membership:{}", self.settings.redis.prefix, user_id)
    }
}
