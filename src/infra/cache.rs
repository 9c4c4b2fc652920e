//! Redis cache: rate-limit counters and session revocation marks.

use async_trait::async_trait;
use redis::{aio::ConnectionManager, AsyncCommands, Client, RedisError};
use serde::{de::DeserializeOwned, Serialize};
use uuid::Uuid;

use crate::config::{Config, CACHE_PREFIX_RATE_LIMIT, CACHE_PREFIX_SESSION_REVOKED};
use crate::errors::{AppError, AppResult};

#[cfg(any(test, feature = "test-utils"))]
use mockall::automock;

/// Revocation marks for issued session tokens.
///
/// A mark holds the unix time of the revocation; tokens issued before it are
/// no longer accepted.
#[cfg_attr(any(test, feature = "test-utils"), automock)]
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Invalidate every token issued to the user so far.
    async fn revoke_user_sessions(&self, user_id: Uuid, ttl_seconds: u64) -> AppResult<()>;

    /// Unix time of the latest revocation, if one is still remembered.
    async fn revoked_at(&self, user_id: Uuid) -> AppResult<Option<i64>>;
}

/// Fixed-window request counters.
#[cfg_attr(any(test, feature = "test-utils"), automock)]
#[async_trait]
pub trait RateLimiter: Send + Sync {
    /// Count a hit for `identifier`.
    /// Returns (current_count, is_allowed) tuple.
    async fn check_rate_limit(
        &self,
        identifier: &str,
        max_requests: u64,
        window_seconds: u64,
    ) -> AppResult<(u64, bool)>;
}

/// Redis cache wrapper with connection pooling.
#[derive(Clone)]
pub struct Cache {
    connection: ConnectionManager,
}

impl Cache {
    pub async fn connect(config: &Config) -> Result<Self, RedisError> {
        let client = Client::open(config.redis_url.as_str())?;
        let connection = ConnectionManager::new(client).await?;

        tracing::info!("Redis cache connected");

        Ok(Self { connection })
    }

    // =========================================================================
    // Generic Cache Operations
    // =========================================================================

    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> AppResult<Option<T>> {
        let mut conn = self.connection.clone();
        let value: Option<String> = conn.get(key).await?;

        match value {
            Some(json) => {
                let parsed = serde_json::from_str(&json).map_err(|e| {
                    AppError::internal(format!("Cache deserialization error: {}", e))
                })?;
                Ok(Some(parsed))
            }
            None => Ok(None),
        }
    }

    pub async fn set_with_ttl<T: Serialize>(
        &self,
        key: &str,
        value: &T,
        ttl_seconds: u64,
    ) -> AppResult<()> {
        let mut conn = self.connection.clone();
        let json = serde_json::to_string(value)
            .map_err(|e| AppError::internal(format!("Cache serialization error: {}", e)))?;

        conn.set_ex::<_, _, ()>(key, json, ttl_seconds).await?;
        Ok(())
    }

    /// Round-trip a PING, used by the health check.
    pub async fn ping(&self) -> AppResult<()> {
        let mut conn = self.connection.clone();
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(())
    }
}

fn revocation_key(user_id: Uuid) -> String {
    format!("{}{}", CACHE_PREFIX_SESSION_REVOKED, user_id)
}

#[async_trait]
impl RateLimiter for Cache {
    async fn check_rate_limit(
        &self,
        identifier: &str,
        max_requests: u64,
        window_seconds: u64,
    ) -> AppResult<(u64, bool)> {
        let key = format!("{}{}", CACHE_PREFIX_RATE_LIMIT, identifier);
        let mut conn = self.connection.clone();

        let count: i64 = conn.incr(&key, 1).await?;
        if count == 1 {
            // First hit opens the window
            let _: () = conn.expire(&key, window_seconds as i64).await?;
        }

        let count = count.max(0) as u64;
        Ok((count, count <= max_requests))
    }
}

#[async_trait]
impl SessionStore for Cache {
    async fn revoke_user_sessions(&self, user_id: Uuid, ttl_seconds: u64) -> AppResult<()> {
        let now = chrono::Utc::now().timestamp();
        self.set_with_ttl(&revocation_key(user_id), &now, ttl_seconds)
            .await?;
        tracing::info!(user_id = %user_id, "User sessions revoked");
        Ok(())
    }

    async fn revoked_at(&self, user_id: Uuid) -> AppResult<Option<i64>> {
        self.get(&revocation_key(user_id)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_key_prefixes() {
        assert_eq!(CACHE_PREFIX_RATE_LIMIT, "rate_limit:");
        assert_eq!(CACHE_PREFIX_SESSION_REVOKED, "session:revoked:");
    }

    #[test]
    fn test_revocation_key_format() {
        let id = Uuid::nil();
        assert_eq!(
            revocation_key(id),
            "session:revoked:00000000-0000-0000-0000-000000000000"
        );
    }
}
