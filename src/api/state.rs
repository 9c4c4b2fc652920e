//! Application state - Dependency injection container.
//!
//! Provides centralized access to all application services and infrastructure.

use async_trait::async_trait;
use std::sync::Arc;

use crate::config::Config;
use crate::errors::AppResult;
use crate::infra::{self, Cache, Database, RateLimiter};
use crate::services::{ServiceContainer, Services};

#[cfg(any(test, feature = "test-utils"))]
use mockall::automock;

/// Connectivity checks reported by `/health`.
#[cfg_attr(any(test, feature = "test-utils"), automock)]
#[async_trait]
pub trait HealthCheck: Send + Sync {
    async fn database(&self) -> AppResult<()>;

    async fn redis(&self) -> AppResult<()>;
}

/// The live backends behind the service layer
pub struct Backends {
    database: Arc<Database>,
    cache: Arc<Cache>,
}

impl Backends {
    pub fn new(database: Arc<Database>, cache: Arc<Cache>) -> Self {
        Self { database, cache }
    }
}

#[async_trait]
impl HealthCheck for Backends {
    async fn database(&self) -> AppResult<()> {
        self.database.ping().await?;
        Ok(())
    }

    async fn redis(&self) -> AppResult<()> {
        self.cache.ping().await
    }
}

/// Application state shared by every handler.
#[derive(Clone)]
pub struct AppState {
    pub services: Arc<dyn ServiceContainer>,
    pub rate_limiter: Arc<dyn RateLimiter>,
    pub health: Arc<dyn HealthCheck>,
    pub config: Config,
}

impl AppState {
    /// Wire the production state from live connections.
    pub fn from_config(database: Arc<Database>, cache: Arc<Cache>, config: Config) -> Self {
        let services = Services::from_parts(
            database.get_connection(),
            cache.clone(),
            infra::llm::from_config(&config.llm),
            infra::mail::from_config(&config.smtp),
            config.clone(),
        );

        Self {
            services: Arc::new(services),
            rate_limiter: cache.clone(),
            health: Arc::new(Backends::new(database, cache)),
            config,
        }
    }

    /// Create state with manually injected parts.
    pub fn new(
        services: Arc<dyn ServiceContainer>,
        rate_limiter: Arc<dyn RateLimiter>,
        health: Arc<dyn HealthCheck>,
        config: Config,
    ) -> Self {
        Self {
            services,
            rate_limiter,
            health,
            config,
        }
    }
}
