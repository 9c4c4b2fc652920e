//! Application settings loaded from environment variables.

use std::env;

use super::constants::{
    APP_ENV_DEVELOPMENT, DEFAULT_APP_BASE_URL, DEFAULT_DATABASE_URL, DEFAULT_GEMINI_BASE_URL,
    DEFAULT_GEMINI_MODEL, DEFAULT_JWT_EXPIRATION_HOURS, DEFAULT_REDIS_URL, DEFAULT_SERVER_HOST,
    DEFAULT_SERVER_PORT, DEFAULT_SMTP_FROM, DEFAULT_SMTP_PORT, DEFAULT_STREAM_CHUNK_DELAY_MS,
    MIN_JWT_SECRET_LENGTH,
};

/// Application configuration
#[derive(Clone)]
pub struct Config {
    pub database_url: String,
    pub redis_url: String,
    jwt_secret: String,
    pub jwt_expiration_hours: i64,
    pub server_host: String,
    pub server_port: u16,
    pub app_base_url: String,
    pub app_env: String,
    pub llm: LlmConfig,
    pub smtp: SmtpConfig,
}

/// Hosted LLM settings
#[derive(Clone)]
pub struct LlmConfig {
    /// `None` puts the assistant into welcome-message mode
    pub api_key: Option<String>,
    pub model: String,
    pub base_url: String,
    pub chunk_delay_ms: u64,
}

/// Outgoing mail settings
#[derive(Clone)]
pub struct SmtpConfig {
    pub host: Option<String>,
    pub port: u16,
    pub user: Option<String>,
    pub pass: Option<String>,
    pub from: String,
}

impl SmtpConfig {
    /// SMTP is used only when a relay host is set.
    pub fn is_configured(&self) -> bool {
        self.host.is_some()
    }
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("database_url", &"[REDACTED]")
            .field("redis_url", &"[REDACTED]")
            .field("jwt_secret", &"[REDACTED]")
            .field("jwt_expiration_hours", &self.jwt_expiration_hours)
            .field("server_host", &self.server_host)
            .field("server_port", &self.server_port)
            .field("app_base_url", &self.app_base_url)
            .field("app_env", &self.app_env)
            .field("llm", &self.llm)
            .field("smtp", &self.smtp)
            .finish()
    }
}

impl std::fmt::Debug for LlmConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("chunk_delay_ms", &self.chunk_delay_ms)
            .finish()
    }
}

impl std::fmt::Debug for SmtpConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmtpConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("pass", &self.pass.as_ref().map(|_| "[REDACTED]"))
            .field("from", &self.from)
            .finish()
    }
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Panics
    /// Panics if JWT_SECRET is not set or is too short (security requirement).
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let jwt_secret = env::var("JWT_SECRET").unwrap_or_else(|_| {
            if cfg!(debug_assertions) {
                tracing::warn!("JWT_SECRET not set, using insecure default for development");
                "dev-secret-key-minimum-32-chars!!".to_string()
            } else {
                panic!("JWT_SECRET environment variable must be set in production");
            }
        });

        if jwt_secret.len() < MIN_JWT_SECRET_LENGTH {
            panic!(
                "JWT_SECRET must be at least {} characters long",
                MIN_JWT_SECRET_LENGTH
            );
        }

        Self {
            database_url: env::var("DATABASE_URL")
                .unwrap_or_else(|_| DEFAULT_DATABASE_URL.to_string()),
            redis_url: env::var("REDIS_URL").unwrap_or_else(|_| DEFAULT_REDIS_URL.to_string()),
            jwt_secret,
            jwt_expiration_hours: parse_var("JWT_EXPIRATION_HOURS")
                .unwrap_or(DEFAULT_JWT_EXPIRATION_HOURS),
            server_host: env::var("SERVER_HOST")
                .unwrap_or_else(|_| DEFAULT_SERVER_HOST.to_string()),
            server_port: parse_var("SERVER_PORT").unwrap_or(DEFAULT_SERVER_PORT),
            app_base_url: env::var("APP_BASE_URL")
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or_else(|_| DEFAULT_APP_BASE_URL.to_string()),
            app_env: env::var("APP_ENV").unwrap_or_else(|_| "production".to_string()),
            llm: LlmConfig {
                api_key: non_empty_var("GEMINI_API_KEY"),
                model: env::var("GEMINI_MODEL")
                    .unwrap_or_else(|_| DEFAULT_GEMINI_MODEL.to_string()),
                base_url: env::var("GEMINI_BASE_URL")
                    .unwrap_or_else(|_| DEFAULT_GEMINI_BASE_URL.to_string()),
                chunk_delay_ms: parse_var("STREAM_CHUNK_DELAY_MS")
                    .unwrap_or(DEFAULT_STREAM_CHUNK_DELAY_MS),
            },
            smtp: SmtpConfig {
                host: non_empty_var("SMTP_HOST"),
                port: parse_var("SMTP_PORT").unwrap_or(DEFAULT_SMTP_PORT),
                user: non_empty_var("SMTP_USER"),
                pass: non_empty_var("SMTP_PASS"),
                from: env::var("SMTP_FROM").unwrap_or_else(|_| DEFAULT_SMTP_FROM.to_string()),
            },
        }
    }

    /// Build a configuration for tests without touching the environment.
    pub fn for_tests(jwt_secret: impl Into<String>) -> Self {
        Self {
            database_url: DEFAULT_DATABASE_URL.to_string(),
            redis_url: DEFAULT_REDIS_URL.to_string(),
            jwt_secret: jwt_secret.into(),
            jwt_expiration_hours: DEFAULT_JWT_EXPIRATION_HOURS,
            server_host: DEFAULT_SERVER_HOST.to_string(),
            server_port: DEFAULT_SERVER_PORT,
            app_base_url: DEFAULT_APP_BASE_URL.to_string(),
            app_env: APP_ENV_DEVELOPMENT.to_string(),
            llm: LlmConfig {
                api_key: None,
                model: DEFAULT_GEMINI_MODEL.to_string(),
                base_url: DEFAULT_GEMINI_BASE_URL.to_string(),
                chunk_delay_ms: 0,
            },
            smtp: SmtpConfig {
                host: None,
                port: DEFAULT_SMTP_PORT,
                user: None,
                pass: None,
                from: DEFAULT_SMTP_FROM.to_string(),
            },
        }
    }

    /// Get JWT secret bytes for token signing/verification.
    pub fn jwt_secret_bytes(&self) -> &[u8] {
        self.jwt_secret.as_bytes()
    }

    /// Development mode exposes reset links in API responses.
    pub fn is_development(&self) -> bool {
        self.app_env == APP_ENV_DEVELOPMENT
    }

    /// Session lifetime in seconds.
    pub fn session_ttl_seconds(&self) -> u64 {
        (self.jwt_expiration_hours.max(0) as u64) * 3600
    }
}

fn parse_var<T: std::str::FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|v| v.parse().ok())
}

fn non_empty_var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}
