//! Application configuration module
//!
//! Typed configuration loaded from environment variables using the `config`
//! and `dotenvy` crates. Variables carry the `PAYMENT_WEBHOOKS` prefix and
//! nested values are separated by double underscores.
//!
//! # Example
//!
//! ```no_run
//! use payment_webhooks::config::AppConfig;
//!
//! let config = AppConfig::load().expect("Failed to load configuration");
//! config.validate().expect("Invalid configuration");
//! ```

mod database;
mod error;
mod redis;
mod server;
mod webhook;

pub use database::DatabaseConfig;
pub use error::{ConfigError, ValidationError};
pub use redis::RedisConfig;
pub use server::{Environment, LogFormat, ServerConfig};
pub use webhook::WebhookConfig;

use serde::Deserialize;

use crate::adapters::rate_limiter::RateLimitConfig;

/// Root application configuration
///
/// Load using [`AppConfig::load()`] which reads from environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Listener and logging settings
    #[serde(default)]
    pub server: ServerConfig,

    /// Database configuration (PostgreSQL connection)
    pub database: DatabaseConfig,

    /// Optional shared rate limit store
    #[serde(default)]
    pub redis: RedisConfig,

    /// Signing secret and claim lease
    #[serde(default)]
    pub webhook: WebhookConfig,

    /// Sliding window limits applied per client source
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
}

impl AppConfig {
    /// Load configuration from environment variables
    ///
    /// Reads `.env` first when present, then maps variables such as:
    /// - `PAYMENT_WEBHOOKS__SERVER__LISTEN_ADDR=0.0.0.0:8080` -> `server.listen_addr`
    /// - `PAYMENT_WEBHOOKS__DATABASE__URL=...` -> `database.url = ...`
    /// - `PAYMENT_WEBHOOKS__WEBHOOK__SIGNING_SECRET=...` -> `webhook.signing_secret`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or values
    /// cannot be parsed into expected types.
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .add_source(
                config::Environment::default()
                    .prefix("PAYMENT_WEBHOOKS")
                    .separator("__"),
            )
            .build()?
            .try_deserialize()?;

        Ok(config)
    }

    /// Validate all configuration values
    ///
    /// A missing signing secret is not an error here; the endpoint reports it
    /// per delivery instead. The HTTP timeout must outlast the store bound,
    /// otherwise a slow store leaves claims in `recorded` until the lease ends.
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.server.validate()?;
        self.database.validate()?;
        self.redis.validate()?;
        self.webhook.validate()?;
        self.rate_limit
            .validate()
            .map_err(ValidationError::InvalidRateLimit)?;
        if self.server.request_timeout() <= self.database.store_timeout() {
            return Err(ValidationError::RequestTimeoutBelowStoreTimeout);
        }
        Ok(())
    }

    /// Check if running in production environment
    pub fn is_production(&self) -> bool {
        self.server.is_production()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;
    use std::env;
    use std::sync::Mutex;

    // Env vars are process-global
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    fn set_minimal_env() {
        env::set_var(
            "PAYMENT_WEBHOOKS__DATABASE__URL",
            "postgresql://test@localhost/test",
        );
    }

    fn clear_env() {
        for key in [
            "PAYMENT_WEBHOOKS__DATABASE__URL",
            "PAYMENT_WEBHOOKS__REDIS__URL",
            "PAYMENT_WEBHOOKS__WEBHOOK__SIGNING_SECRET",
            "PAYMENT_WEBHOOKS__RATE_LIMIT__MAX_REQUESTS",
            "PAYMENT_WEBHOOKS__SERVER__LISTEN_ADDR",
            "PAYMENT_WEBHOOKS__SERVER__REQUEST_TIMEOUT_SECS",
            "PAYMENT_WEBHOOKS__DATABASE__STORE_TIMEOUT_MS",
            "PAYMENT_WEBHOOKS__SERVER__ENVIRONMENT",
        ] {
            env::remove_var(key);
        }
    }

    #[test]
    fn test_load_from_environment() {
        let _guard = ENV_MUTEX.lock().unwrap();
        set_minimal_env();
        let result = AppConfig::load();
        clear_env();

        assert!(result.is_ok(), "Failed to load config: {:?}", result.err());
        let config = result.unwrap();
        assert_eq!(config.database.url, "postgresql://test@localhost/test");
        assert!(config.redis.url().is_none());
        assert!(!config.webhook.has_signing_secret());
    }

    #[test]
    fn test_minimal_config_validates_without_secret() {
        let _guard = ENV_MUTEX.lock().unwrap();
        set_minimal_env();
        let result = AppConfig::load();
        clear_env();

        let config = result.unwrap();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_rate_limit_defaults() {
        let _guard = ENV_MUTEX.lock().unwrap();
        set_minimal_env();
        let result = AppConfig::load();
        clear_env();

        let config = result.unwrap();
        assert_eq!(config.rate_limit.window_secs, 60);
        assert_eq!(config.rate_limit.max_requests, 100);
    }

    #[test]
    fn test_rate_limit_override() {
        let _guard = ENV_MUTEX.lock().unwrap();
        set_minimal_env();
        env::set_var("PAYMENT_WEBHOOKS__RATE_LIMIT__MAX_REQUESTS", "25");
        let result = AppConfig::load();
        clear_env();

        let config = result.unwrap();
        assert_eq!(config.rate_limit.max_requests, 25);
    }

    #[test]
    fn test_signing_secret_and_redis_from_environment() {
        let _guard = ENV_MUTEX.lock().unwrap();
        set_minimal_env();
        env::set_var("PAYMENT_WEBHOOKS__WEBHOOK__SIGNING_SECRET", "whsec_test");
        env::set_var("PAYMENT_WEBHOOKS__REDIS__URL", "redis://localhost:6379");
        let result = AppConfig::load();
        clear_env();

        let config = result.unwrap();
        let secret = config.webhook.signing_secret.as_ref().unwrap();
        assert_eq!(secret.expose_secret(), "whsec_test");
        assert_eq!(config.redis.url(), Some("redis://localhost:6379"));
    }

    #[test]
    fn test_is_production() {
        let _guard = ENV_MUTEX.lock().unwrap();
        set_minimal_env();
        env::set_var("PAYMENT_WEBHOOKS__SERVER__ENVIRONMENT", "production");
        let result = AppConfig::load();
        clear_env();

        let config = result.unwrap();
        assert!(config.is_production());
    }

    #[test]
    fn test_custom_listen_addr() {
        let _guard = ENV_MUTEX.lock().unwrap();
        set_minimal_env();
        env::set_var("PAYMENT_WEBHOOKS__SERVER__LISTEN_ADDR", "127.0.0.1:3000");
        let result = AppConfig::load();
        clear_env();

        let config = result.unwrap();
        assert_eq!(config.server.socket_addr().unwrap().port(), 3000);
    }

    #[test]
    fn test_request_timeout_must_outlast_store_timeout() {
        let _guard = ENV_MUTEX.lock().unwrap();
        set_minimal_env();
        env::set_var("PAYMENT_WEBHOOKS__SERVER__REQUEST_TIMEOUT_SECS", "5");
        env::set_var("PAYMENT_WEBHOOKS__DATABASE__STORE_TIMEOUT_MS", "5000");
        let result = AppConfig::load();
        clear_env();

        let config = result.unwrap();
        assert_eq!(
            config.validate(),
            Err(ValidationError::RequestTimeoutBelowStoreTimeout)
        );
    }

    #[test]
    fn test_missing_database_url_fails_to_load() {
        let _guard = ENV_MUTEX.lock().unwrap();
        clear_env();
        assert!(AppConfig::load().is_err());
    }
}
