//! Configuration loader with file and environment variable support

use crate::{AppConfig, ConfigError};
use std::env;
use std::path::PathBuf;
use tracing::info;

/// Standard config file search paths
const CONFIG_PATHS: &[&str] = &[
    "config.toml",
    "application.toml",
    "marketflow.toml",
    "./config/config.toml",
    "./config/application.toml",
    "/etc/marketflow/config.toml",
];

/// Configuration loader
pub struct ConfigLoader {
    config_path: Option<PathBuf>,
}

impl ConfigLoader {
    /// Create a new configuration loader
    pub fn new() -> Self {
        Self { config_path: None }
    }

    /// Create a loader with a specific config file path
    pub fn with_path<P: Into<PathBuf>>(path: P) -> Self {
        Self {
            config_path: Some(path.into()),
        }
    }

    /// Load configuration from file (if found) with environment variable overrides
    pub fn load(&self) -> Result<AppConfig, ConfigError> {
        // Start with defaults
        let mut config = AppConfig::default();

        // Try to load from file
        if let Some(path) = self.find_config_file() {
            info!(?path, "Loading configuration from file");
            config = AppConfig::from_file(&path)?;
        }

        // Apply environment variable overrides
        self.apply_env_overrides(&mut config);

        config.validate()?;
        Ok(config)
    }

    /// Find the configuration file to use
    fn find_config_file(&self) -> Option<PathBuf> {
        // Check explicit path first
        if let Some(path) = &self.config_path {
            if path.exists() {
                return Some(path.clone());
            }
        }

        // Check MARKETFLOW_CONFIG env var
        if let Ok(path) = env::var("MARKETFLOW_CONFIG") {
            let path = PathBuf::from(path);
            if path.exists() {
                return Some(path);
            }
        }

        // Search standard paths
        for path in CONFIG_PATHS {
            let path = PathBuf::from(path);
            if path.exists() {
                return Some(path);
            }
        }

        None
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&self, config: &mut AppConfig) {
        // HTTP
        if let Ok(val) = env::var("MARKETFLOW_HTTP_PORT") {
            if let Ok(port) = val.parse() {
                config.http.port = port;
            }
        }
        if let Ok(val) = env::var("MARKETFLOW_HTTP_HOST") {
            config.http.host = val;
        }

        // MongoDB
        if let Ok(val) = env::var("MARKETFLOW_MONGODB_URI") {
            config.mongodb.uri = val;
        }
        if let Ok(val) = env::var("MARKETFLOW_MONGODB_DATABASE") {
            config.mongodb.database = val;
        }

        // Redis
        if let Ok(val) = env::var("MARKETFLOW_REDIS_URL") {
            config.redis.url = val;
        }
        if let Ok(val) = env::var("MARKETFLOW_REDIS_CHANNEL_PREFIX") {
            config.redis.channel_prefix = val;
        }

        // Store
        if let Ok(val) = env::var("MARKETFLOW_STORE_BACKEND") {
            config.store.backend = val;
        }

        // Dispatch
        if let Ok(val) = env::var("MARKETFLOW_DISPATCH_MODE") {
            config.dispatch.default_mode = val;
        }
        if let Ok(val) = env::var("MARKETFLOW_DISPATCH_OFFER_TTL_SECONDS") {
            if let Ok(ttl) = val.parse() {
                config.dispatch.offer_ttl_seconds = ttl;
            }
        }
        if let Ok(val) = env::var("MARKETFLOW_DISPATCH_EXHAUSTION_POLICY") {
            config.dispatch.exhaustion_policy = val;
        }
        if let Ok(val) = env::var("MARKETFLOW_DISPATCH_REBROADCAST_LIMIT") {
            if let Ok(limit) = val.parse() {
                config.dispatch.rebroadcast_limit = limit;
            }
        }

        // Escrow
        if let Ok(val) = env::var("MARKETFLOW_ESCROW_HOLD_PERIOD_HOURS") {
            if let Ok(hours) = val.parse() {
                config.escrow.hold_period_hours = hours;
            }
        }

        // Sweeper
        if let Ok(val) = env::var("MARKETFLOW_SWEEPER_ENABLED") {
            config.sweeper.enabled = val.parse().unwrap_or(true);
        }
        if let Ok(val) = env::var("MARKETFLOW_SWEEPER_OFFER_POLL_INTERVAL_MS") {
            if let Ok(interval) = val.parse() {
                config.sweeper.offer_poll_interval_ms = interval;
            }
        }
        if let Ok(val) = env::var("MARKETFLOW_SWEEPER_ESCROW_POLL_INTERVAL_MS") {
            if let Ok(interval) = val.parse() {
                config.sweeper.escrow_poll_interval_ms = interval;
            }
        }
        if let Ok(val) = env::var("MARKETFLOW_SWEEPER_BATCH_SIZE") {
            if let Ok(size) = val.parse() {
                config.sweeper.batch_size = size;
            }
        }

        // Outbox
        if let Ok(val) = env::var("MARKETFLOW_OUTBOX_POLL_INTERVAL_MS") {
            if let Ok(interval) = val.parse() {
                config.outbox.poll_interval_ms = interval;
            }
        }
        if let Ok(val) = env::var("MARKETFLOW_OUTBOX_BATCH_SIZE") {
            if let Ok(size) = val.parse() {
                config.outbox.batch_size = size;
            }
        }
        if let Ok(val) = env::var("MARKETFLOW_OUTBOX_MAX_RETRIES") {
            if let Ok(retries) = val.parse() {
                config.outbox.max_retries = retries;
            }
        }

        // Notify
        if let Ok(val) = env::var("MARKETFLOW_NOTIFY_WEBHOOK_URL") {
            config.notify.webhook_url = val;
        }
        if let Ok(val) = env::var("MARKETFLOW_NOTIFY_SIGNING_KEY") {
            config.notify.signing_key = val;
        }

        // General
        if let Ok(val) = env::var("MARKETFLOW_DEV_MODE") {
            config.dev_mode = val.parse().unwrap_or(false);
        }
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}
