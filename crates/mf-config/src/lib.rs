//! MarketFlow Configuration System
//!
//! This crate provides TOML-based configuration with environment variable override support.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

mod loader;

pub use loader::ConfigLoader;

/// Configuration error types
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    ValidationError(String),

    #[error("Environment variable error: {0}")]
    EnvError(String),
}

/// Root application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub http: HttpConfig,
    pub mongodb: MongoConfig,
    pub redis: RedisConfig,
    pub store: StoreConfig,
    pub dispatch: DispatchConfig,
    pub escrow: EscrowConfig,
    pub sweeper: SweeperConfig,
    pub outbox: OutboxConfig,
    pub notify: NotifyConfig,

    /// Enable development mode (embedded store, no external collaborators)
    pub dev_mode: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            http: HttpConfig::default(),
            mongodb: MongoConfig::default(),
            redis: RedisConfig::default(),
            store: StoreConfig::default(),
            dispatch: DispatchConfig::default(),
            escrow: EscrowConfig::default(),
            sweeper: SweeperConfig::default(),
            outbox: OutboxConfig::default(),
            notify: NotifyConfig::default(),
            dev_mode: false,
        }
    }
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub port: u16,
    pub host: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            host: "0.0.0.0".to_string(),
        }
    }
}

/// MongoDB configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MongoConfig {
    pub uri: String,
    pub database: String,
}

impl Default for MongoConfig {
    fn default() -> Self {
        Self {
            uri: "mongodb://localhost:27017/?replicaSet=rs0&directConnection=true".to_string(),
            database: "marketflow".to_string(),
        }
    }
}

/// Redis configuration (realtime broadcast channel)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RedisConfig {
    pub url: String,
    /// Prefix prepended to broadcast channel names
    pub channel_prefix: String,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: "redis://localhost:6379".to_string(),
            channel_prefix: "marketflow".to_string(),
        }
    }
}

/// Durable store selection
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Store backend: mongodb or embedded
    pub backend: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: "mongodb".to_string(),
        }
    }
}

/// Dispatch offer engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// Default broadcast mode: sequential or parallel
    pub default_mode: String,
    /// Offer time-to-live before the sweeper expires it, in seconds
    pub offer_ttl_seconds: u64,
    /// What to do when the candidate pool is exhausted: expire or rebroadcast
    pub exhaustion_policy: String,
    /// Maximum rebroadcast rounds when exhaustion_policy = rebroadcast
    pub rebroadcast_limit: u32,
    /// Candidate ranking criteria, applied in order:
    /// availability_recency, tier, zone_proximity
    pub ranking: Vec<String>,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            default_mode: "parallel".to_string(),
            offer_ttl_seconds: 120,
            exhaustion_policy: "expire".to_string(),
            rebroadcast_limit: 2,
            ranking: vec![
                "availability_recency".to_string(),
                "tier".to_string(),
                "zone_proximity".to_string(),
            ],
        }
    }
}

/// Escrow release engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EscrowConfig {
    /// Default hold period before funds become releasable, in hours
    pub hold_period_hours: u64,
}

impl Default for EscrowConfig {
    fn default() -> Self {
        Self {
            hold_period_hours: 72,
        }
    }
}

/// Background sweeper configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SweeperConfig {
    /// Enable the sweepers
    pub enabled: bool,
    /// Offer expiry sweep interval in milliseconds
    pub offer_poll_interval_ms: u64,
    /// Escrow maturity sweep interval in milliseconds
    pub escrow_poll_interval_ms: u64,
    /// Batch size per sweep
    pub batch_size: usize,
}

impl Default for SweeperConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            offer_poll_interval_ms: 5_000,
            escrow_poll_interval_ms: 60_000,
            batch_size: 100,
        }
    }
}

/// Outbox processor configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutboxConfig {
    /// Polling interval in milliseconds
    pub poll_interval_ms: u64,
    /// Batch size per poll
    pub batch_size: u32,
    /// Delivery attempts before an item is parked as failed
    pub max_retries: i32,
    /// Items stuck InProgress longer than this are reset to Pending
    pub stuck_timeout_seconds: u64,
}

impl Default for OutboxConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 500,
            batch_size: 50,
            max_retries: 5,
            stuck_timeout_seconds: 300,
        }
    }
}

/// Notifier collaborator configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NotifyConfig {
    /// Webhook endpoint of the push/SMS gateway
    pub webhook_url: String,
    /// Shared key for HMAC payload signatures (empty disables signing)
    pub signing_key: String,
    /// Connect timeout in seconds
    pub connect_timeout_seconds: u64,
    /// Request timeout in seconds
    pub request_timeout_seconds: u64,
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            webhook_url: "http://localhost:8090/api/notifications".to_string(),
            signing_key: String::new(),
            connect_timeout_seconds: 10,
            request_timeout_seconds: 30,
        }
    }
}

impl AppConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: AppConfig = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration with environment variable override
    pub fn load() -> Result<Self, ConfigError> {
        let loader = ConfigLoader::new();
        loader.load()
    }

    /// Validate cross-field constraints
    pub fn validate(&self) -> Result<(), ConfigError> {
        match self.store.backend.as_str() {
            "mongodb" | "embedded" => {}
            other => {
                return Err(ConfigError::ValidationError(format!(
                    "Unknown store backend '{}' (expected mongodb or embedded)",
                    other
                )));
            }
        }
        match self.dispatch.default_mode.as_str() {
            "sequential" | "parallel" => {}
            other => {
                return Err(ConfigError::ValidationError(format!(
                    "Unknown broadcast mode '{}' (expected sequential or parallel)",
                    other
                )));
            }
        }
        match self.dispatch.exhaustion_policy.as_str() {
            "expire" | "rebroadcast" => {}
            other => {
                return Err(ConfigError::ValidationError(format!(
                    "Unknown exhaustion policy '{}' (expected expire or rebroadcast)",
                    other
                )));
            }
        }
        if self.dispatch.offer_ttl_seconds == 0 {
            return Err(ConfigError::ValidationError(
                "dispatch.offer_ttl_seconds must be greater than zero".to_string(),
            ));
        }
        if self.sweeper.batch_size == 0 {
            return Err(ConfigError::ValidationError(
                "sweeper.batch_size must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Generate an example TOML configuration
    pub fn example_toml() -> String {
        r#"# MarketFlow Configuration
# Environment variables override these settings

[http]
port = 8080
host = "0.0.0.0"

[mongodb]
uri = "mongodb://localhost:27017/?replicaSet=rs0&directConnection=true"
database = "marketflow"

[redis]
url = "redis://localhost:6379"
channel_prefix = "marketflow"

[store]
backend = "mongodb"  # mongodb or embedded

[dispatch]
default_mode = "parallel"  # sequential or parallel
offer_ttl_seconds = 120
exhaustion_policy = "expire"  # expire or rebroadcast
rebroadcast_limit = 2
ranking = ["availability_recency", "tier", "zone_proximity"]

[escrow]
hold_period_hours = 72

[sweeper]
enabled = true
offer_poll_interval_ms = 5000
escrow_poll_interval_ms = 60000
batch_size = 100

[outbox]
poll_interval_ms = 500
batch_size = 50
max_retries = 5
stuck_timeout_seconds = 300

[notify]
webhook_url = "http://localhost:8090/api/notifications"
signing_key = ""
connect_timeout_seconds = 10
request_timeout_seconds = 30

dev_mode = false
"#
        .to_string()
    }
}
