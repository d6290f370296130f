use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub mod logging;
pub mod tsid;

pub use tsid::TsidGenerator;

// ============================================================================
// Outbox Types
// ============================================================================

/// Outbox item status, stored as an integer code in the database.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutboxStatus {
    /// Item is pending delivery (code: 0)
    Pending,
    /// Item was delivered successfully (code: 1)
    Success,
    /// Collaborator rejected the payload - won't retry (code: 2)
    BadRequest,
    /// Collaborator-side error - will retry (code: 3)
    InternalError,
    /// Authentication failed at the collaborator - will retry (code: 4)
    Unauthorized,
    /// Permission denied - won't retry (code: 5)
    Forbidden,
    /// Collaborator unreachable - will retry (code: 6)
    GatewayError,
    /// Currently being delivered (code: 9)
    InProgress,
}

impl OutboxStatus {
    /// Convert status to integer code for database storage
    pub fn code(&self) -> i32 {
        match self {
            OutboxStatus::Pending => 0,
            OutboxStatus::Success => 1,
            OutboxStatus::BadRequest => 2,
            OutboxStatus::InternalError => 3,
            OutboxStatus::Unauthorized => 4,
            OutboxStatus::Forbidden => 5,
            OutboxStatus::GatewayError => 6,
            OutboxStatus::InProgress => 9,
        }
    }

    /// Create status from integer code, defaulting to Pending for unknown codes
    pub fn from_code(code: i32) -> Self {
        match code {
            0 => OutboxStatus::Pending,
            1 => OutboxStatus::Success,
            2 => OutboxStatus::BadRequest,
            3 => OutboxStatus::InternalError,
            4 => OutboxStatus::Unauthorized,
            5 => OutboxStatus::Forbidden,
            6 => OutboxStatus::GatewayError,
            9 => OutboxStatus::InProgress,
            _ => OutboxStatus::Pending,
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            OutboxStatus::InternalError
                | OutboxStatus::Unauthorized
                | OutboxStatus::GatewayError
                | OutboxStatus::InProgress
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OutboxStatus::Success | OutboxStatus::BadRequest | OutboxStatus::Forbidden
        )
    }
}

impl Default for OutboxStatus {
    fn default() -> Self {
        OutboxStatus::Pending
    }
}

// Persisted as the integer code so every backend can filter on it directly
impl Serialize for OutboxStatus {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_i32(self.code())
    }
}

impl<'de> Deserialize<'de> for OutboxStatus {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let code = i32::deserialize(deserializer)?;
        Ok(OutboxStatus::from_code(code))
    }
}

/// Outbox item type - determines which collaborator delivers the item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OutboxItemType {
    /// Push/SMS notification to a rider or user
    Notification,
    /// Realtime pub/sub broadcast of an entity snapshot
    Broadcast,
}

impl std::fmt::Display for OutboxItemType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutboxItemType::Notification => write!(f, "NOTIFICATION"),
            OutboxItemType::Broadcast => write!(f, "BROADCAST"),
        }
    }
}

/// A pending side effect, appended in the same transaction as the state
/// change that produced it and delivered later by the outbox processor.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutboxItem {
    /// Unique identifier (TSID Crockford Base32)
    #[serde(rename = "_id")]
    pub id: String,
    /// Notification or Broadcast
    pub item_type: OutboxItemType,
    /// Rider/user identity for notifications, channel name for broadcasts
    pub target: String,
    /// Ordering group (order id), for consumers that care about sequence
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_group: Option<String>,
    /// JSON payload; a flat key-value snapshot for broadcast items
    pub payload: serde_json::Value,
    /// Current status (integer-coded in the database)
    pub status: OutboxStatus,
    /// Number of delivery attempts that failed so far
    pub retry_count: i32,
    /// Error message from the last failed attempt
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(with = "bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
    #[serde(
        skip_serializing_if = "Option::is_none",
        default,
        with = "bson::serde_helpers::chrono_datetime_as_bson_datetime_optional"
    )]
    pub updated_at: Option<DateTime<Utc>>,
}

impl OutboxItem {
    /// Create a pending notification item for a rider or user.
    pub fn notification(
        target: impl Into<String>,
        message_group: Option<String>,
        payload: serde_json::Value,
    ) -> Self {
        Self::new(OutboxItemType::Notification, target, message_group, payload)
    }

    /// Create a pending broadcast item for a pub/sub channel.
    pub fn broadcast(
        channel: impl Into<String>,
        message_group: Option<String>,
        snapshot: serde_json::Value,
    ) -> Self {
        Self::new(OutboxItemType::Broadcast, channel, message_group, snapshot)
    }

    fn new(
        item_type: OutboxItemType,
        target: impl Into<String>,
        message_group: Option<String>,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            id: TsidGenerator::generate(),
            item_type,
            target: target.into(),
            message_group,
            payload,
            status: OutboxStatus::Pending,
            retry_count: 0,
            error_message: None,
            created_at: Utc::now(),
            updated_at: None,
        }
    }
}

// ============================================================================
// Outbox Repository
// ============================================================================

/// Persistence surface consumed by the outbox processor.
///
/// Appending items is not part of this trait: items are written by the
/// fulfillment stores inside the same transaction as the state change
/// they describe.
#[async_trait]
pub trait OutboxRepository: Send + Sync {
    /// Fetch pending items, oldest first
    async fn fetch_pending(&self, limit: u32) -> anyhow::Result<Vec<OutboxItem>>;

    /// Mark items as InProgress before delivery
    async fn mark_in_progress(&self, ids: Vec<String>) -> anyhow::Result<()>;

    /// Record the delivery outcome for items
    async fn mark_with_status(
        &self,
        ids: Vec<String>,
        status: OutboxStatus,
        error_message: Option<String>,
    ) -> anyhow::Result<()>;

    /// Increment retry count and reset to Pending for another attempt
    async fn increment_retry(&self, ids: Vec<String>) -> anyhow::Result<()>;

    /// Fetch items stuck InProgress for longer than `timeout`
    async fn fetch_stuck(&self, timeout: Duration, limit: u32) -> anyhow::Result<Vec<OutboxItem>>;

    /// Reset stuck items back to Pending
    async fn reset_stuck(&self, ids: Vec<String>) -> anyhow::Result<()>;
}

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum MarketFlowError {
    #[error("Store error: {0}")]
    Store(String),

    #[error("Outbox error: {0}")]
    Outbox(String),

    #[error("Notification error: {0}")]
    Notify(String),

    #[error("Broadcast error: {0}")]
    Broadcast(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Shutdown in progress")]
    ShutdownInProgress,
}

pub type Result<T> = std::result::Result<T, MarketFlowError>;
