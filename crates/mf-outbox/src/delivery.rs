//! Delivery Collaborators
//!
//! The notifier (push/SMS gateway webhook) and the realtime broadcaster
//! (Redis pub/sub) the outbox processor hands items to. Delivery is
//! best-effort: a failure here is recorded on the outbox item and retried
//! there, and never touches domain state.

use std::time::Duration;

use async_trait::async_trait;
use hmac::{Hmac, Mac};
use mf_common::OutboxStatus;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use serde::Serialize;
use sha2::Sha256;
use tracing::{debug, error, warn};

type HmacSha256 = Hmac<Sha256>;

/// Result of one delivery attempt.
#[derive(Debug, Clone)]
pub enum DeliveryResult {
    Delivered,
    Failed {
        /// Failure class; `is_retryable` decides whether the item returns
        /// to the pending queue
        status: OutboxStatus,
        error: String,
    },
}

impl DeliveryResult {
    pub fn failed(status: OutboxStatus, error: impl Into<String>) -> Self {
        Self::Failed {
            status,
            error: error.into(),
        }
    }
}

/// Push/SMS delivery collaborator.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, target: &str, payload: &serde_json::Value) -> DeliveryResult;
}

/// Realtime pub/sub collaborator for client-facing live updates.
#[async_trait]
pub trait Broadcaster: Send + Sync {
    async fn publish(&self, channel: &str, snapshot: &serde_json::Value) -> DeliveryResult;
}

// ============================================================================
// Webhook Notifier
// ============================================================================

/// Webhook notifier configuration
#[derive(Debug, Clone)]
pub struct WebhookNotifierConfig {
    /// Notification gateway endpoint
    pub webhook_url: String,
    /// Shared key for HMAC payload signatures (empty disables signing)
    pub signing_key: String,
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
}

impl Default for WebhookNotifierConfig {
    fn default() -> Self {
        Self {
            webhook_url: "http://localhost:8090/api/notifications".to_string(),
            signing_key: String::new(),
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
        }
    }
}

/// Request body posted to the notification gateway
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct NotificationRequest<'a> {
    target: &'a str,
    payload: &'a serde_json::Value,
}

/// HTTP notifier that posts notifications to the gateway webhook.
pub struct WebhookNotifier {
    config: WebhookNotifierConfig,
    client: reqwest::Client,
}

impl WebhookNotifier {
    pub fn new(config: WebhookNotifierConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .timeout(config.request_timeout)
            .build()?;
        Ok(Self { config, client })
    }

    /// HMAC-SHA256 signature over the request body, hex encoded.
    fn sign(&self, body: &[u8]) -> Option<String> {
        if self.config.signing_key.is_empty() {
            return None;
        }
        let mut mac = HmacSha256::new_from_slice(self.config.signing_key.as_bytes()).ok()?;
        mac.update(body);
        Some(hex::encode(mac.finalize().into_bytes()))
    }

    fn status_for(code: u16) -> OutboxStatus {
        match code {
            400 => OutboxStatus::BadRequest,
            401 => OutboxStatus::Unauthorized,
            403 => OutboxStatus::Forbidden,
            502 | 503 | 504 => OutboxStatus::GatewayError,
            _ => OutboxStatus::InternalError,
        }
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn notify(&self, target: &str, payload: &serde_json::Value) -> DeliveryResult {
        let request_body = NotificationRequest { target, payload };
        let body = match serde_json::to_vec(&request_body) {
            Ok(body) => body,
            Err(e) => {
                return DeliveryResult::failed(
                    OutboxStatus::BadRequest,
                    format!("Serialization failed: {}", e),
                );
            }
        };

        let mut request = self
            .client
            .post(&self.config.webhook_url)
            .header("Content-Type", "application/json")
            .body(body.clone());

        if let Some(signature) = self.sign(&body) {
            request = request.header("X-MarketFlow-Signature", signature);
        }

        match request.send().await {
            Ok(response) => {
                let status = response.status();
                if status.is_success() {
                    debug!(target = %target, "Notification delivered");
                    DeliveryResult::Delivered
                } else {
                    let error_body = response.text().await.unwrap_or_default();
                    warn!(target = %target, status = %status, "Notification rejected");
                    DeliveryResult::failed(
                        Self::status_for(status.as_u16()),
                        format!("HTTP {}: {}", status, error_body),
                    )
                }
            }
            Err(e) => {
                error!(target = %target, error = %e, "Notification request failed");
                DeliveryResult::failed(OutboxStatus::GatewayError, e.to_string())
            }
        }
    }
}

// ============================================================================
// Redis Broadcaster
// ============================================================================

/// Redis pub/sub broadcaster for client-facing live updates.
pub struct RedisBroadcaster {
    connection: ConnectionManager,
    channel_prefix: String,
}

impl RedisBroadcaster {
    pub async fn connect(url: &str, channel_prefix: impl Into<String>) -> anyhow::Result<Self> {
        let client = redis::Client::open(url)?;
        let connection = ConnectionManager::new(client).await?;
        Ok(Self {
            connection,
            channel_prefix: channel_prefix.into(),
        })
    }

    fn channel_name(&self, channel: &str) -> String {
        if self.channel_prefix.is_empty() {
            channel.to_string()
        } else {
            format!("{}:{}", self.channel_prefix, channel)
        }
    }
}

#[async_trait]
impl Broadcaster for RedisBroadcaster {
    async fn publish(&self, channel: &str, snapshot: &serde_json::Value) -> DeliveryResult {
        let body = match serde_json::to_string(snapshot) {
            Ok(body) => body,
            Err(e) => {
                return DeliveryResult::failed(
                    OutboxStatus::BadRequest,
                    format!("Serialization failed: {}", e),
                );
            }
        };

        let mut connection = self.connection.clone();
        let channel = self.channel_name(channel);
        match connection.publish::<_, _, i64>(&channel, body).await {
            Ok(receivers) => {
                debug!(channel = %channel, receivers = receivers, "Snapshot broadcast");
                DeliveryResult::Delivered
            }
            Err(e) => {
                error!(channel = %channel, error = %e, "Broadcast publish failed");
                DeliveryResult::failed(OutboxStatus::GatewayError, e.to_string())
            }
        }
    }
}

// ============================================================================
// Dev-Mode Collaborators
// ============================================================================

/// Notifier that only logs; used in dev mode.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, target: &str, _payload: &serde_json::Value) -> DeliveryResult {
        tracing::info!(target = %target, "DEV: Notification delivered");
        DeliveryResult::Delivered
    }
}

/// In-process broadcaster over a tokio broadcast channel; used in dev mode
/// and tests.
pub struct ChannelBroadcaster {
    sender: tokio::sync::broadcast::Sender<(String, serde_json::Value)>,
}

impl ChannelBroadcaster {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = tokio::sync::broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(
        &self,
    ) -> tokio::sync::broadcast::Receiver<(String, serde_json::Value)> {
        self.sender.subscribe()
    }
}

#[async_trait]
impl Broadcaster for ChannelBroadcaster {
    async fn publish(&self, channel: &str, snapshot: &serde_json::Value) -> DeliveryResult {
        // A send error just means nobody is listening
        let _ = self.sender.send((channel.to_string(), snapshot.clone()));
        DeliveryResult::Delivered
    }
}
