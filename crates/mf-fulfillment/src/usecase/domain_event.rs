//! Domain Event Trait
//!
//! Base trait for all domain events. Events follow the CloudEvents
//! specification structure with additional fields for tracing and ordering.
//! Events reach the outside world through the outbox: operations serialize
//! them into notification and broadcast items that are written in the same
//! transaction as the state change.

use chrono::{DateTime, Utc};
use mf_common::OutboxItem;
use serde::{Deserialize, Serialize};

/// Base trait for all domain events.
///
/// Domain events represent facts about what happened in the domain
/// (past tense): `OfferAccepted`, not `AcceptOffer`.
///
/// # Event Type Format
///
/// The event type follows the format: `{app}:{domain}:{aggregate}:{action}`
/// Example: `marketflow:fulfillment:offer:accepted`
///
/// # Subject Format
///
/// The subject is a qualified aggregate identifier: `{domain}.{aggregate}.{id}`
/// Example: `fulfillment.job.0HZXEQ5Y8JY5Z`
///
/// # Message Group
///
/// Events in the same message group are delivered in order. The group is
/// keyed by the owning order so all fulfillment traffic for one order
/// stays sequenced: `fulfillment:order:{order_id}`
pub trait DomainEvent: Send + Sync {
    /// Unique identifier for this event (TSID Crockford Base32 string).
    fn event_id(&self) -> &str;

    /// Event type code following the format: `{app}:{domain}:{aggregate}:{action}`
    fn event_type(&self) -> &str;

    /// Source system that generated this event.
    fn source(&self) -> &str;

    /// Qualified aggregate identifier: `{domain}.{aggregate}.{id}`
    fn subject(&self) -> &str;

    /// When the event occurred.
    fn time(&self) -> DateTime<Utc>;

    /// Execution ID for tracking a single use case execution.
    fn execution_id(&self) -> &str;

    /// Correlation ID for distributed tracing.
    fn correlation_id(&self) -> &str;

    /// ID of the event that caused this event (if any).
    fn causation_id(&self) -> Option<&str>;

    /// Principal who initiated the action that produced this event.
    fn principal_id(&self) -> &str;

    /// Message group for ordering guarantees.
    fn message_group(&self) -> &str;

    /// Serialize the event (metadata flattened with the payload) to JSON.
    fn to_data_json(&self) -> serde_json::Value;
}

/// Common metadata for domain events.
///
/// Event implementations include this as a flattened field and delegate
/// the trait methods to it via `impl_domain_event!`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventMetadata {
    pub event_id: String,
    pub event_type: String,
    pub source: String,
    pub subject: String,
    pub time: DateTime<Utc>,
    pub execution_id: String,
    pub correlation_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub causation_id: Option<String>,
    pub principal_id: String,
    pub message_group: String,
}

impl EventMetadata {
    /// Create event metadata from an execution context.
    pub fn from_context(
        ctx: &super::ExecutionContext,
        event_type: &str,
        source: &str,
        subject: String,
        message_group: String,
    ) -> Self {
        Self {
            event_id: mf_common::TsidGenerator::generate(),
            event_type: event_type.to_string(),
            source: source.to_string(),
            subject,
            time: Utc::now(),
            execution_id: ctx.execution_id.clone(),
            correlation_id: ctx.correlation_id.clone(),
            causation_id: ctx.causation_id.clone(),
            principal_id: ctx.principal_id.clone(),
            message_group,
        }
    }
}

/// Channel carrying realtime updates for one order.
pub fn order_channel(order_id: &str) -> String {
    format!("order.{}", order_id)
}

/// Build a notification outbox item carrying the full event envelope.
pub fn notification_item<E>(event: &E, target: &str) -> OutboxItem
where
    E: DomainEvent,
{
    OutboxItem::notification(
        target,
        Some(event.message_group().to_string()),
        event.to_data_json(),
    )
}

/// Build a broadcast outbox item: a flat key-value snapshot of the changed
/// entity, tagged with the event type, published on the given channel.
pub fn broadcast_item<E>(event: &E, channel: &str, mut snapshot: serde_json::Value) -> OutboxItem
where
    E: DomainEvent,
{
    if let Some(map) = snapshot.as_object_mut() {
        map.insert(
            "event".to_string(),
            serde_json::Value::String(event.event_type().to_string()),
        );
        map.insert(
            "eventId".to_string(),
            serde_json::Value::String(event.event_id().to_string()),
        );
    }
    OutboxItem::broadcast(channel, Some(event.message_group().to_string()), snapshot)
}

/// Helper macro for implementing the DomainEvent trait.
///
/// Generates the trait implementation by delegating to an
/// `EventMetadata` field named `metadata`.
#[macro_export]
macro_rules! impl_domain_event {
    ($event_type:ty) => {
        impl $crate::usecase::DomainEvent for $event_type {
            fn event_id(&self) -> &str {
                &self.metadata.event_id
            }

            fn event_type(&self) -> &str {
                &self.metadata.event_type
            }

            fn source(&self) -> &str {
                &self.metadata.source
            }

            fn subject(&self) -> &str {
                &self.metadata.subject
            }

            fn time(&self) -> chrono::DateTime<chrono::Utc> {
                self.metadata.time
            }

            fn execution_id(&self) -> &str {
                &self.metadata.execution_id
            }

            fn correlation_id(&self) -> &str {
                &self.metadata.correlation_id
            }

            fn causation_id(&self) -> Option<&str> {
                self.metadata.causation_id.as_deref()
            }

            fn principal_id(&self) -> &str {
                &self.metadata.principal_id
            }

            fn message_group(&self) -> &str {
                &self.metadata.message_group
            }

            fn to_data_json(&self) -> serde_json::Value {
                serde_json::to_value(self).unwrap_or_else(|_| serde_json::json!({}))
            }
        }
    };
}
