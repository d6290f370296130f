//! Escrow Domain Events

use serde::{Deserialize, Serialize};

use crate::impl_domain_event;
use crate::usecase::domain_event::EventMetadata;
use crate::usecase::ExecutionContext;

const SOURCE: &str = "marketflow:escrow";

fn hold_subject(hold_id: &str) -> String {
    format!("escrow.hold.{}", hold_id)
}

fn order_group(order_id: &str) -> String {
    format!("fulfillment:order:{}", order_id)
}

/// Event emitted when held funds are credited to the seller.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HoldReleased {
    #[serde(flatten)]
    pub metadata: EventMetadata,

    pub hold_id: String,
    pub order_id: String,
    pub seller_account_id: String,
    pub amount_minor: i64,
    /// Whether an authorized caller bypassed the timing conditions
    pub overridden: bool,
}

impl_domain_event!(HoldReleased);

impl HoldReleased {
    const EVENT_TYPE: &'static str = "marketflow:escrow:hold:released";

    pub fn new(
        ctx: &ExecutionContext,
        hold_id: &str,
        order_id: &str,
        seller_account_id: &str,
        amount_minor: i64,
        overridden: bool,
    ) -> Self {
        Self {
            metadata: EventMetadata::from_context(
                ctx,
                Self::EVENT_TYPE,
                SOURCE,
                hold_subject(hold_id),
                order_group(order_id),
            ),
            hold_id: hold_id.to_string(),
            order_id: order_id.to_string(),
            seller_account_id: seller_account_id.to_string(),
            amount_minor,
            overridden,
        }
    }
}

/// Event emitted when an administrator freezes a hold.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HoldFrozen {
    #[serde(flatten)]
    pub metadata: EventMetadata,

    pub hold_id: String,
    pub order_id: String,
    pub reason: String,
}

impl_domain_event!(HoldFrozen);

impl HoldFrozen {
    const EVENT_TYPE: &'static str = "marketflow:escrow:hold:frozen";

    pub fn new(ctx: &ExecutionContext, hold_id: &str, order_id: &str, reason: &str) -> Self {
        Self {
            metadata: EventMetadata::from_context(
                ctx,
                Self::EVENT_TYPE,
                SOURCE,
                hold_subject(hold_id),
                order_group(order_id),
            ),
            hold_id: hold_id.to_string(),
            order_id: order_id.to_string(),
            reason: reason.to_string(),
        }
    }
}

/// Event emitted when held funds are returned to the buyer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HoldRefunded {
    #[serde(flatten)]
    pub metadata: EventMetadata,

    pub hold_id: String,
    pub order_id: String,
    pub buyer_account_id: String,
    pub amount_minor: i64,
}

impl_domain_event!(HoldRefunded);

impl HoldRefunded {
    const EVENT_TYPE: &'static str = "marketflow:escrow:hold:refunded";

    pub fn new(
        ctx: &ExecutionContext,
        hold_id: &str,
        order_id: &str,
        buyer_account_id: &str,
        amount_minor: i64,
    ) -> Self {
        Self {
            metadata: EventMetadata::from_context(
                ctx,
                Self::EVENT_TYPE,
                SOURCE,
                hold_subject(hold_id),
                order_group(order_id),
            ),
            hold_id: hold_id.to_string(),
            order_id: order_id.to_string(),
            buyer_account_id: buyer_account_id.to_string(),
            amount_minor,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::usecase::DomainEvent;

    #[test]
    fn test_hold_released_event() {
        let ctx = ExecutionContext::create("admin-1");
        let event = HoldReleased::new(&ctx, "hold-1", "order-1", "seller-1", 12_500, false);

        assert_eq!(event.event_type(), "marketflow:escrow:hold:released");
        assert_eq!(event.subject(), "escrow.hold.hold-1");
        assert_eq!(event.message_group(), "fulfillment:order:order-1");
        assert_eq!(event.amount_minor, 12_500);
    }

    #[test]
    fn test_hold_frozen_event() {
        let ctx = ExecutionContext::create("admin-1");
        let event = HoldFrozen::new(&ctx, "hold-1", "order-1", "chargeback investigation");

        assert_eq!(event.event_type(), "marketflow:escrow:hold:frozen");
        assert_eq!(event.reason, "chargeback investigation");
    }
}
