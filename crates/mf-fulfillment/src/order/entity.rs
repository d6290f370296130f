//! Order, Shipment and Dispute Snapshots

use bson::serde_helpers::chrono_datetime_as_bson_datetime;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Order lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    Placed,
    Paid,
    AcceptedBySeller,
    Dispatching,
    AssignedToRider,
    PickedUp,
    Delivered,
    Confirmed,
    Cancelled,
    Disputed,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Placed => "PLACED",
            OrderStatus::Paid => "PAID",
            OrderStatus::AcceptedBySeller => "ACCEPTED_BY_SELLER",
            OrderStatus::Dispatching => "DISPATCHING",
            OrderStatus::AssignedToRider => "ASSIGNED_TO_RIDER",
            OrderStatus::PickedUp => "PICKED_UP",
            OrderStatus::Delivered => "DELIVERED",
            OrderStatus::Confirmed => "CONFIRMED",
            OrderStatus::Cancelled => "CANCELLED",
            OrderStatus::Disputed => "DISPUTED",
        }
    }
}

/// How the order reaches the buyer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FulfillmentMode {
    /// Delivered by a rider from the local pool
    LocalAgent,
    /// Shipped by a carrier; release additionally requires the shipment
    /// to be delivered
    Shipping,
}

/// Order snapshot consumed by both engines
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    #[serde(rename = "_id")]
    pub id: String,
    pub buyer_id: String,
    pub seller_id: String,
    /// Rider pool (zone/shop) used for dispatch candidate selection
    pub pool_id: String,
    pub status: OrderStatus,
    pub fulfillment_mode: FulfillmentMode,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub updated_at: DateTime<Utc>,
}

/// Shipment lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ShipmentStatus {
    Preparing,
    InTransit,
    Delivered,
    Returned,
}

/// Shipment snapshot for shipping-mode orders
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Shipment {
    #[serde(rename = "_id")]
    pub id: String,
    pub order_id: String,
    pub status: ShipmentStatus,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub updated_at: DateTime<Utc>,
}

/// Dispute lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DisputeStatus {
    Open,
    UnderReview,
    Resolved,
    Withdrawn,
}

impl DisputeStatus {
    /// An active dispute blocks escrow release
    pub fn blocks_release(&self) -> bool {
        matches!(self, DisputeStatus::Open | DisputeStatus::UnderReview)
    }
}

/// Dispute snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Dispute {
    #[serde(rename = "_id")]
    pub id: String,
    pub order_id: String,
    pub status: DisputeStatus,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub opened_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dispute_blocking() {
        assert!(DisputeStatus::Open.blocks_release());
        assert!(DisputeStatus::UnderReview.blocks_release());
        assert!(!DisputeStatus::Resolved.blocks_release());
        assert!(!DisputeStatus::Withdrawn.blocks_release());
    }

    #[test]
    fn test_unknown_status_rejected() {
        let parsed: Result<OrderStatus, _> = serde_json::from_str("\"TELEPORTED\"");
        assert!(parsed.is_err());
    }

    #[test]
    fn test_status_serializes_screaming() {
        let json = serde_json::to_string(&OrderStatus::AssignedToRider).unwrap();
        assert_eq!(json, "\"ASSIGNED_TO_RIDER\"");
    }
}
