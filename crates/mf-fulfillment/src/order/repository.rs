//! Order Read-Side Store

use async_trait::async_trait;

use super::entity::{Dispute, Order, Shipment};
use crate::shared::error::StoreResult;

/// Read-side queries over the externally-owned aggregates, plus the seeding
/// writes used by dev mode and tests.
#[async_trait]
pub trait OrderStore: Send + Sync {
    async fn find_order(&self, order_id: &str) -> StoreResult<Option<Order>>;

    /// Shipment for a shipping-mode order, if one exists yet
    async fn find_shipment(&self, order_id: &str) -> StoreResult<Option<Shipment>>;

    /// The dispute currently blocking the order, if any (Open or UnderReview)
    async fn find_open_dispute(&self, order_id: &str) -> StoreResult<Option<Dispute>>;

    async fn upsert_order(&self, order: &Order) -> StoreResult<()>;

    async fn upsert_shipment(&self, shipment: &Shipment) -> StoreResult<()>;

    async fn upsert_dispute(&self, dispute: &Dispute) -> StoreResult<()>;
}
