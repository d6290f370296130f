//! Order Read Side
//!
//! Orders, shipments and disputes are owned elsewhere; the engines consume
//! already-resolved snapshots through explicit queries. The only write the
//! fulfillment pipeline performs on an order is the Dispatching to
//! AssignedToRider transition inside the acceptance transaction.

mod entity;
mod repository;

pub use entity::{Dispute, DisputeStatus, FulfillmentMode, Order, OrderStatus, Shipment,
    ShipmentStatus};
pub use repository::OrderStore;
