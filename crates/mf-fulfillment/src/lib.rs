//! MarketFlow Fulfillment
//!
//! Core domain for the fulfillment pipeline:
//! - dispatch_job: the dispatch offer engine (broadcast, respond, expire, cancel)
//! - escrow_hold: the escrow release engine (release, freeze, refund)
//! - rider: the candidate pool selector
//! - order: read-side snapshots of orders, shipments and disputes
//! - store: durable store backends (MongoDB, embedded in-memory)
//!
//! Every invariant is re-derived from the durable store on each call; engine
//! instances hold no mutable state of their own, so any number of handlers
//! and sweepers may run against the same store.

pub mod shared;
pub mod usecase;

pub mod dispatch_job;
pub mod escrow_hold;
pub mod order;
pub mod rider;
pub mod store;

pub use shared::error::{StoreError, StoreResult};

pub use dispatch_job::{
    AcceptOutcome, BroadcastMode, DispatchJob, DispatchOffer, DispatchStore, ExhaustionPolicy,
    JobStatus, OfferDecision, OfferStatus,
};
pub use escrow_hold::{EscrowHold, EscrowStore, HoldStatus, LedgerAccount};
pub use order::{Dispute, DisputeStatus, FulfillmentMode, Order, OrderStatus, OrderStore,
    Shipment, ShipmentStatus};
pub use rider::{PoolSelector, RankCriterion, RankingPolicy, Rider, RiderAvailability,
    RiderStore, RiderTier};
pub use store::embedded::EmbeddedStore;
pub use store::mongo::MongoStore;
