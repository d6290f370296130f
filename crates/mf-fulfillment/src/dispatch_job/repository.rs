//! Dispatch Store
//!
//! Persistence surface for jobs and offers. Every mutating method is a
//! guarded write: the expected-status filter travels with the update and
//! the whole read-check-write runs in one store transaction, so concurrent
//! responders, sweepers and admin cancels serialize per job. A method
//! returning `false` (or a non-winning [`AcceptOutcome`]) lost its race;
//! callers treat that as a stale no-op, never an error.
//!
//! Outbox items ride the same transaction as the state change that
//! produced them.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mf_common::OutboxItem;

use super::entity::{BroadcastMode, DispatchJob, DispatchOffer};
use crate::shared::error::StoreResult;

/// Result of an acceptance transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcceptOutcome {
    /// This offer won: offer Accepted, job Assigned, siblings expired
    Won,
    /// The offer was already resolved (declined, expired, or accepted before)
    OfferResolved,
    /// The offer was still open but the job had already resolved
    /// (assigned elsewhere, expired, or cancelled)
    JobResolved,
}

#[async_trait]
pub trait DispatchStore: Send + Sync {
    async fn insert_job(&self, job: &DispatchJob) -> StoreResult<()>;

    async fn find_job(&self, job_id: &str) -> StoreResult<Option<DispatchJob>>;

    /// The job owning the order's delivery, if one was created already
    async fn find_job_for_order(&self, order_id: &str) -> StoreResult<Option<DispatchJob>>;

    async fn find_offer(&self, offer_id: &str) -> StoreResult<Option<DispatchOffer>>;

    async fn find_offers_for_job(&self, job_id: &str) -> StoreResult<Vec<DispatchOffer>>;

    /// Record a broadcast round: CAS the job into Broadcasting (expected
    /// Pending or Broadcasting), insert the offers, persist a mode override
    /// or rebroadcast-round bump when given, append the outbox items.
    /// Returns false when the job resolved concurrently; nothing is written
    /// in that case.
    async fn record_broadcast(
        &self,
        job_id: &str,
        offers: &[DispatchOffer],
        mode: Option<BroadcastMode>,
        rebroadcast_count: Option<u32>,
        items: Vec<OutboxItem>,
    ) -> StoreResult<bool>;

    /// The acceptance transaction: CAS the offer Sent/Seen to Accepted,
    /// CAS the job Pending/Broadcasting to Assigned with the winner
    /// recorded, expire every other open offer of the job, CAS the order
    /// Dispatching to AssignedToRider, append the outbox items. Aborts
    /// without writing anything when either CAS loses.
    async fn accept_offer(
        &self,
        offer: &DispatchOffer,
        order_id: &str,
        items: Vec<OutboxItem>,
    ) -> StoreResult<AcceptOutcome>;

    /// CAS the offer Sent/Seen to Declined, stamping responded_at.
    async fn decline_offer(&self, offer_id: &str, items: Vec<OutboxItem>) -> StoreResult<bool>;

    /// CAS the offer Sent to Seen. Purely informational; does not affect
    /// TTL accounting.
    async fn mark_offer_seen(&self, offer_id: &str) -> StoreResult<bool>;

    /// CAS the offer Sent/Seen to Expired. An offer accepted concurrently
    /// is never overwritten.
    async fn expire_offer(&self, offer_id: &str, items: Vec<OutboxItem>) -> StoreResult<bool>;

    /// CAS the job Pending/Broadcasting to Expired.
    async fn expire_job(&self, job_id: &str, items: Vec<OutboxItem>) -> StoreResult<bool>;

    /// The cancellation transaction: CAS the job (any non-terminal status)
    /// to Cancelled and expire all of its open offers.
    async fn cancel_job(&self, job_id: &str, items: Vec<OutboxItem>) -> StoreResult<bool>;

    /// Open offers whose offered_at is before the cutoff, oldest first.
    async fn find_offers_past_ttl(
        &self,
        cutoff: DateTime<Utc>,
        limit: usize,
    ) -> StoreResult<Vec<DispatchOffer>>;
}
