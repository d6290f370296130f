//! Embedded Store
//!
//! In-memory backend for dev mode and tests. One mutex guards the whole
//! state, so every trait method is a single critical section - the same
//! all-or-nothing semantics the MongoDB backend gets from transactions,
//! with the status checks doubling as the compare-and-set.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mf_common::{OutboxItem, OutboxRepository, OutboxStatus};
use parking_lot::Mutex;

use crate::dispatch_job::{
    AcceptOutcome, BroadcastMode, DispatchJob, DispatchOffer, DispatchStore, JobStatus, OfferStatus,
};
use crate::escrow_hold::{EscrowHold, EscrowStore, HoldStatus, LedgerAccount};
use crate::order::{Dispute, Order, OrderStatus, OrderStore, Shipment};
use crate::rider::{Rider, RiderStore};
use crate::shared::error::{StoreError, StoreResult};

#[derive(Default)]
struct EmbeddedState {
    jobs: HashMap<String, DispatchJob>,
    offers: HashMap<String, DispatchOffer>,
    riders: HashMap<String, Rider>,
    orders: HashMap<String, Order>,
    shipments: HashMap<String, Shipment>,
    disputes: HashMap<String, Dispute>,
    holds: HashMap<String, EscrowHold>,
    accounts: HashMap<String, LedgerAccount>,
    outbox: Vec<OutboxItem>,
}

/// Embedded in-memory implementation of the store traits.
#[derive(Default)]
pub struct EmbeddedStore {
    state: Mutex<EmbeddedState>,
}

impl EmbeddedStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// All outbox items ever appended, in append order (test helper).
    pub fn outbox_items(&self) -> Vec<OutboxItem> {
        self.state.lock().outbox.clone()
    }

    /// Current balance of an account, zero if absent (test helper).
    pub fn balance(&self, account_id: &str) -> i64 {
        self.state
            .lock()
            .accounts
            .get(account_id)
            .map(|a| a.available_minor)
            .unwrap_or(0)
    }

    fn credit(state: &mut EmbeddedState, account_id: &str, amount_minor: i64) {
        let account = state
            .accounts
            .entry(account_id.to_string())
            .or_insert_with(|| LedgerAccount {
                id: account_id.to_string(),
                available_minor: 0,
                updated_at: Utc::now(),
            });
        account.available_minor += amount_minor;
        account.updated_at = Utc::now();
    }
}

#[async_trait]
impl DispatchStore for EmbeddedStore {
    async fn insert_job(&self, job: &DispatchJob) -> StoreResult<()> {
        let mut state = self.state.lock();
        if state.jobs.values().any(|j| j.order_id == job.order_id) {
            return Err(StoreError::DuplicateKey(format!(
                "dispatch job for order {}",
                job.order_id
            )));
        }
        state.jobs.insert(job.id.clone(), job.clone());
        Ok(())
    }

    async fn find_job(&self, job_id: &str) -> StoreResult<Option<DispatchJob>> {
        Ok(self.state.lock().jobs.get(job_id).cloned())
    }

    async fn find_job_for_order(&self, order_id: &str) -> StoreResult<Option<DispatchJob>> {
        Ok(self
            .state
            .lock()
            .jobs
            .values()
            .find(|j| j.order_id == order_id)
            .cloned())
    }

    async fn find_offer(&self, offer_id: &str) -> StoreResult<Option<DispatchOffer>> {
        Ok(self.state.lock().offers.get(offer_id).cloned())
    }

    async fn find_offers_for_job(&self, job_id: &str) -> StoreResult<Vec<DispatchOffer>> {
        let mut offers: Vec<DispatchOffer> = self
            .state
            .lock()
            .offers
            .values()
            .filter(|o| o.job_id == job_id)
            .cloned()
            .collect();
        offers.sort_by(|a, b| a.offered_at.cmp(&b.offered_at));
        Ok(offers)
    }

    async fn record_broadcast(
        &self,
        job_id: &str,
        offers: &[DispatchOffer],
        mode: Option<BroadcastMode>,
        rebroadcast_count: Option<u32>,
        items: Vec<OutboxItem>,
    ) -> StoreResult<bool> {
        let mut state = self.state.lock();
        let Some(job) = state.jobs.get_mut(job_id) else {
            return Ok(false);
        };
        if job.status.is_terminal() {
            return Ok(false);
        }
        job.status = JobStatus::Broadcasting;
        job.updated_at = Utc::now();
        if let Some(mode) = mode {
            job.mode = mode;
        }
        if let Some(round) = rebroadcast_count {
            job.rebroadcast_count = round;
        }
        for offer in offers {
            state.offers.insert(offer.id.clone(), offer.clone());
        }
        state.outbox.extend(items);
        Ok(true)
    }

    async fn accept_offer(
        &self,
        offer: &DispatchOffer,
        order_id: &str,
        items: Vec<OutboxItem>,
    ) -> StoreResult<AcceptOutcome> {
        let mut state = self.state.lock();
        let now = Utc::now();

        let open = state
            .offers
            .get(&offer.id)
            .map(|o| o.rider_id == offer.rider_id && o.status.is_open())
            .unwrap_or(false);
        if !open {
            return Ok(AcceptOutcome::OfferResolved);
        }

        let job_live = state
            .jobs
            .get(&offer.job_id)
            .map(|j| !j.status.is_terminal())
            .unwrap_or(false);
        if !job_live {
            return Ok(AcceptOutcome::JobResolved);
        }

        {
            let o = state.offers.get_mut(&offer.id).unwrap();
            o.status = OfferStatus::Accepted;
            o.responded_at = Some(now);
        }
        {
            let j = state.jobs.get_mut(&offer.job_id).unwrap();
            j.status = JobStatus::Assigned;
            j.assigned_rider_id = Some(offer.rider_id.clone());
            j.resolved_at = Some(now);
            j.updated_at = now;
        }
        let job_id = offer.job_id.clone();
        for o in state.offers.values_mut() {
            if o.job_id == job_id && o.id != offer.id && o.status.is_open() {
                o.status = OfferStatus::Expired;
            }
        }
        if let Some(order) = state.orders.get_mut(order_id) {
            if order.status == OrderStatus::Dispatching {
                order.status = OrderStatus::AssignedToRider;
                order.updated_at = now;
            }
        }
        state.outbox.extend(items);
        Ok(AcceptOutcome::Won)
    }

    async fn decline_offer(&self, offer_id: &str, items: Vec<OutboxItem>) -> StoreResult<bool> {
        let mut state = self.state.lock();
        let Some(offer) = state.offers.get_mut(offer_id) else {
            return Ok(false);
        };
        if !offer.status.is_open() {
            return Ok(false);
        }
        offer.status = OfferStatus::Declined;
        offer.responded_at = Some(Utc::now());
        state.outbox.extend(items);
        Ok(true)
    }

    async fn mark_offer_seen(&self, offer_id: &str) -> StoreResult<bool> {
        let mut state = self.state.lock();
        let Some(offer) = state.offers.get_mut(offer_id) else {
            return Ok(false);
        };
        if offer.status != OfferStatus::Sent {
            return Ok(false);
        }
        offer.status = OfferStatus::Seen;
        Ok(true)
    }

    async fn expire_offer(&self, offer_id: &str, items: Vec<OutboxItem>) -> StoreResult<bool> {
        let mut state = self.state.lock();
        let Some(offer) = state.offers.get_mut(offer_id) else {
            return Ok(false);
        };
        if !offer.status.is_open() {
            return Ok(false);
        }
        offer.status = OfferStatus::Expired;
        state.outbox.extend(items);
        Ok(true)
    }

    async fn expire_job(&self, job_id: &str, items: Vec<OutboxItem>) -> StoreResult<bool> {
        let mut state = self.state.lock();
        let now = Utc::now();
        let Some(job) = state.jobs.get_mut(job_id) else {
            return Ok(false);
        };
        if job.status.is_terminal() {
            return Ok(false);
        }
        job.status = JobStatus::Expired;
        job.resolved_at = Some(now);
        job.updated_at = now;
        state.outbox.extend(items);
        Ok(true)
    }

    async fn cancel_job(&self, job_id: &str, items: Vec<OutboxItem>) -> StoreResult<bool> {
        let mut state = self.state.lock();
        let now = Utc::now();
        let Some(job) = state.jobs.get_mut(job_id) else {
            return Ok(false);
        };
        if job.status.is_terminal() {
            return Ok(false);
        }
        job.status = JobStatus::Cancelled;
        job.resolved_at = Some(now);
        job.updated_at = now;
        let job_id = job.id.clone();
        for o in state.offers.values_mut() {
            if o.job_id == job_id && o.status.is_open() {
                o.status = OfferStatus::Expired;
            }
        }
        state.outbox.extend(items);
        Ok(true)
    }

    async fn find_offers_past_ttl(
        &self,
        cutoff: DateTime<Utc>,
        limit: usize,
    ) -> StoreResult<Vec<DispatchOffer>> {
        let mut stale: Vec<DispatchOffer> = self
            .state
            .lock()
            .offers
            .values()
            .filter(|o| o.status.is_open() && o.offered_at < cutoff)
            .cloned()
            .collect();
        stale.sort_by(|a, b| a.offered_at.cmp(&b.offered_at));
        stale.truncate(limit);
        Ok(stale)
    }
}

#[async_trait]
impl EscrowStore for EmbeddedStore {
    async fn insert_hold(&self, hold: &EscrowHold) -> StoreResult<()> {
        let mut state = self.state.lock();
        if state.holds.values().any(|h| h.order_id == hold.order_id) {
            return Err(StoreError::DuplicateKey(format!(
                "escrow hold for order {}",
                hold.order_id
            )));
        }
        state.holds.insert(hold.id.clone(), hold.clone());
        Ok(())
    }

    async fn find_hold(&self, hold_id: &str) -> StoreResult<Option<EscrowHold>> {
        Ok(self.state.lock().holds.get(hold_id).cloned())
    }

    async fn find_hold_for_order(&self, order_id: &str) -> StoreResult<Option<EscrowHold>> {
        Ok(self
            .state
            .lock()
            .holds
            .values()
            .find(|h| h.order_id == order_id)
            .cloned())
    }

    async fn release_hold(&self, hold: &EscrowHold, items: Vec<OutboxItem>) -> StoreResult<bool> {
        let mut state = self.state.lock();
        let now = Utc::now();
        let live = state
            .holds
            .get(&hold.id)
            .map(|h| h.status == HoldStatus::Held)
            .unwrap_or(false);
        if !live {
            return Ok(false);
        }
        {
            let h = state.holds.get_mut(&hold.id).unwrap();
            h.status = HoldStatus::Released;
            h.resolved_at = Some(now);
            h.updated_at = now;
        }
        Self::credit(&mut state, &hold.seller_account_id, hold.amount_minor);
        state.outbox.extend(items);
        Ok(true)
    }

    async fn freeze_hold(
        &self,
        hold_id: &str,
        reason: &str,
        items: Vec<OutboxItem>,
    ) -> StoreResult<bool> {
        let mut state = self.state.lock();
        let now = Utc::now();
        let Some(hold) = state.holds.get_mut(hold_id) else {
            return Ok(false);
        };
        if hold.status != HoldStatus::Held {
            return Ok(false);
        }
        hold.status = HoldStatus::Frozen;
        hold.frozen_reason = Some(reason.to_string());
        hold.resolved_at = Some(now);
        hold.updated_at = now;
        state.outbox.extend(items);
        Ok(true)
    }

    async fn refund_hold(&self, hold: &EscrowHold, items: Vec<OutboxItem>) -> StoreResult<bool> {
        let mut state = self.state.lock();
        let now = Utc::now();
        let live = state
            .holds
            .get(&hold.id)
            .map(|h| h.status == HoldStatus::Held)
            .unwrap_or(false);
        if !live {
            return Ok(false);
        }
        {
            let h = state.holds.get_mut(&hold.id).unwrap();
            h.status = HoldStatus::Refunded;
            h.resolved_at = Some(now);
            h.updated_at = now;
        }
        Self::credit(&mut state, &hold.buyer_account_id, hold.amount_minor);
        state.outbox.extend(items);
        Ok(true)
    }

    async fn find_matured_holds(
        &self,
        now: DateTime<Utc>,
        limit: usize,
    ) -> StoreResult<Vec<EscrowHold>> {
        let mut matured: Vec<EscrowHold> = self
            .state
            .lock()
            .holds
            .values()
            .filter(|h| h.status == HoldStatus::Held && h.hold_expires_at <= now)
            .cloned()
            .collect();
        matured.sort_by(|a, b| a.hold_expires_at.cmp(&b.hold_expires_at));
        matured.truncate(limit);
        Ok(matured)
    }

    async fn find_account(&self, account_id: &str) -> StoreResult<Option<LedgerAccount>> {
        Ok(self.state.lock().accounts.get(account_id).cloned())
    }
}

#[async_trait]
impl OrderStore for EmbeddedStore {
    async fn find_order(&self, order_id: &str) -> StoreResult<Option<Order>> {
        Ok(self.state.lock().orders.get(order_id).cloned())
    }

    async fn find_shipment(&self, order_id: &str) -> StoreResult<Option<Shipment>> {
        Ok(self
            .state
            .lock()
            .shipments
            .values()
            .find(|s| s.order_id == order_id)
            .cloned())
    }

    async fn find_open_dispute(&self, order_id: &str) -> StoreResult<Option<Dispute>> {
        Ok(self
            .state
            .lock()
            .disputes
            .values()
            .find(|d| d.order_id == order_id && d.status.blocks_release())
            .cloned())
    }

    async fn upsert_order(&self, order: &Order) -> StoreResult<()> {
        self.state
            .lock()
            .orders
            .insert(order.id.clone(), order.clone());
        Ok(())
    }

    async fn upsert_shipment(&self, shipment: &Shipment) -> StoreResult<()> {
        self.state
            .lock()
            .shipments
            .insert(shipment.id.clone(), shipment.clone());
        Ok(())
    }

    async fn upsert_dispute(&self, dispute: &Dispute) -> StoreResult<()> {
        self.state
            .lock()
            .disputes
            .insert(dispute.id.clone(), dispute.clone());
        Ok(())
    }
}

#[async_trait]
impl RiderStore for EmbeddedStore {
    async fn find_available_in_pool(&self, pool_id: &str) -> StoreResult<Vec<Rider>> {
        Ok(self
            .state
            .lock()
            .riders
            .values()
            .filter(|r| r.is_available() && r.serves_pool(pool_id))
            .cloned()
            .collect())
    }

    async fn upsert_rider(&self, rider: &Rider) -> StoreResult<()> {
        self.state
            .lock()
            .riders
            .insert(rider.id.clone(), rider.clone());
        Ok(())
    }
}

#[async_trait]
impl OutboxRepository for EmbeddedStore {
    async fn fetch_pending(&self, limit: u32) -> anyhow::Result<Vec<OutboxItem>> {
        let state = self.state.lock();
        let mut pending: Vec<OutboxItem> = state
            .outbox
            .iter()
            .filter(|i| i.status == OutboxStatus::Pending)
            .cloned()
            .collect();
        pending.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        pending.truncate(limit as usize);
        Ok(pending)
    }

    async fn mark_in_progress(&self, ids: Vec<String>) -> anyhow::Result<()> {
        let mut state = self.state.lock();
        let now = Utc::now();
        for item in state.outbox.iter_mut() {
            if ids.contains(&item.id) {
                item.status = OutboxStatus::InProgress;
                item.updated_at = Some(now);
            }
        }
        Ok(())
    }

    async fn mark_with_status(
        &self,
        ids: Vec<String>,
        status: OutboxStatus,
        error_message: Option<String>,
    ) -> anyhow::Result<()> {
        let mut state = self.state.lock();
        let now = Utc::now();
        for item in state.outbox.iter_mut() {
            if ids.contains(&item.id) {
                item.status = status;
                item.error_message = error_message.clone();
                item.updated_at = Some(now);
            }
        }
        Ok(())
    }

    async fn increment_retry(&self, ids: Vec<String>) -> anyhow::Result<()> {
        let mut state = self.state.lock();
        let now = Utc::now();
        for item in state.outbox.iter_mut() {
            if ids.contains(&item.id) {
                item.retry_count += 1;
                item.status = OutboxStatus::Pending;
                item.updated_at = Some(now);
            }
        }
        Ok(())
    }

    async fn fetch_stuck(&self, timeout: Duration, limit: u32) -> anyhow::Result<Vec<OutboxItem>> {
        let cutoff = Utc::now() - chrono::Duration::from_std(timeout)?;
        let state = self.state.lock();
        let mut stuck: Vec<OutboxItem> = state
            .outbox
            .iter()
            .filter(|i| {
                i.status == OutboxStatus::InProgress
                    && i.updated_at.unwrap_or(i.created_at) < cutoff
            })
            .cloned()
            .collect();
        stuck.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        stuck.truncate(limit as usize);
        Ok(stuck)
    }

    async fn reset_stuck(&self, ids: Vec<String>) -> anyhow::Result<()> {
        let mut state = self.state.lock();
        let now = Utc::now();
        for item in state.outbox.iter_mut() {
            if ids.contains(&item.id) {
                item.status = OutboxStatus::Pending;
                item.updated_at = Some(now);
            }
        }
        Ok(())
    }
}
