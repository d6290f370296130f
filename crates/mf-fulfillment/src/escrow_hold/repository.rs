//! Escrow Store
//!
//! Persistence surface for holds and ledger accounts. The release and
//! refund methods pair the hold's status transition with the ledger
//! credit in a single transaction, guarded by the status=Held filter, so
//! a crash can never leave funds released-but-uncredited and a second
//! invocation finds the hold already terminal and does nothing.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mf_common::OutboxItem;

use super::entity::{EscrowHold, LedgerAccount};
use crate::shared::error::StoreResult;

#[async_trait]
pub trait EscrowStore: Send + Sync {
    async fn insert_hold(&self, hold: &EscrowHold) -> StoreResult<()>;

    async fn find_hold(&self, hold_id: &str) -> StoreResult<Option<EscrowHold>>;

    async fn find_hold_for_order(&self, order_id: &str) -> StoreResult<Option<EscrowHold>>;

    /// The release transaction: CAS the hold Held to Released and credit
    /// the seller account by the held amount, appending the outbox items.
    /// Returns false (writing nothing) when the hold is no longer Held.
    async fn release_hold(&self, hold: &EscrowHold, items: Vec<OutboxItem>) -> StoreResult<bool>;

    /// CAS the hold Held to Frozen, recording the reason.
    async fn freeze_hold(
        &self,
        hold_id: &str,
        reason: &str,
        items: Vec<OutboxItem>,
    ) -> StoreResult<bool>;

    /// The refund transaction: CAS the hold Held to Refunded and credit
    /// the buyer account by the held amount.
    async fn refund_hold(&self, hold: &EscrowHold, items: Vec<OutboxItem>) -> StoreResult<bool>;

    /// Held holds whose expiry has passed, oldest first (sweeper input).
    async fn find_matured_holds(
        &self,
        now: DateTime<Utc>,
        limit: usize,
    ) -> StoreResult<Vec<EscrowHold>>;

    async fn find_account(&self, account_id: &str) -> StoreResult<Option<LedgerAccount>>;
}
