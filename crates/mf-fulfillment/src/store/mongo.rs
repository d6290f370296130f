//! MongoDB Store
//!
//! Production store backend. Status transitions are filtered updates
//! (the filter carries the expected statuses, `matched_count` decides the
//! race), and every multi-document mutation runs inside a session
//! transaction so the state change and its outbox items commit or roll
//! back together.
//!
//! # Requirements
//! - MongoDB 4.0+ (multi-document transactions)
//! - Replica set deployment (transactions require a replica set)

use async_trait::async_trait;
use bson::{doc, Bson};
use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use mongodb::{Client, ClientSession, Collection, Database};
use mongodb::options::FindOptions;
use mf_common::OutboxItem;
use tracing::info;

use crate::dispatch_job::{AcceptOutcome, BroadcastMode, DispatchJob, DispatchOffer, DispatchStore};
use crate::escrow_hold::{EscrowHold, EscrowStore, LedgerAccount};
use crate::order::{Dispute, Order, OrderStore, Shipment};
use crate::rider::{Rider, RiderStore};
use crate::shared::error::StoreResult;

const OPEN_OFFER_STATUSES: [&str; 2] = ["SENT", "SEEN"];
const LIVE_JOB_STATUSES: [&str; 2] = ["PENDING", "BROADCASTING"];

/// MongoDB implementation of the fulfillment store traits.
#[derive(Clone)]
pub struct MongoStore {
    client: Client,
    jobs: Collection<DispatchJob>,
    offers: Collection<DispatchOffer>,
    riders: Collection<Rider>,
    orders: Collection<Order>,
    shipments: Collection<Shipment>,
    disputes: Collection<Dispute>,
    holds: Collection<EscrowHold>,
    accounts: Collection<LedgerAccount>,
    outbox: Collection<OutboxItem>,
}

impl MongoStore {
    pub fn new(client: Client, db: &Database) -> Self {
        Self {
            client,
            jobs: db.collection("dispatch_jobs"),
            offers: db.collection("dispatch_offers"),
            riders: db.collection("riders"),
            orders: db.collection("orders"),
            shipments: db.collection("shipments"),
            disputes: db.collection("disputes"),
            holds: db.collection("escrow_holds"),
            accounts: db.collection("ledger_accounts"),
            outbox: db.collection("outbox_items"),
        }
    }

    /// Create the indexes the engines and sweepers query on.
    pub async fn ensure_indexes(&self) -> StoreResult<()> {
        use mongodb::options::IndexOptions;
        use mongodb::IndexModel;

        let unique = IndexOptions::builder().unique(true).build();

        self.jobs
            .create_index(
                IndexModel::builder()
                    .keys(doc! { "orderId": 1 })
                    .options(unique.clone())
                    .build(),
            )
            .await?;
        self.offers
            .create_index(IndexModel::builder().keys(doc! { "jobId": 1 }).build())
            .await?;
        self.offers
            .create_index(
                IndexModel::builder()
                    .keys(doc! { "status": 1, "offeredAt": 1 })
                    .build(),
            )
            .await?;
        self.holds
            .create_index(
                IndexModel::builder()
                    .keys(doc! { "orderId": 1 })
                    .options(unique)
                    .build(),
            )
            .await?;
        self.holds
            .create_index(
                IndexModel::builder()
                    .keys(doc! { "status": 1, "holdExpiresAt": 1 })
                    .build(),
            )
            .await?;
        self.outbox
            .create_index(
                IndexModel::builder()
                    .keys(doc! { "status": 1, "createdAt": 1 })
                    .build(),
            )
            .await?;

        info!("MongoDB indexes ensured");
        Ok(())
    }

    async fn start_txn(&self) -> StoreResult<ClientSession> {
        let mut session = self.client.start_session().await?;
        session.start_transaction().await?;
        Ok(session)
    }

    async fn append_outbox(
        &self,
        session: &mut ClientSession,
        items: &[OutboxItem],
    ) -> StoreResult<()> {
        if items.is_empty() {
            return Ok(());
        }
        self.outbox
            .insert_many(items)
            .session(&mut *session)
            .await?;
        Ok(())
    }

    async fn abort(session: &mut ClientSession) {
        let _ = session.abort_transaction().await;
    }

    fn open_statuses() -> Bson {
        Bson::from(
            OPEN_OFFER_STATUSES
                .iter()
                .map(|s| Bson::String((*s).to_string()))
                .collect::<Vec<_>>(),
        )
    }

    fn live_statuses() -> Bson {
        Bson::from(
            LIVE_JOB_STATUSES
                .iter()
                .map(|s| Bson::String((*s).to_string()))
                .collect::<Vec<_>>(),
        )
    }
}

#[async_trait]
impl DispatchStore for MongoStore {
    async fn insert_job(&self, job: &DispatchJob) -> StoreResult<()> {
        self.jobs.insert_one(job).await?;
        Ok(())
    }

    async fn find_job(&self, job_id: &str) -> StoreResult<Option<DispatchJob>> {
        Ok(self.jobs.find_one(doc! { "_id": job_id }).await?)
    }

    async fn find_job_for_order(&self, order_id: &str) -> StoreResult<Option<DispatchJob>> {
        Ok(self.jobs.find_one(doc! { "orderId": order_id }).await?)
    }

    async fn find_offer(&self, offer_id: &str) -> StoreResult<Option<DispatchOffer>> {
        Ok(self.offers.find_one(doc! { "_id": offer_id }).await?)
    }

    async fn find_offers_for_job(&self, job_id: &str) -> StoreResult<Vec<DispatchOffer>> {
        let cursor = self.offers.find(doc! { "jobId": job_id }).await?;
        Ok(cursor.try_collect().await?)
    }

    async fn record_broadcast(
        &self,
        job_id: &str,
        offers: &[DispatchOffer],
        mode: Option<BroadcastMode>,
        rebroadcast_count: Option<u32>,
        items: Vec<OutboxItem>,
    ) -> StoreResult<bool> {
        let mut session = self.start_txn().await?;

        let mut set = doc! {
            "status": "BROADCASTING",
            "updatedAt": bson::DateTime::now(),
        };
        if let Some(mode) = mode {
            set.insert("mode", bson::to_bson(&mode)?);
        }
        if let Some(round) = rebroadcast_count {
            set.insert("rebroadcastCount", round as i64);
        }

        let result = self
            .jobs
            .update_one(
                doc! { "_id": job_id, "status": { "$in": Self::live_statuses() } },
                doc! { "$set": set },
            )
            .session(&mut session)
            .await?;

        if result.matched_count == 0 {
            Self::abort(&mut session).await;
            return Ok(false);
        }

        if !offers.is_empty() {
            self.offers.insert_many(offers).session(&mut session).await?;
        }
        self.append_outbox(&mut session, &items).await?;

        session.commit_transaction().await?;
        Ok(true)
    }

    async fn accept_offer(
        &self,
        offer: &DispatchOffer,
        order_id: &str,
        items: Vec<OutboxItem>,
    ) -> StoreResult<AcceptOutcome> {
        let mut session = self.start_txn().await?;
        let now = bson::DateTime::now();

        // The responder's offer must still be open
        let offer_cas = self
            .offers
            .update_one(
                doc! {
                    "_id": &offer.id,
                    "riderId": &offer.rider_id,
                    "status": { "$in": Self::open_statuses() },
                },
                doc! { "$set": { "status": "ACCEPTED", "respondedAt": now } },
            )
            .session(&mut session)
            .await?;
        if offer_cas.matched_count == 0 {
            Self::abort(&mut session).await;
            return Ok(AcceptOutcome::OfferResolved);
        }

        // The job must not have resolved elsewhere
        let job_cas = self
            .jobs
            .update_one(
                doc! { "_id": &offer.job_id, "status": { "$in": Self::live_statuses() } },
                doc! {
                    "$set": {
                        "status": "ASSIGNED",
                        "assignedRiderId": &offer.rider_id,
                        "resolvedAt": now,
                        "updatedAt": now,
                    }
                },
            )
            .session(&mut session)
            .await?;
        if job_cas.matched_count == 0 {
            Self::abort(&mut session).await;
            return Ok(AcceptOutcome::JobResolved);
        }

        // Losing offers expire in the same commit
        self.offers
            .update_many(
                doc! {
                    "jobId": &offer.job_id,
                    "_id": { "$ne": &offer.id },
                    "status": { "$in": Self::open_statuses() },
                },
                doc! { "$set": { "status": "EXPIRED" } },
            )
            .session(&mut session)
            .await?;

        // Order transition; a zero match means its lifecycle moved on,
        // which does not invalidate the assignment
        self.orders
            .update_one(
                doc! { "_id": order_id, "status": "DISPATCHING" },
                doc! { "$set": { "status": "ASSIGNED_TO_RIDER", "updatedAt": now } },
            )
            .session(&mut session)
            .await?;

        self.append_outbox(&mut session, &items).await?;

        session.commit_transaction().await?;
        Ok(AcceptOutcome::Won)
    }

    async fn decline_offer(&self, offer_id: &str, items: Vec<OutboxItem>) -> StoreResult<bool> {
        let mut session = self.start_txn().await?;

        let result = self
            .offers
            .update_one(
                doc! { "_id": offer_id, "status": { "$in": Self::open_statuses() } },
                doc! { "$set": { "status": "DECLINED", "respondedAt": bson::DateTime::now() } },
            )
            .session(&mut session)
            .await?;

        if result.matched_count == 0 {
            Self::abort(&mut session).await;
            return Ok(false);
        }

        self.append_outbox(&mut session, &items).await?;
        session.commit_transaction().await?;
        Ok(true)
    }

    async fn mark_offer_seen(&self, offer_id: &str) -> StoreResult<bool> {
        let result = self
            .offers
            .update_one(
                doc! { "_id": offer_id, "status": "SENT" },
                doc! { "$set": { "status": "SEEN" } },
            )
            .await?;
        Ok(result.matched_count > 0)
    }

    async fn expire_offer(&self, offer_id: &str, items: Vec<OutboxItem>) -> StoreResult<bool> {
        let mut session = self.start_txn().await?;

        let result = self
            .offers
            .update_one(
                doc! { "_id": offer_id, "status": { "$in": Self::open_statuses() } },
                doc! { "$set": { "status": "EXPIRED" } },
            )
            .session(&mut session)
            .await?;

        if result.matched_count == 0 {
            Self::abort(&mut session).await;
            return Ok(false);
        }

        self.append_outbox(&mut session, &items).await?;
        session.commit_transaction().await?;
        Ok(true)
    }

    async fn expire_job(&self, job_id: &str, items: Vec<OutboxItem>) -> StoreResult<bool> {
        let mut session = self.start_txn().await?;
        let now = bson::DateTime::now();

        let result = self
            .jobs
            .update_one(
                doc! { "_id": job_id, "status": { "$in": Self::live_statuses() } },
                doc! { "$set": { "status": "EXPIRED", "resolvedAt": now, "updatedAt": now } },
            )
            .session(&mut session)
            .await?;

        if result.matched_count == 0 {
            Self::abort(&mut session).await;
            return Ok(false);
        }

        self.append_outbox(&mut session, &items).await?;
        session.commit_transaction().await?;
        Ok(true)
    }

    async fn cancel_job(&self, job_id: &str, items: Vec<OutboxItem>) -> StoreResult<bool> {
        let mut session = self.start_txn().await?;
        let now = bson::DateTime::now();

        let result = self
            .jobs
            .update_one(
                doc! { "_id": job_id, "status": { "$in": Self::live_statuses() } },
                doc! { "$set": { "status": "CANCELLED", "resolvedAt": now, "updatedAt": now } },
            )
            .session(&mut session)
            .await?;

        if result.matched_count == 0 {
            Self::abort(&mut session).await;
            return Ok(false);
        }

        self.offers
            .update_many(
                doc! { "jobId": job_id, "status": { "$in": Self::open_statuses() } },
                doc! { "$set": { "status": "EXPIRED" } },
            )
            .session(&mut session)
            .await?;

        self.append_outbox(&mut session, &items).await?;
        session.commit_transaction().await?;
        Ok(true)
    }

    async fn find_offers_past_ttl(
        &self,
        cutoff: DateTime<Utc>,
        limit: usize,
    ) -> StoreResult<Vec<DispatchOffer>> {
        let options = FindOptions::builder()
            .sort(doc! { "offeredAt": 1 })
            .limit(limit as i64)
            .build();
        let cursor = self
            .offers
            .find(doc! {
                "status": { "$in": Self::open_statuses() },
                "offeredAt": { "$lt": bson::DateTime::from_chrono(cutoff) },
            })
            .with_options(options)
            .await?;
        Ok(cursor.try_collect().await?)
    }
}

#[async_trait]
impl EscrowStore for MongoStore {
    async fn insert_hold(&self, hold: &EscrowHold) -> StoreResult<()> {
        self.holds.insert_one(hold).await?;
        Ok(())
    }

    async fn find_hold(&self, hold_id: &str) -> StoreResult<Option<EscrowHold>> {
        Ok(self.holds.find_one(doc! { "_id": hold_id }).await?)
    }

    async fn find_hold_for_order(&self, order_id: &str) -> StoreResult<Option<EscrowHold>> {
        Ok(self.holds.find_one(doc! { "orderId": order_id }).await?)
    }

    async fn release_hold(&self, hold: &EscrowHold, items: Vec<OutboxItem>) -> StoreResult<bool> {
        let mut session = self.start_txn().await?;
        let now = bson::DateTime::now();

        let result = self
            .holds
            .update_one(
                doc! { "_id": &hold.id, "status": "HELD" },
                doc! { "$set": { "status": "RELEASED", "resolvedAt": now, "updatedAt": now } },
            )
            .session(&mut session)
            .await?;

        if result.matched_count == 0 {
            Self::abort(&mut session).await;
            return Ok(false);
        }

        // Seller credit commits with the status transition or not at all
        self.accounts
            .update_one(
                doc! { "_id": &hold.seller_account_id },
                doc! {
                    "$inc": { "availableMinor": hold.amount_minor },
                    "$set": { "updatedAt": now },
                },
            )
            .upsert(true)
            .session(&mut session)
            .await?;

        self.append_outbox(&mut session, &items).await?;
        session.commit_transaction().await?;
        Ok(true)
    }

    async fn freeze_hold(
        &self,
        hold_id: &str,
        reason: &str,
        items: Vec<OutboxItem>,
    ) -> StoreResult<bool> {
        let mut session = self.start_txn().await?;
        let now = bson::DateTime::now();

        let result = self
            .holds
            .update_one(
                doc! { "_id": hold_id, "status": "HELD" },
                doc! {
                    "$set": {
                        "status": "FROZEN",
                        "frozenReason": reason,
                        "resolvedAt": now,
                        "updatedAt": now,
                    }
                },
            )
            .session(&mut session)
            .await?;

        if result.matched_count == 0 {
            Self::abort(&mut session).await;
            return Ok(false);
        }

        self.append_outbox(&mut session, &items).await?;
        session.commit_transaction().await?;
        Ok(true)
    }

    async fn refund_hold(&self, hold: &EscrowHold, items: Vec<OutboxItem>) -> StoreResult<bool> {
        let mut session = self.start_txn().await?;
        let now = bson::DateTime::now();

        let result = self
            .holds
            .update_one(
                doc! { "_id": &hold.id, "status": "HELD" },
                doc! { "$set": { "status": "REFUNDED", "resolvedAt": now, "updatedAt": now } },
            )
            .session(&mut session)
            .await?;

        if result.matched_count == 0 {
            Self::abort(&mut session).await;
            return Ok(false);
        }

        self.accounts
            .update_one(
                doc! { "_id": &hold.buyer_account_id },
                doc! {
                    "$inc": { "availableMinor": hold.amount_minor },
                    "$set": { "updatedAt": now },
                },
            )
            .upsert(true)
            .session(&mut session)
            .await?;

        self.append_outbox(&mut session, &items).await?;
        session.commit_transaction().await?;
        Ok(true)
    }

    async fn find_matured_holds(
        &self,
        now: DateTime<Utc>,
        limit: usize,
    ) -> StoreResult<Vec<EscrowHold>> {
        let options = FindOptions::builder()
            .sort(doc! { "holdExpiresAt": 1 })
            .limit(limit as i64)
            .build();
        let cursor = self
            .holds
            .find(doc! {
                "status": "HELD",
                "holdExpiresAt": { "$lte": bson::DateTime::from_chrono(now) },
            })
            .with_options(options)
            .await?;
        Ok(cursor.try_collect().await?)
    }

    async fn find_account(&self, account_id: &str) -> StoreResult<Option<LedgerAccount>> {
        Ok(self.accounts.find_one(doc! { "_id": account_id }).await?)
    }
}

#[async_trait]
impl OrderStore for MongoStore {
    async fn find_order(&self, order_id: &str) -> StoreResult<Option<Order>> {
        Ok(self.orders.find_one(doc! { "_id": order_id }).await?)
    }

    async fn find_shipment(&self, order_id: &str) -> StoreResult<Option<Shipment>> {
        Ok(self.shipments.find_one(doc! { "orderId": order_id }).await?)
    }

    async fn find_open_dispute(&self, order_id: &str) -> StoreResult<Option<Dispute>> {
        Ok(self
            .disputes
            .find_one(doc! {
                "orderId": order_id,
                "status": { "$in": ["OPEN", "UNDER_REVIEW"] },
            })
            .await?)
    }

    async fn upsert_order(&self, order: &Order) -> StoreResult<()> {
        self.orders
            .replace_one(doc! { "_id": &order.id }, order)
            .upsert(true)
            .await?;
        Ok(())
    }

    async fn upsert_shipment(&self, shipment: &Shipment) -> StoreResult<()> {
        self.shipments
            .replace_one(doc! { "_id": &shipment.id }, shipment)
            .upsert(true)
            .await?;
        Ok(())
    }

    async fn upsert_dispute(&self, dispute: &Dispute) -> StoreResult<()> {
        self.disputes
            .replace_one(doc! { "_id": &dispute.id }, dispute)
            .upsert(true)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl RiderStore for MongoStore {
    async fn find_available_in_pool(&self, pool_id: &str) -> StoreResult<Vec<Rider>> {
        let cursor = self
            .riders
            .find(doc! { "poolIds": pool_id, "availability": "ONLINE" })
            .await?;
        Ok(cursor.try_collect().await?)
    }

    async fn upsert_rider(&self, rider: &Rider) -> StoreResult<()> {
        self.riders
            .replace_one(doc! { "_id": &rider.id }, rider)
            .upsert(true)
            .await?;
        Ok(())
    }
}
