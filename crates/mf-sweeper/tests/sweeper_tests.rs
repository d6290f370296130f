//! Sweeper behavior against the embedded store.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use mf_fulfillment::dispatch_job::{
    BroadcastMode, BroadcastOffersCommand, BroadcastOffersUseCase, CreateDispatchJobCommand,
    CreateDispatchJobUseCase, CreateJobOutcome, ExhaustionPolicy, ExpireStaleOffersUseCase,
    JobStatus, OfferStatus,
};
use mf_fulfillment::escrow_hold::{HoldStatus, ReleaseHoldUseCase};
use mf_fulfillment::usecase::ExecutionContext;
use mf_fulfillment::{
    DispatchStore, EmbeddedStore, EscrowHold, EscrowStore, FulfillmentMode, Order, OrderStatus,
    OrderStore, PoolSelector, RankingPolicy, Rider, RiderAvailability, RiderStore, RiderTier,
};
use mf_sweeper::{EscrowMaturityPoller, OfferExpiryPoller};

async fn seed_order(store: &EmbeddedStore, order_id: &str, status: OrderStatus) {
    let now = Utc::now();
    store
        .upsert_order(&Order {
            id: order_id.to_string(),
            buyer_id: "buyer-1".to_string(),
            seller_id: "seller-1".to_string(),
            pool_id: "zone-a".to_string(),
            status,
            fulfillment_mode: FulfillmentMode::LocalAgent,
            created_at: now,
            updated_at: now,
        })
        .await
        .unwrap();
}

#[tokio::test]
async fn offer_poller_expires_stale_offers_and_resolves_the_job() {
    let store = Arc::new(EmbeddedStore::new());
    let dispatch: Arc<dyn DispatchStore> = store.clone();
    let selector = PoolSelector::new(store.clone(), RankingPolicy::default());

    seed_order(&store, "order-1", OrderStatus::Dispatching).await;
    store
        .upsert_rider(&Rider {
            id: "rider-0".to_string(),
            pool_ids: vec!["zone-a".to_string()],
            availability: RiderAvailability::Online,
            tier: RiderTier::Standard,
            zone_distance_km: 1.0,
            last_seen_at: Utc::now(),
        })
        .await
        .unwrap();

    let create = CreateDispatchJobUseCase::new(
        dispatch.clone(),
        store.clone(),
        BroadcastMode::Parallel,
    );
    let CreateJobOutcome::Created { job_id } = create
        .execute(
            CreateDispatchJobCommand {
                order_id: "order-1".to_string(),
                mode: None,
            },
            ExecutionContext::system(),
        )
        .await
        .into_result()
        .unwrap()
    else {
        panic!("Expected creation");
    };

    let broadcast = BroadcastOffersUseCase::new(
        dispatch.clone(),
        selector.clone(),
        ExhaustionPolicy::Expire,
    );
    broadcast
        .execute(
            BroadcastOffersCommand {
                job_id: job_id.clone(),
                mode: None,
            },
            ExecutionContext::system(),
        )
        .await
        .into_result()
        .unwrap();

    tokio::time::sleep(Duration::from_millis(20)).await;

    let expire = ExpireStaleOffersUseCase::new(dispatch.clone(), selector, ExhaustionPolicy::Expire);
    let poller = OfferExpiryPoller::new(expire, Duration::from_secs(0), 100);

    // The single candidate's offer is stale; the pool is spent, so the job
    // expires with it
    let summary = poller.poll().await.unwrap();
    assert_eq!(summary.expired_offers, 1);
    assert_eq!(summary.jobs_expired, 1);

    let job = store.find_job(&job_id).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Expired);
    let offers = store.find_offers_for_job(&job_id).await.unwrap();
    assert!(offers.iter().all(|o| o.status == OfferStatus::Expired));

    // Idle sweeps stay quiet
    let summary = poller.poll().await.unwrap();
    assert_eq!(summary.expired_offers, 0);
}

#[tokio::test]
async fn escrow_poller_releases_only_eligible_matured_holds() {
    let store = Arc::new(EmbeddedStore::new());
    let escrow: Arc<dyn EscrowStore> = store.clone();

    // order-1 delivered, order-2 still out for delivery
    seed_order(&store, "order-1", OrderStatus::Delivered).await;
    seed_order(&store, "order-2", OrderStatus::PickedUp).await;

    let matured_eligible = EscrowHold::new(
        "order-1",
        "buyer-1",
        "seller-1",
        10_000,
        Utc::now() - chrono::Duration::hours(1),
    );
    let matured_blocked = EscrowHold::new(
        "order-2",
        "buyer-1",
        "seller-1",
        4_000,
        Utc::now() - chrono::Duration::hours(1),
    );
    let unmatured = EscrowHold::new(
        "order-3",
        "buyer-1",
        "seller-1",
        2_000,
        Utc::now() + chrono::Duration::hours(10),
    );
    store.insert_hold(&matured_eligible).await.unwrap();
    store.insert_hold(&matured_blocked).await.unwrap();
    store.insert_hold(&unmatured).await.unwrap();

    let release = ReleaseHoldUseCase::new(escrow.clone(), store.clone());
    let poller = EscrowMaturityPoller::new(escrow, release, 100);

    let summary = poller.poll().await.unwrap();
    assert_eq!(summary.scanned, 2);
    assert_eq!(summary.released, 1);
    assert_eq!(summary.not_eligible, 1);
    assert_eq!(store.balance("seller-1"), 10_000);

    let released = store.find_hold(&matured_eligible.id).await.unwrap().unwrap();
    assert_eq!(released.status, HoldStatus::Released);
    let blocked = store.find_hold(&matured_blocked.id).await.unwrap().unwrap();
    assert_eq!(blocked.status, HoldStatus::Held);

    // order-2 delivered: the blocked hold releases on the next tick
    seed_order(&store, "order-2", OrderStatus::Delivered).await;
    let summary = poller.poll().await.unwrap();
    assert_eq!(summary.released, 1);
    assert_eq!(store.balance("seller-1"), 14_000);

    // Further ticks are no-ops; the seller is credited exactly once per hold
    let summary = poller.poll().await.unwrap();
    assert_eq!(summary.scanned, 0);
    assert_eq!(store.balance("seller-1"), 14_000);
}
