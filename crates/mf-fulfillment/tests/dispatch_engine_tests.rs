//! Dispatch offer engine scenarios against the embedded store.

use std::sync::Arc;

use chrono::{Duration as ChronoDuration, Utc};
use mf_common::OutboxItemType;
use mf_fulfillment::dispatch_job::{
    AdvanceOutcome, BroadcastMode, BroadcastOffersCommand, BroadcastOffersUseCase,
    BroadcastOutcome, CancelJobCommand, CancelJobUseCase, CancelOutcome, CreateDispatchJobCommand,
    CreateDispatchJobUseCase, CreateJobOutcome, ExhaustionPolicy, ExpireStaleOffersCommand,
    ExpireStaleOffersUseCase, JobStatus, OfferDecision, OfferStatus, RespondCommand,
    RespondOutcome, RespondToOfferUseCase,
};
use mf_fulfillment::usecase::ExecutionContext;
use mf_fulfillment::{
    DispatchStore, EmbeddedStore, FulfillmentMode, Order, OrderStatus, OrderStore, PoolSelector,
    RankingPolicy, Rider, RiderAvailability, RiderStore, RiderTier,
};

struct Harness {
    store: Arc<EmbeddedStore>,
    broadcast: BroadcastOffersUseCase,
    respond: Arc<RespondToOfferUseCase>,
    expire: ExpireStaleOffersUseCase,
    cancel: CancelJobUseCase,
    create: CreateDispatchJobUseCase,
}

fn harness(exhaustion: ExhaustionPolicy) -> Harness {
    let store = Arc::new(EmbeddedStore::new());
    let dispatch: Arc<dyn DispatchStore> = store.clone();
    let selector = PoolSelector::new(store.clone(), RankingPolicy::default());

    Harness {
        store: store.clone(),
        broadcast: BroadcastOffersUseCase::new(dispatch.clone(), selector.clone(), exhaustion),
        respond: Arc::new(RespondToOfferUseCase::new(
            dispatch.clone(),
            selector.clone(),
            exhaustion,
        )),
        expire: ExpireStaleOffersUseCase::new(dispatch.clone(), selector, exhaustion),
        cancel: CancelJobUseCase::new(dispatch.clone()),
        create: CreateDispatchJobUseCase::new(dispatch, store, BroadcastMode::Parallel),
    }
}

fn ctx() -> ExecutionContext {
    ExecutionContext::create("test-caller")
}

async fn seed_order(h: &Harness, order_id: &str) {
    let now = Utc::now();
    h.store
        .upsert_order(&Order {
            id: order_id.to_string(),
            buyer_id: "buyer-1".to_string(),
            seller_id: "seller-1".to_string(),
            pool_id: "zone-a".to_string(),
            status: OrderStatus::Dispatching,
            fulfillment_mode: FulfillmentMode::LocalAgent,
            created_at: now,
            updated_at: now,
        })
        .await
        .unwrap();
}

/// Riders ranked by recency: rider-0 freshest, so first in ranking order.
async fn seed_riders(h: &Harness, count: usize) {
    for i in 0..count {
        h.store
            .upsert_rider(&Rider {
                id: format!("rider-{}", i),
                pool_ids: vec!["zone-a".to_string()],
                availability: RiderAvailability::Online,
                tier: RiderTier::Standard,
                zone_distance_km: 1.0,
                last_seen_at: Utc::now() - ChronoDuration::seconds(i as i64 * 10),
            })
            .await
            .unwrap();
    }
}

async fn create_job(h: &Harness, order_id: &str, mode: BroadcastMode) -> String {
    match h
        .create
        .execute(
            CreateDispatchJobCommand {
                order_id: order_id.to_string(),
                mode: Some(mode),
            },
            ctx(),
        )
        .await
        .into_result()
        .unwrap()
    {
        CreateJobOutcome::Created { job_id } => job_id,
        CreateJobOutcome::Existing { job_id } => job_id,
    }
}

async fn broadcast(h: &Harness, job_id: &str) -> BroadcastOutcome {
    h.broadcast
        .execute(
            BroadcastOffersCommand {
                job_id: job_id.to_string(),
                mode: None,
            },
            ctx(),
        )
        .await
        .into_result()
        .unwrap()
}

async fn respond(h: &Harness, offer_id: &str, rider_id: &str, decision: OfferDecision) -> RespondOutcome {
    h.respond
        .execute(
            RespondCommand {
                offer_id: offer_id.to_string(),
                rider_id: rider_id.to_string(),
                decision,
            },
            ctx(),
        )
        .await
        .into_result()
        .unwrap()
}

#[tokio::test]
async fn parallel_broadcast_offers_whole_pool() {
    let h = harness(ExhaustionPolicy::Expire);
    seed_order(&h, "order-1").await;
    seed_riders(&h, 3).await;

    let job_id = create_job(&h, "order-1", BroadcastMode::Parallel).await;
    let outcome = broadcast(&h, &job_id).await;

    match outcome {
        BroadcastOutcome::Broadcast { offer_ids } => assert_eq!(offer_ids.len(), 3),
        other => panic!("Unexpected outcome: {:?}", other),
    }

    let job = h.store.find_job(&job_id).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Broadcasting);

    let offers = h.store.find_offers_for_job(&job_id).await.unwrap();
    assert_eq!(offers.len(), 3);
    assert!(offers.iter().all(|o| o.status == OfferStatus::Sent));

    // One notification per rider plus one broadcast snapshot
    let items = h.store.outbox_items();
    let notifications = items
        .iter()
        .filter(|i| i.item_type == OutboxItemType::Notification)
        .count();
    let broadcasts = items
        .iter()
        .filter(|i| i.item_type == OutboxItemType::Broadcast)
        .count();
    assert_eq!(notifications, 3);
    assert_eq!(broadcasts, 1);
}

#[tokio::test]
async fn decline_then_accept_assigns_the_acceptor() {
    let h = harness(ExhaustionPolicy::Expire);
    seed_order(&h, "order-1").await;
    seed_riders(&h, 2).await;

    let job_id = create_job(&h, "order-1", BroadcastMode::Parallel).await;
    broadcast(&h, &job_id).await;

    let offers = h.store.find_offers_for_job(&job_id).await.unwrap();
    let offer_a = offers.iter().find(|o| o.rider_id == "rider-0").unwrap();
    let offer_b = offers.iter().find(|o| o.rider_id == "rider-1").unwrap();

    // A declines: the job keeps broadcasting, B's offer stays open
    let outcome = respond(&h, &offer_a.id, "rider-0", OfferDecision::Decline).await;
    assert_eq!(outcome, RespondOutcome::Declined(AdvanceOutcome::StillBroadcasting));
    let job = h.store.find_job(&job_id).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Broadcasting);

    // B accepts and wins
    let outcome = respond(&h, &offer_b.id, "rider-1", OfferDecision::Accept).await;
    assert!(matches!(outcome, RespondOutcome::Accepted { .. }));

    let job = h.store.find_job(&job_id).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Assigned);
    assert_eq!(job.assigned_rider_id.as_deref(), Some("rider-1"));

    // A's decline is untouched by the assignment
    let offers = h.store.find_offers_for_job(&job_id).await.unwrap();
    let offer_a = offers.iter().find(|o| o.rider_id == "rider-0").unwrap();
    assert_eq!(offer_a.status, OfferStatus::Declined);

    // The order moved along with the assignment
    let order = h.store.find_order("order-1").await.unwrap().unwrap();
    assert_eq!(order.status, OrderStatus::AssignedToRider);
}

#[tokio::test]
async fn concurrent_accepts_resolve_to_exactly_one_winner() {
    let h = harness(ExhaustionPolicy::Expire);
    seed_order(&h, "order-1").await;
    seed_riders(&h, 8).await;

    let job_id = create_job(&h, "order-1", BroadcastMode::Parallel).await;
    broadcast(&h, &job_id).await;
    let offers = h.store.find_offers_for_job(&job_id).await.unwrap();
    assert_eq!(offers.len(), 8);

    let mut handles = Vec::new();
    for offer in offers {
        let respond = h.respond.clone();
        handles.push(tokio::spawn(async move {
            respond
                .execute(
                    RespondCommand {
                        offer_id: offer.id.clone(),
                        rider_id: offer.rider_id.clone(),
                        decision: OfferDecision::Accept,
                    },
                    ExecutionContext::create(&offer.rider_id),
                )
                .await
                .into_result()
                .unwrap()
        }));
    }

    let mut wins = 0;
    let mut stale = 0;
    for handle in handles {
        match handle.await.unwrap() {
            RespondOutcome::Accepted { .. } => wins += 1,
            RespondOutcome::Stale => stale += 1,
            other => panic!("Unexpected outcome: {:?}", other),
        }
    }
    assert_eq!(wins, 1);
    assert_eq!(stale, 7);

    // The winning offer is the assigned rider's, and it is the only accept
    let job = h.store.find_job(&job_id).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Assigned);
    let offers = h.store.find_offers_for_job(&job_id).await.unwrap();
    let accepted: Vec<_> = offers
        .iter()
        .filter(|o| o.status == OfferStatus::Accepted)
        .collect();
    assert_eq!(accepted.len(), 1);
    assert_eq!(
        job.assigned_rider_id.as_deref(),
        Some(accepted[0].rider_id.as_str())
    );
}

#[tokio::test]
async fn resolved_offers_never_change_again() {
    let h = harness(ExhaustionPolicy::Expire);
    seed_order(&h, "order-1").await;
    seed_riders(&h, 2).await;

    let job_id = create_job(&h, "order-1", BroadcastMode::Parallel).await;
    broadcast(&h, &job_id).await;
    let offers = h.store.find_offers_for_job(&job_id).await.unwrap();
    let winner = &offers[0];
    let loser = &offers[1];

    respond(&h, &winner.id, &winner.rider_id, OfferDecision::Accept).await;

    // The loser's offer expired with the assignment; responses are stale no-ops
    assert_eq!(
        respond(&h, &loser.id, &loser.rider_id, OfferDecision::Accept).await,
        RespondOutcome::Stale
    );
    assert_eq!(
        respond(&h, &loser.id, &loser.rider_id, OfferDecision::Decline).await,
        RespondOutcome::Stale
    );

    // An expiry sweep never overwrites the accepted offer
    let summary = h
        .expire
        .execute(
            ExpireStaleOffersCommand {
                ttl: std::time::Duration::from_secs(0),
                batch_size: 100,
            },
            ctx(),
        )
        .await
        .into_result()
        .unwrap();
    assert_eq!(summary.expired_offers, 0);

    let offers = h.store.find_offers_for_job(&job_id).await.unwrap();
    let winner = offers.iter().find(|o| o.id == winner.id).unwrap();
    assert_eq!(winner.status, OfferStatus::Accepted);
}

#[tokio::test]
async fn responder_mismatch_is_rejected_without_mutation() {
    let h = harness(ExhaustionPolicy::Expire);
    seed_order(&h, "order-1").await;
    seed_riders(&h, 1).await;

    let job_id = create_job(&h, "order-1", BroadcastMode::Parallel).await;
    broadcast(&h, &job_id).await;
    let offers = h.store.find_offers_for_job(&job_id).await.unwrap();

    let result = h
        .respond
        .execute(
            RespondCommand {
                offer_id: offers[0].id.clone(),
                rider_id: "rider-impostor".to_string(),
                decision: OfferDecision::Accept,
            },
            ctx(),
        )
        .await
        .into_result();

    let err = result.unwrap_err();
    assert_eq!(err.code(), "RESPONDER_MISMATCH");

    let offer = h.store.find_offer(&offers[0].id).await.unwrap().unwrap();
    assert_eq!(offer.status, OfferStatus::Sent);
}

#[tokio::test]
async fn unknown_offer_is_not_found() {
    let h = harness(ExhaustionPolicy::Expire);
    let result = h
        .respond
        .execute(
            RespondCommand {
                offer_id: "missing".to_string(),
                rider_id: "rider-0".to_string(),
                decision: OfferDecision::Accept,
            },
            ctx(),
        )
        .await
        .into_result();
    assert_eq!(result.unwrap_err().code(), "OFFER_NOT_FOUND");
}

#[tokio::test]
async fn sequential_mode_walks_the_ranking_one_at_a_time() {
    let h = harness(ExhaustionPolicy::Expire);
    seed_order(&h, "order-1").await;
    seed_riders(&h, 3).await;

    let job_id = create_job(&h, "order-1", BroadcastMode::Sequential).await;
    let outcome = broadcast(&h, &job_id).await;
    match outcome {
        BroadcastOutcome::Broadcast { offer_ids } => assert_eq!(offer_ids.len(), 1),
        other => panic!("Unexpected outcome: {:?}", other),
    }

    // Best-ranked candidate (freshest heartbeat) goes first
    let offers = h.store.find_offers_for_job(&job_id).await.unwrap();
    assert_eq!(offers[0].rider_id, "rider-0");

    // Decline advances to the next candidate
    let outcome = respond(&h, &offers[0].id, "rider-0", OfferDecision::Decline).await;
    match outcome {
        RespondOutcome::Declined(AdvanceOutcome::Advanced { offer_ids }) => {
            assert_eq!(offer_ids.len(), 1)
        }
        other => panic!("Unexpected outcome: {:?}", other),
    }

    let offers = h.store.find_offers_for_job(&job_id).await.unwrap();
    assert_eq!(offers.len(), 2);
    let open: Vec<_> = offers.iter().filter(|o| o.status.is_open()).collect();
    assert_eq!(open.len(), 1);
    assert_eq!(open[0].rider_id, "rider-1");
}

#[tokio::test]
async fn sequential_exhaustion_expires_without_ever_assigning() {
    let h = harness(ExhaustionPolicy::Expire);
    seed_order(&h, "order-1").await;
    seed_riders(&h, 3).await;

    let job_id = create_job(&h, "order-1", BroadcastMode::Sequential).await;
    broadcast(&h, &job_id).await;

    // Every candidate declines in turn
    for _ in 0..3 {
        let offers = h.store.find_offers_for_job(&job_id).await.unwrap();
        let open = offers.iter().find(|o| o.status.is_open());
        let Some(open) = open else { break };
        respond(&h, &open.id, &open.rider_id, OfferDecision::Decline).await;
    }

    let job = h.store.find_job(&job_id).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Expired);
    assert!(job.assigned_rider_id.is_none());

    let offers = h.store.find_offers_for_job(&job_id).await.unwrap();
    assert_eq!(offers.len(), 3);
    assert!(offers.iter().all(|o| o.status == OfferStatus::Declined));
}

#[tokio::test]
async fn rebroadcast_policy_gives_the_pool_another_round() {
    let h = harness(ExhaustionPolicy::Rebroadcast { limit: 1 });
    seed_order(&h, "order-1").await;
    seed_riders(&h, 2).await;

    let job_id = create_job(&h, "order-1", BroadcastMode::Parallel).await;
    broadcast(&h, &job_id).await;

    // Both decline; the first exhaustion triggers a rebroadcast round
    let offers = h.store.find_offers_for_job(&job_id).await.unwrap();
    respond(&h, &offers[0].id, &offers[0].rider_id, OfferDecision::Decline).await;
    let outcome = respond(&h, &offers[1].id, &offers[1].rider_id, OfferDecision::Decline).await;
    match outcome {
        RespondOutcome::Declined(AdvanceOutcome::Rebroadcast { round, ref offer_ids }) => {
            assert_eq!(round, 1);
            assert_eq!(offer_ids.len(), 2);
        }
        other => panic!("Unexpected outcome: {:?}", other),
    }

    let job = h.store.find_job(&job_id).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Broadcasting);
    assert_eq!(job.rebroadcast_count, 1);

    // Second full decline round exhausts the limit and expires the job
    let offers = h.store.find_offers_for_job(&job_id).await.unwrap();
    for offer in offers.iter().filter(|o| o.status.is_open()) {
        respond(&h, &offer.id, &offer.rider_id, OfferDecision::Decline).await;
    }

    let job = h.store.find_job(&job_id).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Expired);
}

#[tokio::test]
async fn cancel_interrupts_broadcast_and_stales_late_responses() {
    let h = harness(ExhaustionPolicy::Expire);
    seed_order(&h, "order-1").await;
    seed_riders(&h, 2).await;

    let job_id = create_job(&h, "order-1", BroadcastMode::Parallel).await;
    broadcast(&h, &job_id).await;
    let offers = h.store.find_offers_for_job(&job_id).await.unwrap();

    let outcome = h
        .cancel
        .execute(CancelJobCommand { job_id: job_id.clone() }, ctx())
        .await
        .into_result()
        .unwrap();
    assert_eq!(outcome, CancelOutcome::Cancelled);

    let job = h.store.find_job(&job_id).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Cancelled);
    let offers_after = h.store.find_offers_for_job(&job_id).await.unwrap();
    assert!(offers_after.iter().all(|o| o.status == OfferStatus::Expired));

    // A response landing after the cancel is a stale no-op
    let outcome = respond(&h, &offers[0].id, &offers[0].rider_id, OfferDecision::Accept).await;
    assert_eq!(outcome, RespondOutcome::Stale);

    // Cancelling twice is rejected as a business rule
    let result = h
        .cancel
        .execute(CancelJobCommand { job_id }, ctx())
        .await
        .into_result();
    assert_eq!(result.unwrap_err().code(), "JOB_ALREADY_RESOLVED");
}

#[tokio::test]
async fn ttl_sweep_expires_and_advances() {
    let h = harness(ExhaustionPolicy::Expire);
    seed_order(&h, "order-1").await;
    seed_riders(&h, 2).await;

    let job_id = create_job(&h, "order-1", BroadcastMode::Sequential).await;
    broadcast(&h, &job_id).await;

    tokio::time::sleep(std::time::Duration::from_millis(20)).await;

    // Zero TTL: the open offer is stale; the sweep expires it and the
    // sequential job advances to the next candidate
    let summary = h
        .expire
        .execute(
            ExpireStaleOffersCommand {
                ttl: std::time::Duration::from_secs(0),
                batch_size: 100,
            },
            ctx(),
        )
        .await
        .into_result()
        .unwrap();
    assert_eq!(summary.expired_offers, 1);
    assert_eq!(summary.jobs_advanced, 1);

    let offers = h.store.find_offers_for_job(&job_id).await.unwrap();
    assert_eq!(offers.len(), 2);
    assert_eq!(
        offers.iter().filter(|o| o.status == OfferStatus::Expired).count(),
        1
    );
    assert_eq!(offers.iter().filter(|o| o.status.is_open()).count(), 1);
}

#[tokio::test]
async fn job_creation_is_idempotent_per_order() {
    let h = harness(ExhaustionPolicy::Expire);
    seed_order(&h, "order-1").await;

    let first = h
        .create
        .execute(
            CreateDispatchJobCommand {
                order_id: "order-1".to_string(),
                mode: None,
            },
            ctx(),
        )
        .await
        .into_result()
        .unwrap();
    let CreateJobOutcome::Created { job_id } = first else {
        panic!("Expected creation");
    };

    let second = h
        .create
        .execute(
            CreateDispatchJobCommand {
                order_id: "order-1".to_string(),
                mode: None,
            },
            ctx(),
        )
        .await
        .into_result()
        .unwrap();
    assert_eq!(second, CreateJobOutcome::Existing { job_id });
}

#[tokio::test]
async fn empty_pool_expires_the_job_on_first_broadcast() {
    let h = harness(ExhaustionPolicy::Expire);
    seed_order(&h, "order-1").await;
    // No riders seeded

    let job_id = create_job(&h, "order-1", BroadcastMode::Parallel).await;
    let outcome = broadcast(&h, &job_id).await;
    assert_eq!(outcome, BroadcastOutcome::PoolExhausted);

    let job = h.store.find_job(&job_id).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Expired);
    assert!(h.store.find_offers_for_job(&job_id).await.unwrap().is_empty());
}

#[tokio::test]
async fn mark_seen_is_informational_and_guarded() {
    let h = harness(ExhaustionPolicy::Expire);
    seed_order(&h, "order-1").await;
    seed_riders(&h, 1).await;

    let job_id = create_job(&h, "order-1", BroadcastMode::Parallel).await;
    broadcast(&h, &job_id).await;
    let offers = h.store.find_offers_for_job(&job_id).await.unwrap();

    let changed = h
        .respond
        .mark_seen(&offers[0].id, "rider-0")
        .await
        .into_result()
        .unwrap();
    assert!(changed);

    let offer = h.store.find_offer(&offers[0].id).await.unwrap().unwrap();
    assert_eq!(offer.status, OfferStatus::Seen);

    // Seen offers can still be accepted
    let outcome = respond(&h, &offers[0].id, "rider-0", OfferDecision::Accept).await;
    assert!(matches!(outcome, RespondOutcome::Accepted { .. }));

    // Seen is unreachable once the offer resolved
    let changed = h
        .respond
        .mark_seen(&offers[0].id, "rider-0")
        .await
        .into_result()
        .unwrap();
    assert!(!changed);
}
