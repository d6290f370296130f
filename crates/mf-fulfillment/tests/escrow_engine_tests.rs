//! Escrow release engine scenarios against the embedded store.

use std::sync::Arc;

use chrono::{Duration, Utc};
use mf_common::OutboxItemType;
use mf_fulfillment::escrow_hold::{
    CreateHoldCommand, CreateHoldOutcome, CreateHoldUseCase, FreezeHoldCommand, FreezeHoldUseCase,
    HoldStatus, RefundHoldCommand, RefundHoldUseCase, ReleaseCondition, ReleaseHoldCommand,
    ReleaseHoldUseCase, ReleaseOutcome,
};
use mf_fulfillment::usecase::ExecutionContext;
use mf_fulfillment::{
    Dispute, DisputeStatus, EmbeddedStore, EscrowHold, EscrowStore, FulfillmentMode, Order,
    OrderStatus, OrderStore, Shipment, ShipmentStatus,
};

struct Harness {
    store: Arc<EmbeddedStore>,
    release: ReleaseHoldUseCase,
    freeze: FreezeHoldUseCase,
    refund: RefundHoldUseCase,
    create: CreateHoldUseCase,
}

fn harness() -> Harness {
    let store = Arc::new(EmbeddedStore::new());
    let escrow: Arc<dyn EscrowStore> = store.clone();

    Harness {
        store: store.clone(),
        release: ReleaseHoldUseCase::new(escrow.clone(), store.clone()),
        freeze: FreezeHoldUseCase::new(escrow.clone()),
        refund: RefundHoldUseCase::new(escrow.clone()),
        create: CreateHoldUseCase::new(escrow, store.clone(), Duration::hours(72)),
    }
}

fn ctx() -> ExecutionContext {
    ExecutionContext::create("test-caller")
}

async fn seed_order(h: &Harness, status: OrderStatus, mode: FulfillmentMode) {
    let now = Utc::now();
    h.store
        .upsert_order(&Order {
            id: "order-1".to_string(),
            buyer_id: "buyer-1".to_string(),
            seller_id: "seller-1".to_string(),
            pool_id: "zone-a".to_string(),
            status,
            fulfillment_mode: mode,
            created_at: now,
            updated_at: now,
        })
        .await
        .unwrap();
}

/// A matured hold for order-1.
async fn seed_hold(h: &Harness, amount: i64) -> String {
    let hold = EscrowHold::new(
        "order-1",
        "buyer-1",
        "seller-1",
        amount,
        Utc::now() - Duration::hours(1),
    );
    h.store.insert_hold(&hold).await.unwrap();
    hold.id
}

async fn release(h: &Harness, hold_id: &str, override_checks: bool) -> ReleaseOutcome {
    h.release
        .execute(
            ReleaseHoldCommand {
                hold_id: hold_id.to_string(),
                override_checks,
            },
            ctx(),
        )
        .await
        .into_result()
        .unwrap()
}

#[tokio::test]
async fn release_credits_seller_and_is_idempotent() {
    let h = harness();
    seed_order(&h, OrderStatus::Delivered, FulfillmentMode::LocalAgent).await;
    let hold_id = seed_hold(&h, 10_000).await;

    let outcome = release(&h, &hold_id, false).await;
    assert_eq!(outcome, ReleaseOutcome::Released { amount_minor: 10_000 });
    assert_eq!(h.store.balance("seller-1"), 10_000);

    let hold = h.store.find_hold(&hold_id).await.unwrap().unwrap();
    assert_eq!(hold.status, HoldStatus::Released);
    assert!(hold.resolved_at.is_some());

    // Second invocation finds the hold terminal; the credit happens once
    let outcome = release(&h, &hold_id, false).await;
    assert_eq!(outcome, ReleaseOutcome::AlreadyResolved);
    assert_eq!(h.store.balance("seller-1"), 10_000);

    // Release appended a seller notification and a broadcast snapshot
    let items = h.store.outbox_items();
    assert!(items
        .iter()
        .any(|i| i.item_type == OutboxItemType::Notification && i.target == "seller-1"));
    assert!(items
        .iter()
        .any(|i| i.item_type == OutboxItemType::Broadcast && i.target == "order.order-1"));
}

#[tokio::test]
async fn unmatured_hold_is_not_eligible() {
    let h = harness();
    seed_order(&h, OrderStatus::Delivered, FulfillmentMode::LocalAgent).await;
    let hold = EscrowHold::new(
        "order-1",
        "buyer-1",
        "seller-1",
        10_000,
        Utc::now() + Duration::hours(1),
    );
    h.store.insert_hold(&hold).await.unwrap();

    let outcome = release(&h, &hold.id, false).await;
    assert_eq!(
        outcome,
        ReleaseOutcome::NotEligible {
            unmet: vec![ReleaseCondition::HoldMatured]
        }
    );
    assert_eq!(h.store.balance("seller-1"), 0);
    let stored = h.store.find_hold(&hold.id).await.unwrap().unwrap();
    assert_eq!(stored.status, HoldStatus::Held);
}

#[tokio::test]
async fn undelivered_order_blocks_until_delivered() {
    let h = harness();
    seed_order(&h, OrderStatus::PickedUp, FulfillmentMode::LocalAgent).await;
    let hold_id = seed_hold(&h, 10_000).await;

    let outcome = release(&h, &hold_id, false).await;
    assert_eq!(
        outcome,
        ReleaseOutcome::NotEligible {
            unmet: vec![ReleaseCondition::OrderDelivered]
        }
    );

    // Restoring the condition unblocks the next invocation
    seed_order(&h, OrderStatus::Delivered, FulfillmentMode::LocalAgent).await;
    let outcome = release(&h, &hold_id, false).await;
    assert_eq!(outcome, ReleaseOutcome::Released { amount_minor: 10_000 });
}

#[tokio::test]
async fn shipping_order_waits_for_the_carrier() {
    let h = harness();
    seed_order(&h, OrderStatus::Delivered, FulfillmentMode::Shipping).await;
    let hold_id = seed_hold(&h, 10_000).await;

    let now = Utc::now();
    h.store
        .upsert_shipment(&Shipment {
            id: "ship-1".to_string(),
            order_id: "order-1".to_string(),
            status: ShipmentStatus::InTransit,
            updated_at: now,
        })
        .await
        .unwrap();

    // Shipment still in transit: release no-ops, the hold stays Held
    let outcome = release(&h, &hold_id, false).await;
    assert_eq!(
        outcome,
        ReleaseOutcome::NotEligible {
            unmet: vec![ReleaseCondition::ShipmentDelivered]
        }
    );
    let hold = h.store.find_hold(&hold_id).await.unwrap().unwrap();
    assert_eq!(hold.status, HoldStatus::Held);

    // Carrier confirms delivery: the next invocation releases
    h.store
        .upsert_shipment(&Shipment {
            id: "ship-1".to_string(),
            order_id: "order-1".to_string(),
            status: ShipmentStatus::Delivered,
            updated_at: Utc::now(),
        })
        .await
        .unwrap();
    let outcome = release(&h, &hold_id, false).await;
    assert_eq!(outcome, ReleaseOutcome::Released { amount_minor: 10_000 });
    assert_eq!(h.store.balance("seller-1"), 10_000);
}

#[tokio::test]
async fn active_dispute_blocks_release_even_with_override() {
    let h = harness();
    seed_order(&h, OrderStatus::Delivered, FulfillmentMode::LocalAgent).await;
    let hold_id = seed_hold(&h, 10_000).await;

    h.store
        .upsert_dispute(&Dispute {
            id: "disp-1".to_string(),
            order_id: "order-1".to_string(),
            status: DisputeStatus::Open,
            opened_at: Utc::now(),
        })
        .await
        .unwrap();

    let outcome = release(&h, &hold_id, false).await;
    assert_eq!(
        outcome,
        ReleaseOutcome::NotEligible {
            unmet: vec![ReleaseCondition::NoActiveDispute]
        }
    );

    let outcome = release(&h, &hold_id, true).await;
    assert_eq!(
        outcome,
        ReleaseOutcome::NotEligible {
            unmet: vec![ReleaseCondition::NoActiveDispute]
        }
    );

    // Dispute resolved: release goes through
    h.store
        .upsert_dispute(&Dispute {
            id: "disp-1".to_string(),
            order_id: "order-1".to_string(),
            status: DisputeStatus::Resolved,
            opened_at: Utc::now(),
        })
        .await
        .unwrap();
    let outcome = release(&h, &hold_id, false).await;
    assert_eq!(outcome, ReleaseOutcome::Released { amount_minor: 10_000 });
}

#[tokio::test]
async fn override_bypasses_timing_and_delivery_conditions() {
    let h = harness();
    seed_order(&h, OrderStatus::PickedUp, FulfillmentMode::LocalAgent).await;
    let hold = EscrowHold::new(
        "order-1",
        "buyer-1",
        "seller-1",
        10_000,
        Utc::now() + Duration::hours(48),
    );
    h.store.insert_hold(&hold).await.unwrap();

    let outcome = release(&h, &hold.id, true).await;
    assert_eq!(outcome, ReleaseOutcome::Released { amount_minor: 10_000 });
    assert_eq!(h.store.balance("seller-1"), 10_000);
}

#[tokio::test]
async fn freeze_locks_an_open_hold_and_rejects_terminal_ones() {
    let h = harness();
    seed_order(&h, OrderStatus::Delivered, FulfillmentMode::LocalAgent).await;
    let hold_id = seed_hold(&h, 10_000).await;

    h.freeze
        .execute(
            FreezeHoldCommand {
                hold_id: hold_id.clone(),
                reason: "chargeback investigation".to_string(),
            },
            ctx(),
        )
        .await
        .into_result()
        .unwrap();

    let hold = h.store.find_hold(&hold_id).await.unwrap().unwrap();
    assert_eq!(hold.status, HoldStatus::Frozen);
    assert_eq!(hold.frozen_reason.as_deref(), Some("chargeback investigation"));

    // Frozen is terminal: release no-ops, refund and re-freeze are rejected
    let outcome = release(&h, &hold_id, false).await;
    assert_eq!(outcome, ReleaseOutcome::AlreadyResolved);

    let result = h
        .refund
        .execute(RefundHoldCommand { hold_id: hold_id.clone() }, ctx())
        .await
        .into_result();
    assert_eq!(result.unwrap_err().code(), "HOLD_NOT_OPEN");

    let result = h
        .freeze
        .execute(
            FreezeHoldCommand {
                hold_id,
                reason: "again".to_string(),
            },
            ctx(),
        )
        .await
        .into_result();
    assert_eq!(result.unwrap_err().code(), "HOLD_NOT_OPEN");
}

#[tokio::test]
async fn refund_credits_the_buyer_once() {
    let h = harness();
    seed_order(&h, OrderStatus::Cancelled, FulfillmentMode::LocalAgent).await;
    let hold_id = seed_hold(&h, 7_500).await;

    h.refund
        .execute(RefundHoldCommand { hold_id: hold_id.clone() }, ctx())
        .await
        .into_result()
        .unwrap();

    assert_eq!(h.store.balance("buyer-1"), 7_500);
    assert_eq!(h.store.balance("seller-1"), 0);

    let hold = h.store.find_hold(&hold_id).await.unwrap().unwrap();
    assert_eq!(hold.status, HoldStatus::Refunded);

    // Refunded is terminal
    let result = h
        .refund
        .execute(RefundHoldCommand { hold_id }, ctx())
        .await
        .into_result();
    assert_eq!(result.unwrap_err().code(), "HOLD_NOT_OPEN");
    assert_eq!(h.store.balance("buyer-1"), 7_500);
}

#[tokio::test]
async fn hold_creation_is_idempotent_per_order() {
    let h = harness();
    seed_order(&h, OrderStatus::Paid, FulfillmentMode::LocalAgent).await;

    let first = h
        .create
        .execute(
            CreateHoldCommand {
                order_id: "order-1".to_string(),
                amount_minor: 5_000,
            },
            ctx(),
        )
        .await
        .into_result()
        .unwrap();
    let CreateHoldOutcome::Created { hold_id } = first else {
        panic!("Expected creation");
    };

    let second = h
        .create
        .execute(
            CreateHoldCommand {
                order_id: "order-1".to_string(),
                amount_minor: 5_000,
            },
            ctx(),
        )
        .await
        .into_result()
        .unwrap();
    assert_eq!(second, CreateHoldOutcome::Existing { hold_id });
}

#[tokio::test]
async fn missing_hold_is_a_structural_error() {
    let h = harness();
    let result = h
        .release
        .execute(
            ReleaseHoldCommand {
                hold_id: "missing".to_string(),
                override_checks: false,
            },
            ctx(),
        )
        .await
        .into_result();
    assert_eq!(result.unwrap_err().code(), "HOLD_NOT_FOUND");
}

#[tokio::test]
async fn concurrent_releases_credit_exactly_once() {
    let h = harness();
    seed_order(&h, OrderStatus::Delivered, FulfillmentMode::LocalAgent).await;
    let hold_id = seed_hold(&h, 10_000).await;

    let release_uc = Arc::new(ReleaseHoldUseCase::new(
        h.store.clone() as Arc<dyn EscrowStore>,
        h.store.clone(),
    ));

    let mut handles = Vec::new();
    for _ in 0..8 {
        let release_uc = release_uc.clone();
        let hold_id = hold_id.clone();
        handles.push(tokio::spawn(async move {
            release_uc
                .execute(
                    ReleaseHoldCommand {
                        hold_id,
                        override_checks: false,
                    },
                    ExecutionContext::system(),
                )
                .await
                .into_result()
                .unwrap()
        }));
    }

    let mut released = 0;
    for handle in handles {
        if let ReleaseOutcome::Released { .. } = handle.await.unwrap() {
            released += 1;
        }
    }
    assert_eq!(released, 1);
    assert_eq!(h.store.balance("seller-1"), 10_000);
}
