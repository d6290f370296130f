//! Release Hold Use Case
//!
//! Credits held funds to the seller once every release condition holds.
//! Eligibility is a pure predicate over read-only snapshots, so the check
//! can run on every sweeper tick with no side effects on ineligible holds;
//! the mutation itself is a single guarded transaction keyed on the hold
//! still being Held, which makes the whole operation idempotent - a second
//! invocation finds the hold terminal and does nothing.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::events::HoldReleased;
use crate::escrow_hold::entity::{EscrowHold, HoldStatus};
use crate::escrow_hold::repository::EscrowStore;
use crate::order::{Dispute, FulfillmentMode, Order, OrderStatus, OrderStore, Shipment,
    ShipmentStatus};
use crate::usecase::domain_event::{broadcast_item, notification_item, order_channel};
use crate::usecase::{ExecutionContext, UseCaseError, UseCaseResult};

/// Command for releasing a hold.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReleaseHoldCommand {
    pub hold_id: String,
    /// Authorized override: skips the timing and delivery-confirmation
    /// conditions. An active dispute still blocks release.
    #[serde(default)]
    pub override_checks: bool,
}

/// A release condition that can block the operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReleaseCondition {
    /// The hold period has elapsed
    HoldMatured,
    /// The order reached Delivered
    OrderDelivered,
    /// Shipping-mode orders: the carrier confirmed delivery
    ShipmentDelivered,
    /// No dispute is Open or UnderReview
    NoActiveDispute,
}

/// Result of the eligibility predicate: the set of unmet conditions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReleaseEligibility {
    pub unmet: Vec<ReleaseCondition>,
}

impl ReleaseEligibility {
    pub fn eligible(&self) -> bool {
        self.unmet.is_empty()
    }

    /// Evaluate the release conjunction over resolved snapshots. Pure and
    /// side-effect free. The override skips the timing and delivery
    /// conditions; it never bypasses an active dispute.
    pub fn evaluate(
        hold: &EscrowHold,
        order: &Order,
        shipment: Option<&Shipment>,
        dispute: Option<&Dispute>,
        now: DateTime<Utc>,
        override_checks: bool,
    ) -> Self {
        let mut unmet = Vec::new();

        if !override_checks {
            if !hold.matured(now) {
                unmet.push(ReleaseCondition::HoldMatured);
            }
            if order.status != OrderStatus::Delivered {
                unmet.push(ReleaseCondition::OrderDelivered);
            }
            if order.fulfillment_mode == FulfillmentMode::Shipping
                && shipment.map(|s| s.status) != Some(ShipmentStatus::Delivered)
            {
                unmet.push(ReleaseCondition::ShipmentDelivered);
            }
        }

        if dispute.map(|d| d.status.blocks_release()).unwrap_or(false) {
            unmet.push(ReleaseCondition::NoActiveDispute);
        }

        Self { unmet }
    }
}

/// Outcome of a release invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReleaseOutcome {
    /// Seller credited, hold Released
    Released { amount_minor: i64 },
    /// Conditions unmet; nothing changed, safe to retry any time
    NotEligible { unmet: Vec<ReleaseCondition> },
    /// The hold was already terminal (or resolved concurrently)
    AlreadyResolved,
}

/// Use case for releasing held funds to the seller.
pub struct ReleaseHoldUseCase {
    escrow_store: Arc<dyn EscrowStore>,
    order_store: Arc<dyn OrderStore>,
}

impl ReleaseHoldUseCase {
    pub fn new(escrow_store: Arc<dyn EscrowStore>, order_store: Arc<dyn OrderStore>) -> Self {
        Self {
            escrow_store,
            order_store,
        }
    }

    pub async fn execute(
        &self,
        command: ReleaseHoldCommand,
        ctx: ExecutionContext,
    ) -> UseCaseResult<ReleaseOutcome> {
        let hold = match self.escrow_store.find_hold(&command.hold_id).await {
            Ok(Some(hold)) => hold,
            Ok(None) => {
                return UseCaseResult::failure(UseCaseError::not_found(
                    "HOLD_NOT_FOUND",
                    format!("Escrow hold '{}' not found", command.hold_id),
                ));
            }
            Err(e) => return UseCaseResult::failure(e.into()),
        };

        if hold.status != HoldStatus::Held {
            return UseCaseResult::success(ReleaseOutcome::AlreadyResolved);
        }

        let order = match self.order_store.find_order(&hold.order_id).await {
            Ok(Some(order)) => order,
            Ok(None) => {
                return UseCaseResult::failure(UseCaseError::not_found(
                    "ORDER_NOT_FOUND",
                    format!("Order '{}' not found for hold", hold.order_id),
                ));
            }
            Err(e) => return UseCaseResult::failure(e.into()),
        };

        let shipment = if order.fulfillment_mode == FulfillmentMode::Shipping {
            match self.order_store.find_shipment(&order.id).await {
                Ok(shipment) => shipment,
                Err(e) => return UseCaseResult::failure(e.into()),
            }
        } else {
            None
        };

        let dispute = match self.order_store.find_open_dispute(&order.id).await {
            Ok(dispute) => dispute,
            Err(e) => return UseCaseResult::failure(e.into()),
        };

        let eligibility = ReleaseEligibility::evaluate(
            &hold,
            &order,
            shipment.as_ref(),
            dispute.as_ref(),
            Utc::now(),
            command.override_checks,
        );

        if !eligibility.eligible() {
            return UseCaseResult::success(ReleaseOutcome::NotEligible {
                unmet: eligibility.unmet,
            });
        }

        let event = HoldReleased::new(
            &ctx,
            &hold.id,
            &hold.order_id,
            &hold.seller_account_id,
            hold.amount_minor,
            command.override_checks,
        );

        let mut snapshot = hold.snapshot();
        snapshot["status"] = serde_json::Value::String(HoldStatus::Released.as_str().to_string());
        let items = vec![
            notification_item(&event, &hold.seller_account_id),
            broadcast_item(&event, &order_channel(&hold.order_id), snapshot),
        ];

        match self.escrow_store.release_hold(&hold, items).await {
            Ok(true) => {
                info!(
                    hold_id = %hold.id,
                    order_id = %hold.order_id,
                    seller = %hold.seller_account_id,
                    amount_minor = hold.amount_minor,
                    overridden = command.override_checks,
                    "Escrow hold released"
                );
                UseCaseResult::success(ReleaseOutcome::Released {
                    amount_minor: hold.amount_minor,
                })
            }
            // Another writer resolved the hold between the read and the CAS
            Ok(false) => UseCaseResult::success(ReleaseOutcome::AlreadyResolved),
            Err(e) => UseCaseResult::failure(e.into()),
        }
    }
}
