//! Refund Hold Use Case
//!
//! Administrative return of held funds to the buyer: one guarded
//! transaction pairing the Held to Refunded transition with the buyer
//! ledger credit.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;

use super::events::HoldRefunded;
use crate::escrow_hold::entity::HoldStatus;
use crate::escrow_hold::repository::EscrowStore;
use crate::usecase::domain_event::{broadcast_item, notification_item, order_channel};
use crate::usecase::{ExecutionContext, UseCaseError, UseCaseResult};

/// Command for refunding a hold.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefundHoldCommand {
    pub hold_id: String,
}

/// Use case for the administrative refund transition.
pub struct RefundHoldUseCase {
    escrow_store: Arc<dyn EscrowStore>,
}

impl RefundHoldUseCase {
    pub fn new(escrow_store: Arc<dyn EscrowStore>) -> Self {
        Self { escrow_store }
    }

    pub async fn execute(
        &self,
        command: RefundHoldCommand,
        ctx: ExecutionContext,
    ) -> UseCaseResult<()> {
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
            return UseCaseResult::failure(UseCaseError::business_rule(
                "HOLD_NOT_OPEN",
                format!("Cannot refund a hold in status {}", hold.status.as_str()),
            ));
        }

        let event = HoldRefunded::new(
            &ctx,
            &hold.id,
            &hold.order_id,
            &hold.buyer_account_id,
            hold.amount_minor,
        );

        let mut snapshot = hold.snapshot();
        snapshot["status"] = serde_json::Value::String(HoldStatus::Refunded.as_str().to_string());
        let items = vec![
            notification_item(&event, &hold.buyer_account_id),
            broadcast_item(&event, &order_channel(&hold.order_id), snapshot),
        ];

        match self.escrow_store.refund_hold(&hold, items).await {
            Ok(true) => {
                info!(
                    hold_id = %hold.id,
                    buyer = %hold.buyer_account_id,
                    amount_minor = hold.amount_minor,
                    "Escrow hold refunded"
                );
                UseCaseResult::success(())
            }
            Ok(false) => UseCaseResult::failure(UseCaseError::business_rule(
                "HOLD_NOT_OPEN",
                "Hold resolved concurrently",
            )),
            Err(e) => UseCaseResult::failure(e.into()),
        }
    }
}
