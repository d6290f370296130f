//! Create Hold Use Case
//!
//! Entry point for the payment pipeline: when payment for an order is
//! captured, its funds go into a hold. Idempotent under at-least-once
//! triggers - a second invocation finds the existing hold.

use std::sync::Arc;

use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::escrow_hold::entity::EscrowHold;
use crate::escrow_hold::repository::EscrowStore;
use crate::order::OrderStore;
use crate::shared::error::StoreError;
use crate::usecase::{ExecutionContext, UseCaseError, UseCaseResult};

/// Command for creating a hold from captured payment.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateHoldCommand {
    pub order_id: String,
    /// Captured amount in minor currency units
    pub amount_minor: i64,
}

/// Outcome of hold creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CreateHoldOutcome {
    Created { hold_id: String },
    /// The order's payment is already held
    Existing { hold_id: String },
}

/// Use case for creating the escrow hold of an order.
pub struct CreateHoldUseCase {
    escrow_store: Arc<dyn EscrowStore>,
    order_store: Arc<dyn OrderStore>,
    /// Hold period before funds become releasable
    hold_period: Duration,
}

impl CreateHoldUseCase {
    pub fn new(
        escrow_store: Arc<dyn EscrowStore>,
        order_store: Arc<dyn OrderStore>,
        hold_period: Duration,
    ) -> Self {
        Self {
            escrow_store,
            order_store,
            hold_period,
        }
    }

    pub async fn execute(
        &self,
        command: CreateHoldCommand,
        _ctx: ExecutionContext,
    ) -> UseCaseResult<CreateHoldOutcome> {
        if command.amount_minor <= 0 {
            return UseCaseResult::failure(UseCaseError::validation(
                "AMOUNT_INVALID",
                "Hold amount must be positive",
            ));
        }

        let order = match self.order_store.find_order(&command.order_id).await {
            Ok(Some(order)) => order,
            Ok(None) => {
                return UseCaseResult::failure(UseCaseError::not_found(
                    "ORDER_NOT_FOUND",
                    format!("Order '{}' not found", command.order_id),
                ));
            }
            Err(e) => return UseCaseResult::failure(e.into()),
        };

        match self.escrow_store.find_hold_for_order(&order.id).await {
            Ok(Some(existing)) => {
                return UseCaseResult::success(CreateHoldOutcome::Existing {
                    hold_id: existing.id,
                });
            }
            Ok(None) => {}
            Err(e) => return UseCaseResult::failure(e.into()),
        }

        let hold = EscrowHold::new(
            &order.id,
            &order.buyer_id,
            &order.seller_id,
            command.amount_minor,
            Utc::now() + self.hold_period,
        );
        let hold_id = hold.id.clone();

        match self.escrow_store.insert_hold(&hold).await {
            Ok(()) => {
                info!(
                    hold_id = %hold_id,
                    order_id = %order.id,
                    amount_minor = command.amount_minor,
                    "Escrow hold created"
                );
                UseCaseResult::success(CreateHoldOutcome::Created { hold_id })
            }
            // Lost a creation race; surface the winner
            Err(StoreError::DuplicateKey(_)) => {
                match self.escrow_store.find_hold_for_order(&order.id).await {
                    Ok(Some(existing)) => UseCaseResult::success(CreateHoldOutcome::Existing {
                        hold_id: existing.id,
                    }),
                    Ok(None) => UseCaseResult::failure(UseCaseError::concurrency(
                        "HOLD_CREATE_RACE",
                        "Hold creation raced and neither hold is visible",
                    )),
                    Err(e) => UseCaseResult::failure(e.into()),
                }
            }
            Err(e) => UseCaseResult::failure(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_serialization() {
        let cmd = CreateHoldCommand {
            order_id: "order-1".to_string(),
            amount_minor: 12_500,
        };

        let json = serde_json::to_string(&cmd).unwrap();
        assert!(json.contains("orderId"));
        assert!(json.contains("12500"));
    }
}
