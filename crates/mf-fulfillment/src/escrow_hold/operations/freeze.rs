//! Freeze Hold Use Case
//!
//! Administrative lock on a hold pending investigation. Unlike release,
//! an illegal freeze is an error: the caller asked for a specific
//! transition and the hold is not in a state to take it.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;

use super::events::HoldFrozen;
use crate::escrow_hold::entity::HoldStatus;
use crate::escrow_hold::repository::EscrowStore;
use crate::usecase::domain_event::{broadcast_item, order_channel};
use crate::usecase::{ExecutionContext, UseCaseError, UseCaseResult};

/// Command for freezing a hold.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FreezeHoldCommand {
    pub hold_id: String,
    pub reason: String,
}

/// Use case for the administrative freeze transition.
pub struct FreezeHoldUseCase {
    escrow_store: Arc<dyn EscrowStore>,
}

impl FreezeHoldUseCase {
    pub fn new(escrow_store: Arc<dyn EscrowStore>) -> Self {
        Self { escrow_store }
    }

    pub async fn execute(
        &self,
        command: FreezeHoldCommand,
        ctx: ExecutionContext,
    ) -> UseCaseResult<()> {
        if command.reason.trim().is_empty() {
            return UseCaseResult::failure(UseCaseError::validation(
                "REASON_REQUIRED",
                "A freeze reason is required",
            ));
        }

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
                format!("Cannot freeze a hold in status {}", hold.status.as_str()),
            ));
        }

        let event = HoldFrozen::new(&ctx, &hold.id, &hold.order_id, &command.reason);
        let mut snapshot = hold.snapshot();
        snapshot["status"] = serde_json::Value::String(HoldStatus::Frozen.as_str().to_string());
        let items = vec![broadcast_item(
            &event,
            &order_channel(&hold.order_id),
            snapshot,
        )];

        match self
            .escrow_store
            .freeze_hold(&hold.id, &command.reason, items)
            .await
        {
            Ok(true) => {
                info!(hold_id = %hold.id, reason = %command.reason, "Escrow hold frozen");
                UseCaseResult::success(())
            }
            // Lost the race after the read; the hold is no longer Held
            Ok(false) => UseCaseResult::failure(UseCaseError::business_rule(
                "HOLD_NOT_OPEN",
                "Hold resolved concurrently",
            )),
            Err(e) => UseCaseResult::failure(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_serialization() {
        let cmd = FreezeHoldCommand {
            hold_id: "hold-1".to_string(),
            reason: "chargeback investigation".to_string(),
        };

        let json = serde_json::to_string(&cmd).unwrap();
        assert!(json.contains("holdId"));
        assert!(json.contains("chargeback"));
    }
}
