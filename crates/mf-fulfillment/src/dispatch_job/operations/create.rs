//! Create Dispatch Job Use Case
//!
//! Entry point for the order pipeline: when an order becomes eligible for
//! rider delivery, a pending job is created for it. Idempotent under
//! at-least-once triggers - a second invocation finds the existing job.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::dispatch_job::entity::{BroadcastMode, DispatchJob};
use crate::dispatch_job::repository::DispatchStore;
use crate::order::{FulfillmentMode, OrderStore};
use crate::shared::error::StoreError;
use crate::usecase::{ExecutionContext, UseCaseError, UseCaseResult};

/// Command for creating a dispatch job for an order.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateDispatchJobCommand {
    pub order_id: String,
    /// Broadcast mode; falls back to the configured default
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<BroadcastMode>,
}

/// Outcome of job creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CreateJobOutcome {
    Created { job_id: String },
    /// The order already has a job
    Existing { job_id: String },
}

/// Use case for creating the dispatch job of an order.
pub struct CreateDispatchJobUseCase {
    dispatch_store: Arc<dyn DispatchStore>,
    order_store: Arc<dyn OrderStore>,
    default_mode: BroadcastMode,
}

impl CreateDispatchJobUseCase {
    pub fn new(
        dispatch_store: Arc<dyn DispatchStore>,
        order_store: Arc<dyn OrderStore>,
        default_mode: BroadcastMode,
    ) -> Self {
        Self {
            dispatch_store,
            order_store,
            default_mode,
        }
    }

    pub async fn execute(
        &self,
        command: CreateDispatchJobCommand,
        _ctx: ExecutionContext,
    ) -> UseCaseResult<CreateJobOutcome> {
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

        if order.fulfillment_mode != FulfillmentMode::LocalAgent {
            return UseCaseResult::failure(UseCaseError::business_rule(
                "NOT_RIDER_FULFILLED",
                "Only local-agent orders are dispatched to riders",
            ));
        }

        match self.dispatch_store.find_job_for_order(&order.id).await {
            Ok(Some(existing)) => {
                return UseCaseResult::success(CreateJobOutcome::Existing {
                    job_id: existing.id,
                });
            }
            Ok(None) => {}
            Err(e) => return UseCaseResult::failure(e.into()),
        }

        let job = DispatchJob::new(
            &order.id,
            &order.pool_id,
            command.mode.unwrap_or(self.default_mode),
        );
        let job_id = job.id.clone();

        match self.dispatch_store.insert_job(&job).await {
            Ok(()) => {
                info!(job_id = %job_id, order_id = %order.id, "Dispatch job created");
                UseCaseResult::success(CreateJobOutcome::Created { job_id })
            }
            // Lost a creation race; surface the winner
            Err(StoreError::DuplicateKey(_)) => {
                match self.dispatch_store.find_job_for_order(&order.id).await {
                    Ok(Some(existing)) => UseCaseResult::success(CreateJobOutcome::Existing {
                        job_id: existing.id,
                    }),
                    Ok(None) => UseCaseResult::failure(UseCaseError::concurrency(
                        "JOB_CREATE_RACE",
                        "Job creation raced and neither job is visible",
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
        let cmd = CreateDispatchJobCommand {
            order_id: "order-1".to_string(),
            mode: None,
        };

        let json = serde_json::to_string(&cmd).unwrap();
        assert!(json.contains("orderId"));
        assert!(!json.contains("mode"));
    }
}
