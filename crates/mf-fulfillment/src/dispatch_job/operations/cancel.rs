//! Cancel Job Use Case
//!
//! Admin cancellation. Interrupts an in-flight broadcast through the same
//! guarded transition every other writer uses: the job moves to Cancelled,
//! its open offers expire, and any response arriving afterwards loses its
//! compare-and-set and surfaces as a stale no-op.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;

use super::events::{order_channel, JobCancelled};
use crate::dispatch_job::entity::JobStatus;
use crate::dispatch_job::repository::DispatchStore;
use crate::usecase::domain_event::{broadcast_item, notification_item};
use crate::usecase::{ExecutionContext, UseCaseError, UseCaseResult};

/// Command for cancelling a dispatch job.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelJobCommand {
    pub job_id: String,
}

/// Outcome of a cancellation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CancelOutcome {
    Cancelled,
    /// Another writer resolved the job first
    AlreadyResolved,
}

/// Use case for admin cancellation of a dispatch job.
pub struct CancelJobUseCase {
    dispatch_store: Arc<dyn DispatchStore>,
}

impl CancelJobUseCase {
    pub fn new(dispatch_store: Arc<dyn DispatchStore>) -> Self {
        Self { dispatch_store }
    }

    pub async fn execute(
        &self,
        command: CancelJobCommand,
        ctx: ExecutionContext,
    ) -> UseCaseResult<CancelOutcome> {
        let job = match self.dispatch_store.find_job(&command.job_id).await {
            Ok(Some(job)) => job,
            Ok(None) => {
                return UseCaseResult::failure(UseCaseError::not_found(
                    "JOB_NOT_FOUND",
                    format!("Dispatch job '{}' not found", command.job_id),
                ));
            }
            Err(e) => return UseCaseResult::failure(e.into()),
        };

        if job.status.is_terminal() {
            return UseCaseResult::failure(UseCaseError::business_rule(
                "JOB_ALREADY_RESOLVED",
                format!("Cannot cancel a job in status {}", job.status.as_str()),
            ));
        }

        let event = JobCancelled::new(&ctx, &job.id, &job.order_id);

        let mut snapshot = job.snapshot();
        snapshot["status"] = serde_json::Value::String(JobStatus::Cancelled.as_str().to_string());
        let mut items = vec![broadcast_item(
            &event,
            &order_channel(&job.order_id),
            snapshot,
        )];

        // Tell riders still holding an open offer that the job is gone
        let offers = match self.dispatch_store.find_offers_for_job(&job.id).await {
            Ok(offers) => offers,
            Err(e) => return UseCaseResult::failure(e.into()),
        };
        for offer in offers.iter().filter(|o| o.status.is_open()) {
            items.push(notification_item(&event, &offer.rider_id));
        }

        match self.dispatch_store.cancel_job(&job.id, items).await {
            Ok(true) => {
                info!(job_id = %job.id, order_id = %job.order_id, "Job cancelled");
                UseCaseResult::success(CancelOutcome::Cancelled)
            }
            Ok(false) => UseCaseResult::success(CancelOutcome::AlreadyResolved),
            Err(e) => UseCaseResult::failure(e.into()),
        }
    }
}
