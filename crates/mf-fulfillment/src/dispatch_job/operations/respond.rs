//! Respond To Offer Use Case
//!
//! Applies a rider's answer to an offer. Acceptance is exactly-once
//! effective: the store transaction lets precisely one concurrent accepter
//! observe its offer still open and win the job; every other responder
//! gets a stale no-op, never an error. A decline in parallel mode leaves
//! the job broadcasting while other offers are open; once the round is
//! exhausted, the advancement step takes over.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;

use super::advance::{self, AdvanceOutcome, ExhaustionPolicy};
use super::events::{order_channel, JobAssigned, OfferAccepted, OfferDeclined};
use crate::details;
use crate::dispatch_job::entity::{JobStatus, OfferDecision};
use crate::dispatch_job::repository::{AcceptOutcome, DispatchStore};
use crate::rider::PoolSelector;
use crate::usecase::domain_event::{broadcast_item, notification_item};
use crate::usecase::{ExecutionContext, UseCaseError, UseCaseResult};

/// Command carrying a rider's response to an offer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RespondCommand {
    pub offer_id: String,
    /// Must match the offer's rider
    pub rider_id: String,
    pub decision: OfferDecision,
}

/// Outcome of a response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RespondOutcome {
    /// This rider won the job
    Accepted { job_id: String, order_id: String },
    /// Decline recorded; carries what the job did next
    Declined(AdvanceOutcome),
    /// The offer or its job was already resolved; nothing changed
    Stale,
}

/// Use case for applying a rider's accept/decline to an offer.
pub struct RespondToOfferUseCase {
    dispatch_store: Arc<dyn DispatchStore>,
    selector: PoolSelector,
    exhaustion: ExhaustionPolicy,
}

impl RespondToOfferUseCase {
    pub fn new(
        dispatch_store: Arc<dyn DispatchStore>,
        selector: PoolSelector,
        exhaustion: ExhaustionPolicy,
    ) -> Self {
        Self {
            dispatch_store,
            selector,
            exhaustion,
        }
    }

    pub async fn execute(
        &self,
        command: RespondCommand,
        ctx: ExecutionContext,
    ) -> UseCaseResult<RespondOutcome> {
        let offer = match self.dispatch_store.find_offer(&command.offer_id).await {
            Ok(Some(offer)) => offer,
            Ok(None) => {
                return UseCaseResult::failure(UseCaseError::not_found(
                    "OFFER_NOT_FOUND",
                    format!("Offer '{}' not found", command.offer_id),
                ));
            }
            Err(e) => return UseCaseResult::failure(e.into()),
        };

        if offer.rider_id != command.rider_id {
            return UseCaseResult::failure(UseCaseError::validation_with_details(
                "RESPONDER_MISMATCH",
                "Offer belongs to another rider",
                details! { "offerId" => command.offer_id, "riderId" => command.rider_id },
            ));
        }

        if offer.status.is_terminal() {
            // Resolved elsewhere already; redundant responses are harmless
            return UseCaseResult::success(RespondOutcome::Stale);
        }

        let job = match self.dispatch_store.find_job(&offer.job_id).await {
            Ok(Some(job)) => job,
            Ok(None) => {
                return UseCaseResult::failure(UseCaseError::not_found(
                    "JOB_NOT_FOUND",
                    format!("Dispatch job '{}' not found", offer.job_id),
                ));
            }
            Err(e) => return UseCaseResult::failure(e.into()),
        };

        if job.status.is_terminal() {
            return UseCaseResult::success(RespondOutcome::Stale);
        }

        match command.decision {
            OfferDecision::Accept => {
                let accepted =
                    OfferAccepted::new(&ctx, &offer.id, &job.id, &job.order_id, &offer.rider_id);
                let assigned = JobAssigned::new(&ctx, &job.id, &job.order_id, &offer.rider_id);

                // Snapshot reflects the post-acceptance state
                let mut assigned_job = job.clone();
                assigned_job.status = JobStatus::Assigned;
                assigned_job.assigned_rider_id = Some(offer.rider_id.clone());

                let items = vec![
                    notification_item(&accepted, &offer.rider_id),
                    broadcast_item(
                        &assigned,
                        &order_channel(&job.order_id),
                        assigned_job.snapshot(),
                    ),
                ];

                match self
                    .dispatch_store
                    .accept_offer(&offer, &job.order_id, items)
                    .await
                {
                    Ok(AcceptOutcome::Won) => {
                        info!(
                            job_id = %job.id,
                            order_id = %job.order_id,
                            rider_id = %offer.rider_id,
                            "Offer accepted, job assigned"
                        );
                        UseCaseResult::success(RespondOutcome::Accepted {
                            job_id: job.id,
                            order_id: job.order_id,
                        })
                    }
                    Ok(AcceptOutcome::OfferResolved) | Ok(AcceptOutcome::JobResolved) => {
                        UseCaseResult::success(RespondOutcome::Stale)
                    }
                    Err(e) => UseCaseResult::failure(e.into()),
                }
            }
            OfferDecision::Decline => {
                let declined =
                    OfferDeclined::new(&ctx, &offer.id, &job.id, &job.order_id, &offer.rider_id);
                let items = vec![broadcast_item(
                    &declined,
                    &order_channel(&job.order_id),
                    offer.snapshot(),
                )];

                match self.dispatch_store.decline_offer(&offer.id, items).await {
                    Ok(true) => {}
                    Ok(false) => return UseCaseResult::success(RespondOutcome::Stale),
                    Err(e) => return UseCaseResult::failure(e.into()),
                }

                info!(
                    job_id = %job.id,
                    offer_id = %offer.id,
                    rider_id = %offer.rider_id,
                    "Offer declined"
                );

                match advance::advance_job(
                    self.dispatch_store.as_ref(),
                    &self.selector,
                    self.exhaustion,
                    &ctx,
                    &job.id,
                )
                .await
                {
                    Ok(outcome) => UseCaseResult::success(RespondOutcome::Declined(outcome)),
                    Err(e) => UseCaseResult::failure(e),
                }
            }
        }
    }

    /// Record that the rider viewed the offer. Informational only: a lost
    /// race or an already-resolved offer is a quiet no-op.
    pub async fn mark_seen(
        &self,
        offer_id: &str,
        rider_id: &str,
    ) -> UseCaseResult<bool> {
        let offer = match self.dispatch_store.find_offer(offer_id).await {
            Ok(Some(offer)) => offer,
            Ok(None) => {
                return UseCaseResult::failure(UseCaseError::not_found(
                    "OFFER_NOT_FOUND",
                    format!("Offer '{}' not found", offer_id),
                ));
            }
            Err(e) => return UseCaseResult::failure(e.into()),
        };

        if offer.rider_id != rider_id {
            return UseCaseResult::failure(UseCaseError::validation(
                "RESPONDER_MISMATCH",
                "Offer belongs to another rider",
            ));
        }

        match self.dispatch_store.mark_offer_seen(offer_id).await {
            Ok(changed) => UseCaseResult::success(changed),
            Err(e) => UseCaseResult::failure(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_serialization() {
        let cmd = RespondCommand {
            offer_id: "offer-1".to_string(),
            rider_id: "rider-1".to_string(),
            decision: OfferDecision::Accept,
        };

        let json = serde_json::to_string(&cmd).unwrap();
        assert!(json.contains("offerId"));
        assert!(json.contains("ACCEPT"));
    }
}
