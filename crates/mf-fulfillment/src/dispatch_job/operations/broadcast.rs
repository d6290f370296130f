//! Broadcast Offers Use Case
//!
//! Fans a dispatch job out to its candidate pool: every ranked candidate
//! at once in parallel mode, the single best unoffered candidate in
//! sequential mode. Safe to re-invoke: a round that lost its race, or a
//! job with offers already out, is a quiet no-op.

use std::collections::HashSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;

use super::advance::{self, AdvanceOutcome, ExhaustionPolicy};
use crate::dispatch_job::entity::BroadcastMode;
use crate::dispatch_job::repository::DispatchStore;
use crate::rider::{PoolSelector, Rider};
use crate::usecase::{ExecutionContext, UseCaseError, UseCaseResult};

/// Command for broadcasting offers for a job.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BroadcastOffersCommand {
    /// Job to broadcast
    pub job_id: String,
    /// Overrides the job's broadcast mode for this and later rounds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<BroadcastMode>,
}

/// Outcome of a broadcast invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BroadcastOutcome {
    /// Offers were sent to fresh candidates
    Broadcast { offer_ids: Vec<String> },
    /// Offers are already out and still open; nothing new to send
    StillBroadcasting,
    /// The job is terminal (or resolved mid-flight); nothing written
    AlreadyResolved,
    /// No candidates at all; a rebroadcast round went out
    Rebroadcast { round: u32, offer_ids: Vec<String> },
    /// No candidates at all; the job expired
    PoolExhausted,
}

/// Use case for broadcasting a dispatch job to its candidate pool.
pub struct BroadcastOffersUseCase {
    dispatch_store: Arc<dyn DispatchStore>,
    selector: PoolSelector,
    exhaustion: ExhaustionPolicy,
}

impl BroadcastOffersUseCase {
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
        command: BroadcastOffersCommand,
        ctx: ExecutionContext,
    ) -> UseCaseResult<BroadcastOutcome> {
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
            return UseCaseResult::success(BroadcastOutcome::AlreadyResolved);
        }

        let mut job = job;
        if let Some(mode) = command.mode {
            job.mode = mode;
        }

        let existing = match self.dispatch_store.find_offers_for_job(&job.id).await {
            Ok(offers) => offers,
            Err(e) => return UseCaseResult::failure(e.into()),
        };

        // Sequential discipline: one open offer at a time, so a redundant
        // invocation while one is out must not fan out further
        if job.mode == BroadcastMode::Sequential && existing.iter().any(|o| o.status.is_open()) {
            return UseCaseResult::success(BroadcastOutcome::StillBroadcasting);
        }

        let offered: HashSet<&str> = existing.iter().map(|o| o.rider_id.as_str()).collect();

        let candidates: Vec<Rider> = match self.selector.select_candidates(&job.pool_id).await {
            Ok(riders) => riders
                .into_iter()
                .filter(|r| !offered.contains(r.id.as_str()))
                .collect(),
            Err(e) => return UseCaseResult::failure(e.into()),
        };

        if candidates.is_empty() {
            if existing.iter().any(|o| o.status.is_open()) {
                return UseCaseResult::success(BroadcastOutcome::StillBroadcasting);
            }
            // Nobody left to ask and nothing outstanding
            let outcome = match advance::apply_exhaustion(
                self.dispatch_store.as_ref(),
                &self.selector,
                self.exhaustion,
                &ctx,
                &job,
            )
            .await
            {
                Ok(outcome) => outcome,
                Err(e) => return UseCaseResult::failure(e),
            };
            return UseCaseResult::success(match outcome {
                AdvanceOutcome::JobExpired => BroadcastOutcome::PoolExhausted,
                AdvanceOutcome::Rebroadcast { round, offer_ids } => {
                    BroadcastOutcome::Rebroadcast { round, offer_ids }
                }
                _ => BroadcastOutcome::AlreadyResolved,
            });
        }

        let take = advance::round_size(job.mode, candidates.len());
        let (offers, items) = advance::build_offer_round(&ctx, &job, &candidates[..take]);
        let offer_ids: Vec<String> = offers.iter().map(|o| o.id.clone()).collect();

        match self
            .dispatch_store
            .record_broadcast(&job.id, &offers, command.mode, None, items)
            .await
        {
            Ok(true) => {
                info!(
                    job_id = %job.id,
                    order_id = %job.order_id,
                    mode = ?job.mode,
                    count = offer_ids.len(),
                    "Offers broadcast"
                );
                UseCaseResult::success(BroadcastOutcome::Broadcast { offer_ids })
            }
            Ok(false) => UseCaseResult::success(BroadcastOutcome::AlreadyResolved),
            Err(e) => UseCaseResult::failure(e.into()),
        }
    }
}
