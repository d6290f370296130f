//! Job Advancement
//!
//! Shared logic run after a decline or an offer expiry: decide whether the
//! job keeps waiting, moves to the next candidate (sequential mode), gets
//! a fresh broadcast round, or expires. Also applies the configured
//! exhaustion policy when the candidate pool runs dry.

use std::collections::HashSet;

use mf_common::OutboxItem;
use tracing::debug;

use super::events::{order_channel, JobBroadcasting, JobExpired, OfferSent};
use crate::dispatch_job::entity::{BroadcastMode, DispatchJob, DispatchOffer};
use crate::dispatch_job::repository::DispatchStore;
use crate::rider::{PoolSelector, Rider};
use crate::usecase::domain_event::{broadcast_item, notification_item};
use crate::usecase::{ExecutionContext, UseCaseError};

/// What to do when a job runs out of candidates without an acceptance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExhaustionPolicy {
    /// Terminal: the job expires and an operator re-triggers manually
    Expire,
    /// Re-offer the full pool, up to `limit` extra rounds, then expire
    Rebroadcast { limit: u32 },
}

impl ExhaustionPolicy {
    /// Parse from configuration strings, rejecting unknown values.
    pub fn from_config(policy: &str, limit: u32) -> Result<Self, String> {
        match policy {
            "expire" => Ok(Self::Expire),
            "rebroadcast" => Ok(Self::Rebroadcast { limit }),
            other => Err(format!("Unknown exhaustion policy '{}'", other)),
        }
    }
}

/// Result of an advancement step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdvanceOutcome {
    /// Job already resolved (or resolved concurrently); nothing written
    NoAction,
    /// Open offers remain; the job keeps broadcasting
    StillBroadcasting,
    /// Fresh candidates were offered (one in sequential mode, all in parallel)
    Advanced { offer_ids: Vec<String> },
    /// Pool exhausted; a rebroadcast round went out
    Rebroadcast { round: u32, offer_ids: Vec<String> },
    /// Pool exhausted; the job expired
    JobExpired,
}

/// Build the offers and outbox items for one broadcast round.
pub(crate) fn build_offer_round(
    ctx: &ExecutionContext,
    job: &DispatchJob,
    riders: &[Rider],
) -> (Vec<DispatchOffer>, Vec<OutboxItem>) {
    let mut offers = Vec::with_capacity(riders.len());
    let mut items = Vec::with_capacity(riders.len() + 1);

    for rider in riders {
        let offer = DispatchOffer::new(&job.id, &rider.id);
        let event = OfferSent::new(ctx, &offer.id, &job.id, &job.order_id, &rider.id);
        items.push(notification_item(&event, &rider.id));
        offers.push(offer);
    }

    let round_event = JobBroadcasting::new(ctx, &job.id, &job.order_id, offers.len());
    let mut snapshot = job.snapshot();
    snapshot["status"] = serde_json::Value::String("BROADCASTING".to_string());
    items.push(broadcast_item(
        &round_event,
        &order_channel(&job.order_id),
        snapshot,
    ));

    (offers, items)
}

/// How many of the ranked candidates one round offers.
pub(crate) fn round_size(mode: BroadcastMode, candidates: usize) -> usize {
    match mode {
        BroadcastMode::Sequential => candidates.min(1),
        BroadcastMode::Parallel => candidates,
    }
}

/// Advance a job after one of its offers resolved without an acceptance.
pub(crate) async fn advance_job(
    store: &dyn DispatchStore,
    selector: &PoolSelector,
    policy: ExhaustionPolicy,
    ctx: &ExecutionContext,
    job_id: &str,
) -> Result<AdvanceOutcome, UseCaseError> {
    let Some(job) = store.find_job(job_id).await? else {
        return Ok(AdvanceOutcome::NoAction);
    };
    if job.status.is_terminal() {
        return Ok(AdvanceOutcome::NoAction);
    }

    let offers = store.find_offers_for_job(job_id).await?;
    if offers.iter().any(|o| o.status.is_open()) {
        return Ok(AdvanceOutcome::StillBroadcasting);
    }

    let offered: HashSet<&str> = offers.iter().map(|o| o.rider_id.as_str()).collect();
    let candidates: Vec<Rider> = selector
        .select_candidates(&job.pool_id)
        .await?
        .into_iter()
        .filter(|r| !offered.contains(r.id.as_str()))
        .collect();

    if !candidates.is_empty() {
        let take = round_size(job.mode, candidates.len());
        let (new_offers, items) = build_offer_round(ctx, &job, &candidates[..take]);
        let offer_ids = new_offers.iter().map(|o| o.id.clone()).collect();
        if store
            .record_broadcast(job_id, &new_offers, None, None, items)
            .await?
        {
            debug!(job_id = %job_id, count = take, "Advanced job to next candidates");
            return Ok(AdvanceOutcome::Advanced { offer_ids });
        }
        return Ok(AdvanceOutcome::NoAction);
    }

    apply_exhaustion(store, selector, policy, ctx, &job).await
}

/// Apply the exhaustion policy to a job with no open offers and no fresh
/// candidates.
pub(crate) async fn apply_exhaustion(
    store: &dyn DispatchStore,
    selector: &PoolSelector,
    policy: ExhaustionPolicy,
    ctx: &ExecutionContext,
    job: &DispatchJob,
) -> Result<AdvanceOutcome, UseCaseError> {
    if let ExhaustionPolicy::Rebroadcast { limit } = policy {
        if job.rebroadcast_count < limit {
            // Re-offer everyone currently available, previous answers included
            let pool = selector.select_candidates(&job.pool_id).await?;
            if !pool.is_empty() {
                let take = round_size(job.mode, pool.len());
                let (new_offers, items) = build_offer_round(ctx, job, &pool[..take]);
                let offer_ids = new_offers.iter().map(|o| o.id.clone()).collect();
                let round = job.rebroadcast_count + 1;
                if store
                    .record_broadcast(&job.id, &new_offers, None, Some(round), items)
                    .await?
                {
                    debug!(job_id = %job.id, round = round, "Rebroadcast round sent");
                    return Ok(AdvanceOutcome::Rebroadcast { round, offer_ids });
                }
                return Ok(AdvanceOutcome::NoAction);
            }
        }
    }

    let event = JobExpired::new(ctx, &job.id, &job.order_id);
    let mut snapshot = job.snapshot();
    snapshot["status"] = serde_json::Value::String("EXPIRED".to_string());
    let items = vec![broadcast_item(
        &event,
        &order_channel(&job.order_id),
        snapshot,
    )];

    if store.expire_job(&job.id, items).await? {
        debug!(job_id = %job.id, "Job expired with pool exhausted");
        Ok(AdvanceOutcome::JobExpired)
    } else {
        Ok(AdvanceOutcome::NoAction)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exhaustion_policy_parsing() {
        assert_eq!(
            ExhaustionPolicy::from_config("expire", 0).unwrap(),
            ExhaustionPolicy::Expire
        );
        assert_eq!(
            ExhaustionPolicy::from_config("rebroadcast", 3).unwrap(),
            ExhaustionPolicy::Rebroadcast { limit: 3 }
        );
        assert!(ExhaustionPolicy::from_config("give_up", 0).is_err());
    }

    #[test]
    fn test_round_size() {
        assert_eq!(round_size(BroadcastMode::Sequential, 5), 1);
        assert_eq!(round_size(BroadcastMode::Sequential, 0), 0);
        assert_eq!(round_size(BroadcastMode::Parallel, 5), 5);
    }
}
