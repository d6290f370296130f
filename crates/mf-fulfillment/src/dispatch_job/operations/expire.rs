//! Expire Stale Offers Use Case
//!
//! Sweeper entry point: expires open offers older than the TTL and runs
//! the advancement step for every job that lost offers. Built entirely
//! from guarded writes, so it is safe to run concurrently with responders
//! and with overlapping sweeps - an offer accepted mid-sweep is never
//! overwritten.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{debug, info};

use super::advance::{self, AdvanceOutcome, ExhaustionPolicy};
use super::events::{order_channel, OfferExpired};
use crate::dispatch_job::repository::DispatchStore;
use crate::rider::PoolSelector;
use crate::usecase::domain_event::broadcast_item;
use crate::usecase::{ExecutionContext, UseCaseResult};

/// Command for one expiry sweep.
#[derive(Debug, Clone)]
pub struct ExpireStaleOffersCommand {
    /// Offers older than this are expired
    pub ttl: Duration,
    /// Upper bound on offers handled per sweep
    pub batch_size: usize,
}

/// Counters from one expiry sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepSummary {
    /// Stale offers the sweep saw
    pub scanned: usize,
    /// Offers actually expired (the rest resolved concurrently)
    pub expired_offers: usize,
    /// Jobs that advanced to fresh candidates
    pub jobs_advanced: usize,
    /// Jobs that got a rebroadcast round
    pub rebroadcasts: usize,
    /// Jobs that expired with their pool exhausted
    pub jobs_expired: usize,
}

/// Use case for the periodic offer-TTL sweep.
pub struct ExpireStaleOffersUseCase {
    dispatch_store: Arc<dyn DispatchStore>,
    selector: PoolSelector,
    exhaustion: ExhaustionPolicy,
}

impl ExpireStaleOffersUseCase {
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
        command: ExpireStaleOffersCommand,
        ctx: ExecutionContext,
    ) -> UseCaseResult<SweepSummary> {
        let cutoff = Utc::now()
            - chrono::Duration::from_std(command.ttl).unwrap_or_else(|_| chrono::Duration::seconds(120));

        let stale = match self
            .dispatch_store
            .find_offers_past_ttl(cutoff, command.batch_size)
            .await
        {
            Ok(offers) => offers,
            Err(e) => return UseCaseResult::failure(e.into()),
        };

        let mut summary = SweepSummary {
            scanned: stale.len(),
            ..SweepSummary::default()
        };
        if stale.is_empty() {
            return UseCaseResult::success(summary);
        }

        // order_id per job, resolved once per sweep
        let mut order_ids: HashMap<String, String> = HashMap::new();
        let mut affected_jobs: HashSet<String> = HashSet::new();

        for offer in &stale {
            let order_id = match order_ids.get(&offer.job_id) {
                Some(id) => id.clone(),
                None => match self.dispatch_store.find_job(&offer.job_id).await {
                    Ok(Some(job)) => {
                        order_ids.insert(offer.job_id.clone(), job.order_id.clone());
                        job.order_id
                    }
                    Ok(None) => continue,
                    Err(e) => return UseCaseResult::failure(e.into()),
                },
            };

            let event =
                OfferExpired::new(&ctx, &offer.id, &offer.job_id, &order_id, &offer.rider_id);
            let items = vec![broadcast_item(
                &event,
                &order_channel(&order_id),
                offer.snapshot(),
            )];

            match self.dispatch_store.expire_offer(&offer.id, items).await {
                Ok(true) => {
                    summary.expired_offers += 1;
                    affected_jobs.insert(offer.job_id.clone());
                }
                // Accepted or declined while we swept; leave it alone
                Ok(false) => debug!(offer_id = %offer.id, "Offer resolved mid-sweep, skipped"),
                Err(e) => return UseCaseResult::failure(e.into()),
            }
        }

        for job_id in &affected_jobs {
            match advance::advance_job(
                self.dispatch_store.as_ref(),
                &self.selector,
                self.exhaustion,
                &ctx,
                job_id,
            )
            .await
            {
                Ok(AdvanceOutcome::Advanced { .. }) => summary.jobs_advanced += 1,
                Ok(AdvanceOutcome::Rebroadcast { .. }) => summary.rebroadcasts += 1,
                Ok(AdvanceOutcome::JobExpired) => summary.jobs_expired += 1,
                Ok(_) => {}
                Err(e) => return UseCaseResult::failure(e),
            }
        }

        if summary.expired_offers > 0 {
            info!(
                expired = summary.expired_offers,
                advanced = summary.jobs_advanced,
                rebroadcasts = summary.rebroadcasts,
                jobs_expired = summary.jobs_expired,
                "Stale offer sweep complete"
            );
        }

        UseCaseResult::success(summary)
    }
}
