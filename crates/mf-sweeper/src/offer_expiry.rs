//! Offer expiry poller - sweeps open offers past their TTL

use std::time::Duration;

use mf_fulfillment::dispatch_job::{ExpireStaleOffersCommand, ExpireStaleOffersUseCase, SweepSummary};
use mf_fulfillment::usecase::ExecutionContext;
use tracing::{debug, trace};

use crate::SweeperError;

pub struct OfferExpiryPoller {
    expire_offers: ExpireStaleOffersUseCase,
    ttl: Duration,
    batch_size: usize,
}

impl OfferExpiryPoller {
    pub fn new(expire_offers: ExpireStaleOffersUseCase, ttl: Duration, batch_size: usize) -> Self {
        Self {
            expire_offers,
            ttl,
            batch_size,
        }
    }

    /// One sweep. Every mutation inside is a guarded write, so overlapping
    /// polls and concurrent responders stay safe.
    pub async fn poll(&self) -> Result<SweepSummary, SweeperError> {
        let command = ExpireStaleOffersCommand {
            ttl: self.ttl,
            batch_size: self.batch_size,
        };

        let summary = self
            .expire_offers
            .execute(command, ExecutionContext::system())
            .await
            .into_result()?;

        if summary.scanned == 0 {
            trace!("No stale offers found");
        } else {
            debug!(
                scanned = summary.scanned,
                expired = summary.expired_offers,
                "Offer expiry sweep done"
            );
        }

        metrics::counter!("sweeper.offers.expired_total")
            .increment(summary.expired_offers as u64);
        metrics::counter!("sweeper.jobs.advanced_total").increment(summary.jobs_advanced as u64);
        metrics::counter!("sweeper.jobs.rebroadcast_total").increment(summary.rebroadcasts as u64);
        metrics::counter!("sweeper.jobs.expired_total").increment(summary.jobs_expired as u64);

        Ok(summary)
    }
}
