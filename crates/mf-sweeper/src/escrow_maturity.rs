//! Escrow maturity poller - re-evaluates release for matured holds
//!
//! One release invocation per unresolved hold past its expiry, every
//! tick. Ineligible holds no-op and are simply retried next tick; release
//! is idempotent, so at-least-once invocation needs no bookkeeping here.

use std::sync::Arc;

use chrono::Utc;
use mf_fulfillment::escrow_hold::{ReleaseHoldCommand, ReleaseHoldUseCase, ReleaseOutcome};
use mf_fulfillment::usecase::ExecutionContext;
use mf_fulfillment::EscrowStore;
use tracing::{debug, info, trace};

use crate::SweeperError;

/// Counters from one maturity sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MaturitySummary {
    /// Matured holds the sweep saw
    pub scanned: usize,
    /// Holds released this tick
    pub released: usize,
    /// Holds whose conditions are still unmet
    pub not_eligible: usize,
}

pub struct EscrowMaturityPoller {
    escrow_store: Arc<dyn EscrowStore>,
    release_hold: ReleaseHoldUseCase,
    batch_size: usize,
}

impl EscrowMaturityPoller {
    pub fn new(
        escrow_store: Arc<dyn EscrowStore>,
        release_hold: ReleaseHoldUseCase,
        batch_size: usize,
    ) -> Self {
        Self {
            escrow_store,
            release_hold,
            batch_size,
        }
    }

    pub async fn poll(&self) -> Result<MaturitySummary, SweeperError> {
        let matured = self
            .escrow_store
            .find_matured_holds(Utc::now(), self.batch_size)
            .await?;

        let mut summary = MaturitySummary {
            scanned: matured.len(),
            ..MaturitySummary::default()
        };

        if matured.is_empty() {
            trace!("No matured holds found");
            return Ok(summary);
        }

        metrics::gauge!("sweeper.holds.matured").set(matured.len() as f64);

        for hold in matured {
            let command = ReleaseHoldCommand {
                hold_id: hold.id.clone(),
                override_checks: false,
            };

            let outcome = self
                .release_hold
                .execute(command, ExecutionContext::system())
                .await
                .into_result()?;

            match outcome {
                ReleaseOutcome::Released { amount_minor } => {
                    summary.released += 1;
                    metrics::counter!("sweeper.holds.released_total").increment(1);
                    debug!(hold_id = %hold.id, amount_minor, "Matured hold released");
                }
                ReleaseOutcome::NotEligible { unmet } => {
                    summary.not_eligible += 1;
                    trace!(hold_id = %hold.id, ?unmet, "Hold matured but not eligible yet");
                }
                ReleaseOutcome::AlreadyResolved => {}
            }
        }

        if summary.released > 0 {
            info!(
                released = summary.released,
                not_eligible = summary.not_eligible,
                "Escrow maturity sweep done"
            );
        }

        Ok(summary)
    }
}
