//! MarketFlow Fulfillment Sweepers
//!
//! Background re-evaluation of everything time-based:
//! - OfferExpiryPoller: expires open offers past their TTL and advances
//!   the affected jobs
//! - EscrowMaturityPoller: re-runs the release check for every unresolved
//!   hold past its expiry
//!
//! Both loops are built from idempotent engine operations, so overlapping
//! runs and redundant invocations are harmless - the at-least-once
//! contract of the trigger layer is absorbed by the store's guarded
//! writes, not by careful scheduling.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::RwLock;
use tokio::time::interval;
use tracing::{error, info, warn};

pub mod escrow_maturity;
pub mod offer_expiry;

pub use escrow_maturity::EscrowMaturityPoller;
pub use offer_expiry::OfferExpiryPoller;

use mf_fulfillment::usecase::UseCaseError;

#[derive(Error, Debug)]
pub enum SweeperError {
    #[error("Store error: {0}")]
    StoreError(#[from] mf_fulfillment::StoreError),
    #[error("Operation error: {0}")]
    OperationError(#[from] UseCaseError),
}

/// Sweeper cadence and batch configuration
#[derive(Debug, Clone)]
pub struct SweeperConfig {
    pub enabled: bool,
    /// Offer expiry sweep cadence
    pub offer_poll_interval: Duration,
    /// Escrow maturity sweep cadence
    pub escrow_poll_interval: Duration,
    /// Upper bound on entities handled per sweep
    pub batch_size: usize,
    /// Offer time-to-live
    pub offer_ttl: Duration,
}

impl Default for SweeperConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            offer_poll_interval: Duration::from_secs(5),
            escrow_poll_interval: Duration::from_secs(60),
            batch_size: 100,
            offer_ttl: Duration::from_secs(120),
        }
    }
}

/// Owns the two sweep loops and their lifecycle.
pub struct FulfillmentSweeper {
    config: SweeperConfig,
    offer_poller: Arc<OfferExpiryPoller>,
    escrow_poller: Arc<EscrowMaturityPoller>,
    running: Arc<RwLock<bool>>,
}

impl FulfillmentSweeper {
    pub fn new(
        config: SweeperConfig,
        offer_poller: OfferExpiryPoller,
        escrow_poller: EscrowMaturityPoller,
    ) -> Self {
        Self {
            config,
            offer_poller: Arc::new(offer_poller),
            escrow_poller: Arc::new(escrow_poller),
            running: Arc::new(RwLock::new(false)),
        }
    }

    pub async fn start(&self) {
        if !self.config.enabled {
            info!("Fulfillment sweeper is disabled");
            return;
        }

        let mut running = self.running.write().await;
        if *running {
            warn!("Sweeper already running");
            return;
        }
        *running = true;
        drop(running);

        info!(
            offer_poll_ms = self.config.offer_poll_interval.as_millis(),
            escrow_poll_ms = self.config.escrow_poll_interval.as_millis(),
            batch_size = self.config.batch_size,
            "Starting fulfillment sweeper"
        );

        let offer_poller = self.offer_poller.clone();
        let offer_interval = self.config.offer_poll_interval;
        let running_clone = self.running.clone();

        tokio::spawn(async move {
            let mut interval = interval(offer_interval);
            loop {
                interval.tick().await;
                if !*running_clone.read().await {
                    break;
                }
                if let Err(e) = offer_poller.poll().await {
                    error!(error = %e, "Error in offer expiry poller");
                }
            }
        });

        let escrow_poller = self.escrow_poller.clone();
        let escrow_interval = self.config.escrow_poll_interval;
        let running_clone2 = self.running.clone();

        tokio::spawn(async move {
            let mut interval = interval(escrow_interval);
            loop {
                interval.tick().await;
                if !*running_clone2.read().await {
                    break;
                }
                if let Err(e) = escrow_poller.poll().await {
                    error!(error = %e, "Error in escrow maturity poller");
                }
            }
        });
    }

    pub async fn stop(&self) {
        let mut running = self.running.write().await;
        *running = false;
        info!("Fulfillment sweeper stopped");
    }

    pub async fn is_running(&self) -> bool {
        *self.running.read().await
    }
}
