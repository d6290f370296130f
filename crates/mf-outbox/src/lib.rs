//! MarketFlow Outbox Processor
//!
//! Delivers pending side effects to the outside world. State transitions
//! append items to the outbox inside their own store transaction; this
//! crate polls for pending items and hands them to the notifier
//! (Notification items) or the realtime broadcaster (Broadcast items).
//! Transient failures retry up to a bound; items stuck in progress after
//! a crash are recovered back to pending.

use std::sync::Arc;
use std::time::Duration;

use mf_common::{OutboxItemType, OutboxRepository, OutboxStatus};
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

pub mod delivery;
pub mod mongo;

pub use delivery::{
    Broadcaster, ChannelBroadcaster, DeliveryResult, LogNotifier, Notifier, RedisBroadcaster,
    WebhookNotifier, WebhookNotifierConfig,
};
pub use mongo::MongoOutboxRepository;

/// Outbox processor configuration
#[derive(Debug, Clone)]
pub struct OutboxProcessorConfig {
    pub poll_interval: Duration,
    pub batch_size: u32,
    /// Delivery attempts before an item is parked as failed
    pub max_retries: i32,
    /// Items stuck InProgress longer than this are reset to Pending
    pub stuck_timeout: Duration,
}

impl Default for OutboxProcessorConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(500),
            batch_size: 50,
            max_retries: 5,
            stuck_timeout: Duration::from_secs(300),
        }
    }
}

/// Counters from one processing pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProcessStats {
    pub delivered: usize,
    pub retried: usize,
    pub failed: usize,
}

pub struct OutboxProcessor {
    repository: Arc<dyn OutboxRepository>,
    notifier: Arc<dyn Notifier>,
    broadcaster: Arc<dyn Broadcaster>,
    config: OutboxProcessorConfig,
}

impl OutboxProcessor {
    pub fn new(
        repository: Arc<dyn OutboxRepository>,
        notifier: Arc<dyn Notifier>,
        broadcaster: Arc<dyn Broadcaster>,
        config: OutboxProcessorConfig,
    ) -> Self {
        Self {
            repository,
            notifier,
            broadcaster,
            config,
        }
    }

    /// Run the poll loop until the process exits.
    pub async fn start(&self) {
        info!(
            poll_interval_ms = %self.config.poll_interval.as_millis(),
            batch_size = %self.config.batch_size,
            max_retries = self.config.max_retries,
            "Starting outbox processor"
        );

        // One recovery pass per this many polls
        const RECOVERY_EVERY: u32 = 60;
        let mut polls: u32 = 0;

        loop {
            if let Err(e) = self.process_batch().await {
                error!(error = %e, "Error processing outbox batch");
            }

            polls = polls.wrapping_add(1);
            if polls % RECOVERY_EVERY == 0 {
                if let Err(e) = self.recover_stuck().await {
                    error!(error = %e, "Error recovering stuck outbox items");
                }
            }

            sleep(self.config.poll_interval).await;
        }
    }

    /// One poll: claim a batch of pending items and deliver them.
    pub async fn process_batch(&self) -> anyhow::Result<ProcessStats> {
        let items = self.repository.fetch_pending(self.config.batch_size).await?;
        if items.is_empty() {
            return Ok(ProcessStats::default());
        }

        let ids: Vec<String> = items.iter().map(|i| i.id.clone()).collect();
        self.repository.mark_in_progress(ids).await?;

        let mut stats = ProcessStats::default();
        for item in items {
            debug!(id = %item.id, item_type = %item.item_type, "Delivering outbox item");

            let result = match item.item_type {
                OutboxItemType::Notification => {
                    self.notifier.notify(&item.target, &item.payload).await
                }
                OutboxItemType::Broadcast => {
                    self.broadcaster.publish(&item.target, &item.payload).await
                }
            };

            match result {
                DeliveryResult::Delivered => {
                    self.repository
                        .mark_with_status(vec![item.id.clone()], OutboxStatus::Success, None)
                        .await?;
                    stats.delivered += 1;
                    metrics::counter!("outbox.items.delivered_total").increment(1);
                }
                DeliveryResult::Failed { status, error } => {
                    if status.is_retryable() && item.retry_count < self.config.max_retries {
                        warn!(id = %item.id, error = %error, "Delivery failed, will retry");
                        self.repository.increment_retry(vec![item.id.clone()]).await?;
                        stats.retried += 1;
                        metrics::counter!("outbox.items.retried_total").increment(1);
                    } else {
                        let (status, error) = if status.is_retryable() {
                            (OutboxStatus::InternalError, "Max retries exceeded".to_string())
                        } else {
                            (status, error)
                        };
                        error!(id = %item.id, error = %error, "Delivery failed permanently");
                        self.repository
                            .mark_with_status(vec![item.id.clone()], status, Some(error))
                            .await?;
                        stats.failed += 1;
                        metrics::counter!("outbox.items.failed_total").increment(1);
                    }
                }
            }
        }

        Ok(stats)
    }

    /// Reset items stuck InProgress past the timeout back to Pending.
    pub async fn recover_stuck(&self) -> anyhow::Result<u64> {
        let stuck = self
            .repository
            .fetch_stuck(self.config.stuck_timeout, 1000)
            .await?;
        if stuck.is_empty() {
            return Ok(0);
        }

        let ids: Vec<String> = stuck.iter().map(|i| i.id.clone()).collect();
        let count = ids.len() as u64;
        self.repository.reset_stuck(ids).await?;

        info!(count = count, "Recovered stuck outbox items");
        metrics::counter!("outbox.items.recovered_total").increment(count);
        Ok(count)
    }
}
