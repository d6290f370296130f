//! MongoDB Outbox Repository
//!
//! Processor-facing view of the `outbox_items` collection. Items are
//! appended by the fulfillment store inside its transactions; this side
//! only claims, resolves and recovers them. Status is stored as the
//! integer code.

use std::time::Duration;

use async_trait::async_trait;
use bson::doc;
use chrono::Utc;
use futures::TryStreamExt;
use mongodb::options::FindOptions;
use mongodb::{Collection, Database};
use mf_common::{OutboxItem, OutboxRepository, OutboxStatus};
use tracing::debug;

/// MongoDB implementation of the outbox repository.
pub struct MongoOutboxRepository {
    collection: Collection<OutboxItem>,
}

impl MongoOutboxRepository {
    pub fn new(db: &Database) -> Self {
        Self {
            collection: db.collection("outbox_items"),
        }
    }
}

#[async_trait]
impl OutboxRepository for MongoOutboxRepository {
    async fn fetch_pending(&self, limit: u32) -> anyhow::Result<Vec<OutboxItem>> {
        let options = FindOptions::builder()
            .sort(doc! { "createdAt": 1 })
            .limit(limit as i64)
            .build();
        let cursor = self
            .collection
            .find(doc! { "status": OutboxStatus::Pending.code() })
            .with_options(options)
            .await?;
        let items: Vec<OutboxItem> = cursor.try_collect().await?;

        debug!(count = items.len(), "Fetched pending outbox items");
        Ok(items)
    }

    async fn mark_in_progress(&self, ids: Vec<String>) -> anyhow::Result<()> {
        if ids.is_empty() {
            return Ok(());
        }
        self.collection
            .update_many(
                doc! { "_id": { "$in": ids.clone() } },
                doc! {
                    "$set": {
                        "status": OutboxStatus::InProgress.code(),
                        "updatedAt": bson::DateTime::now(),
                    }
                },
            )
            .await?;
        Ok(())
    }

    async fn mark_with_status(
        &self,
        ids: Vec<String>,
        status: OutboxStatus,
        error_message: Option<String>,
    ) -> anyhow::Result<()> {
        if ids.is_empty() {
            return Ok(());
        }
        let mut set = doc! {
            "status": status.code(),
            "updatedAt": bson::DateTime::now(),
        };
        if let Some(error) = &error_message {
            set.insert("errorMessage", error);
        }
        self.collection
            .update_many(doc! { "_id": { "$in": ids.clone() } }, doc! { "$set": set })
            .await?;
        Ok(())
    }

    async fn increment_retry(&self, ids: Vec<String>) -> anyhow::Result<()> {
        if ids.is_empty() {
            return Ok(());
        }
        self.collection
            .update_many(
                doc! { "_id": { "$in": ids.clone() } },
                doc! {
                    "$inc": { "retryCount": 1 },
                    "$set": {
                        "status": OutboxStatus::Pending.code(),
                        "updatedAt": bson::DateTime::now(),
                    }
                },
            )
            .await?;
        Ok(())
    }

    async fn fetch_stuck(&self, timeout: Duration, limit: u32) -> anyhow::Result<Vec<OutboxItem>> {
        let cutoff = Utc::now() - chrono::Duration::from_std(timeout)?;
        let options = FindOptions::builder()
            .sort(doc! { "createdAt": 1 })
            .limit(limit as i64)
            .build();
        let cursor = self
            .collection
            .find(doc! {
                "status": OutboxStatus::InProgress.code(),
                "updatedAt": { "$lt": bson::DateTime::from_chrono(cutoff) },
            })
            .with_options(options)
            .await?;
        Ok(cursor.try_collect().await?)
    }

    async fn reset_stuck(&self, ids: Vec<String>) -> anyhow::Result<()> {
        if ids.is_empty() {
            return Ok(());
        }
        self.collection
            .update_many(
                doc! { "_id": { "$in": ids.clone() } },
                doc! {
                    "$set": {
                        "status": OutboxStatus::Pending.code(),
                        "updatedAt": bson::DateTime::now(),
                    }
                },
            )
            .await?;
        Ok(())
    }
}
