//! Rider Store

use async_trait::async_trait;

use super::entity::Rider;
use crate::shared::error::StoreResult;

#[async_trait]
pub trait RiderStore: Send + Sync {
    /// Riders serving the pool that are currently Online
    async fn find_available_in_pool(&self, pool_id: &str) -> StoreResult<Vec<Rider>>;

    async fn upsert_rider(&self, rider: &Rider) -> StoreResult<()>;
}
