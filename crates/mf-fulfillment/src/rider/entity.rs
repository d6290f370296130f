//! Rider Entity

use bson::serde_helpers::chrono_datetime_as_bson_datetime;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Rider availability status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RiderAvailability {
    /// Free and accepting offers
    Online,
    /// Working another delivery
    Busy,
    Offline,
}

/// Trust tier, earned by delivery history
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RiderTier {
    Standard,
    Elite,
}

/// Rider availability snapshot consumed by the pool selector
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Rider {
    #[serde(rename = "_id")]
    pub id: String,
    /// Pools (zones/shops) this rider serves
    pub pool_ids: Vec<String>,
    pub availability: RiderAvailability,
    pub tier: RiderTier,
    /// Distance from the pool's zone centre, maintained by the location feed
    pub zone_distance_km: f64,
    /// Last availability heartbeat
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub last_seen_at: DateTime<Utc>,
}

impl Rider {
    pub fn is_available(&self) -> bool {
        self.availability == RiderAvailability::Online
    }

    pub fn serves_pool(&self, pool_id: &str) -> bool {
        self.pool_ids.iter().any(|p| p == pool_id)
    }
}
