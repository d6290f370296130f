//! Candidate Pool Selector
//!
//! Resolves the ordered candidate list for a dispatch job: available riders
//! in the job's pool, ranked by a policy-configurable list of criteria.
//! Ranking is a pure function over the fetched snapshot; no optimization
//! or live-location routing happens here.

use std::cmp::Ordering;
use std::str::FromStr;
use std::sync::Arc;

use super::entity::Rider;
use super::repository::RiderStore;
use crate::shared::error::StoreResult;

/// A single ranking criterion. Criteria are applied in order; later
/// criteria break ties left by earlier ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RankCriterion {
    /// Most recent availability heartbeat first
    AvailabilityRecency,
    /// Elite tier before standard
    Tier,
    /// Closest to the zone centre first
    ZoneProximity,
}

impl FromStr for RankCriterion {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "availability_recency" => Ok(Self::AvailabilityRecency),
            "tier" => Ok(Self::Tier),
            "zone_proximity" => Ok(Self::ZoneProximity),
            other => Err(format!("Unknown ranking criterion '{}'", other)),
        }
    }
}

impl RankCriterion {
    fn compare(&self, a: &Rider, b: &Rider) -> Ordering {
        match self {
            // Later heartbeat ranks first
            Self::AvailabilityRecency => b.last_seen_at.cmp(&a.last_seen_at),
            // Higher tier ranks first
            Self::Tier => b.tier.cmp(&a.tier),
            // Smaller distance ranks first
            Self::ZoneProximity => a
                .zone_distance_km
                .partial_cmp(&b.zone_distance_km)
                .unwrap_or(Ordering::Equal),
        }
    }
}

/// Ordered list of ranking criteria.
#[derive(Debug, Clone)]
pub struct RankingPolicy {
    pub criteria: Vec<RankCriterion>,
}

impl RankingPolicy {
    pub fn new(criteria: Vec<RankCriterion>) -> Self {
        Self { criteria }
    }

    /// Parse a policy from configuration strings, rejecting unknown values.
    pub fn from_config(names: &[String]) -> Result<Self, String> {
        let criteria = names
            .iter()
            .map(|n| n.parse())
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { criteria })
    }

    fn compare(&self, a: &Rider, b: &Rider) -> Ordering {
        for criterion in &self.criteria {
            let ord = criterion.compare(a, b);
            if ord != Ordering::Equal {
                return ord;
            }
        }
        // Stable fallback so the order is deterministic
        a.id.cmp(&b.id)
    }
}

impl Default for RankingPolicy {
    fn default() -> Self {
        Self {
            criteria: vec![
                RankCriterion::AvailabilityRecency,
                RankCriterion::Tier,
                RankCriterion::ZoneProximity,
            ],
        }
    }
}

/// Resolves the ordered candidate list for a pool.
#[derive(Clone)]
pub struct PoolSelector {
    rider_store: Arc<dyn RiderStore>,
    policy: RankingPolicy,
}

impl PoolSelector {
    pub fn new(rider_store: Arc<dyn RiderStore>, policy: RankingPolicy) -> Self {
        Self { rider_store, policy }
    }

    /// Available riders in the pool, best candidate first.
    pub async fn select_candidates(&self, pool_id: &str) -> StoreResult<Vec<Rider>> {
        let mut riders = self.rider_store.find_available_in_pool(pool_id).await?;
        riders.sort_by(|a, b| self.policy.compare(a, b));
        Ok(riders)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rider::entity::{RiderAvailability, RiderTier};
    use chrono::{Duration, Utc};

    fn rider(id: &str, tier: RiderTier, distance: f64, seen_secs_ago: i64) -> Rider {
        Rider {
            id: id.to_string(),
            pool_ids: vec!["zone-a".to_string()],
            availability: RiderAvailability::Online,
            tier,
            zone_distance_km: distance,
            last_seen_at: Utc::now() - Duration::seconds(seen_secs_ago),
        }
    }

    #[test]
    fn test_recency_ranks_first_by_default() {
        let policy = RankingPolicy::default();
        let mut riders = vec![
            rider("stale", RiderTier::Elite, 0.5, 600),
            rider("fresh", RiderTier::Standard, 5.0, 5),
        ];
        riders.sort_by(|a, b| policy.compare(a, b));
        assert_eq!(riders[0].id, "fresh");
    }

    #[test]
    fn test_tier_breaks_recency_ties() {
        let now = Utc::now();
        let mut a = rider("standard", RiderTier::Standard, 1.0, 0);
        let mut b = rider("elite", RiderTier::Elite, 1.0, 0);
        a.last_seen_at = now;
        b.last_seen_at = now;

        let policy = RankingPolicy::default();
        let mut riders = vec![a, b];
        riders.sort_by(|x, y| policy.compare(x, y));
        assert_eq!(riders[0].id, "elite");
    }

    #[test]
    fn test_proximity_policy() {
        let policy = RankingPolicy::new(vec![RankCriterion::ZoneProximity]);
        let mut riders = vec![
            rider("far", RiderTier::Elite, 9.0, 0),
            rider("near", RiderTier::Standard, 0.3, 0),
        ];
        riders.sort_by(|a, b| policy.compare(a, b));
        assert_eq!(riders[0].id, "near");
    }

    #[test]
    fn test_policy_from_config_rejects_unknown() {
        assert!(RankingPolicy::from_config(&["tier".to_string()]).is_ok());
        assert!(RankingPolicy::from_config(&["karma".to_string()]).is_err());
    }
}
