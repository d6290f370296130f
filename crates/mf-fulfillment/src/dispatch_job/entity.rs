//! Dispatch Job and Offer Entities
//!
//! A DispatchJob tracks finding a rider for one order. Each broadcast to a
//! rider produces a DispatchOffer with its own accept/decline lifecycle.
//! A job is assigned when exactly one of its offers is accepted; the store
//! enforces that under contention, the entities express the legal
//! transitions.

use bson::serde_helpers::chrono_datetime_as_bson_datetime;
use chrono::{DateTime, Utc};
use mf_common::TsidGenerator;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Dispatch job status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    /// Created, no offers broadcast yet
    Pending,
    /// Offers are out, waiting for a winner
    Broadcasting,
    /// A rider accepted; terminal
    Assigned,
    /// Pool exhausted or timed out without acceptance; terminal
    Expired,
    /// Admin cancelled; terminal
    Cancelled,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Assigned | Self::Expired | Self::Cancelled)
    }

    /// Legal transitions of the job state machine.
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        use JobStatus::*;
        matches!(
            (self, next),
            (Pending, Broadcasting)
                | (Pending, Assigned)
                | (Broadcasting, Broadcasting)
                | (Broadcasting, Assigned)
                | (Broadcasting, Expired)
                | (Pending, Expired)
                | (Pending, Cancelled)
                | (Broadcasting, Cancelled)
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "PENDING",
            JobStatus::Broadcasting => "BROADCASTING",
            JobStatus::Assigned => "ASSIGNED",
            JobStatus::Expired => "EXPIRED",
            JobStatus::Cancelled => "CANCELLED",
        }
    }
}

/// How many riders receive the job at once
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BroadcastMode {
    /// One candidate at a time, in ranking order
    Sequential,
    /// Every candidate in the pool at once
    Parallel,
}

impl FromStr for BroadcastMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sequential" => Ok(Self::Sequential),
            "parallel" => Ok(Self::Parallel),
            other => Err(format!("Unknown broadcast mode '{}'", other)),
        }
    }
}

/// Dispatch offer status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OfferStatus {
    /// Pushed to the rider, no response yet
    Sent,
    /// Rider viewed the offer
    Seen,
    /// Rider took the job; terminal, at most one per job
    Accepted,
    /// Rider turned it down; terminal
    Declined,
    /// TTL elapsed or the job resolved elsewhere; terminal
    Expired,
}

impl OfferStatus {
    /// An open offer can still be accepted or declined
    pub fn is_open(&self) -> bool {
        matches!(self, Self::Sent | Self::Seen)
    }

    pub fn is_terminal(&self) -> bool {
        !self.is_open()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OfferStatus::Sent => "SENT",
            OfferStatus::Seen => "SEEN",
            OfferStatus::Accepted => "ACCEPTED",
            OfferStatus::Declined => "DECLINED",
            OfferStatus::Expired => "EXPIRED",
        }
    }
}

/// A rider's answer to an offer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OfferDecision {
    Accept,
    Decline,
}

/// Dispatch job entity
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DispatchJob {
    /// TSID as Crockford Base32 string
    #[serde(rename = "_id")]
    pub id: String,

    /// Order this job delivers
    pub order_id: String,

    /// Rider pool (zone/shop) to draw candidates from
    pub pool_id: String,

    pub status: JobStatus,

    pub mode: BroadcastMode,

    /// Winning rider; set exactly when status is Assigned
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assigned_rider_id: Option<String>,

    /// Completed rebroadcast rounds under the rebroadcast exhaustion policy
    #[serde(default)]
    pub rebroadcast_count: u32,

    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,

    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub updated_at: DateTime<Utc>,

    /// When the job reached a terminal status
    #[serde(
        skip_serializing_if = "Option::is_none",
        default,
        with = "bson::serde_helpers::chrono_datetime_as_bson_datetime_optional"
    )]
    pub resolved_at: Option<DateTime<Utc>>,
}

impl DispatchJob {
    /// Create a pending job for an order.
    pub fn new(order_id: impl Into<String>, pool_id: impl Into<String>, mode: BroadcastMode) -> Self {
        let now = Utc::now();
        Self {
            id: TsidGenerator::generate(),
            order_id: order_id.into(),
            pool_id: pool_id.into(),
            status: JobStatus::Pending,
            mode,
            assigned_rider_id: None,
            rebroadcast_count: 0,
            created_at: now,
            updated_at: now,
            resolved_at: None,
        }
    }

    /// The assigned-rider field must be populated exactly for assigned jobs.
    pub fn invariant_holds(&self) -> bool {
        (self.status == JobStatus::Assigned) == self.assigned_rider_id.is_some()
    }

    /// Flat key-value snapshot for realtime broadcast payloads.
    pub fn snapshot(&self) -> serde_json::Value {
        serde_json::json!({
            "entity": "dispatch_job",
            "id": self.id,
            "orderId": self.order_id,
            "poolId": self.pool_id,
            "status": self.status.as_str(),
            "assignedRiderId": self.assigned_rider_id,
            "rebroadcastCount": self.rebroadcast_count,
        })
    }
}

/// Dispatch offer entity
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DispatchOffer {
    #[serde(rename = "_id")]
    pub id: String,

    pub job_id: String,

    pub rider_id: String,

    pub status: OfferStatus,

    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub offered_at: DateTime<Utc>,

    /// When the rider answered; None while the offer is open or swept
    #[serde(
        skip_serializing_if = "Option::is_none",
        default,
        with = "bson::serde_helpers::chrono_datetime_as_bson_datetime_optional"
    )]
    pub responded_at: Option<DateTime<Utc>>,
}

impl DispatchOffer {
    /// Create a freshly sent offer for a (job, rider) pair.
    pub fn new(job_id: impl Into<String>, rider_id: impl Into<String>) -> Self {
        Self {
            id: TsidGenerator::generate(),
            job_id: job_id.into(),
            rider_id: rider_id.into(),
            status: OfferStatus::Sent,
            offered_at: Utc::now(),
            responded_at: None,
        }
    }

    /// Flat key-value snapshot for notification payloads.
    pub fn snapshot(&self) -> serde_json::Value {
        serde_json::json!({
            "entity": "dispatch_offer",
            "id": self.id,
            "jobId": self.job_id,
            "riderId": self.rider_id,
            "status": self.status.as_str(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_terminal_states() {
        assert!(!JobStatus::Pending.is_terminal());
        assert!(!JobStatus::Broadcasting.is_terminal());
        assert!(JobStatus::Assigned.is_terminal());
        assert!(JobStatus::Expired.is_terminal());
        assert!(JobStatus::Cancelled.is_terminal());
    }

    #[test]
    fn test_job_transition_table() {
        use JobStatus::*;
        assert!(Pending.can_transition_to(Broadcasting));
        assert!(Broadcasting.can_transition_to(Assigned));
        assert!(Broadcasting.can_transition_to(Expired));
        assert!(Broadcasting.can_transition_to(Cancelled));

        // No way out of a terminal status
        for terminal in [Assigned, Expired, Cancelled] {
            for next in [Pending, Broadcasting, Assigned, Expired, Cancelled] {
                assert!(!terminal.can_transition_to(next));
            }
        }
    }

    #[test]
    fn test_offer_open_vs_terminal() {
        assert!(OfferStatus::Sent.is_open());
        assert!(OfferStatus::Seen.is_open());
        assert!(OfferStatus::Accepted.is_terminal());
        assert!(OfferStatus::Declined.is_terminal());
        assert!(OfferStatus::Expired.is_terminal());
    }

    #[test]
    fn test_new_job_invariant() {
        let job = DispatchJob::new("order-1", "zone-a", BroadcastMode::Parallel);
        assert_eq!(job.status, JobStatus::Pending);
        assert!(job.invariant_holds());
    }

    #[test]
    fn test_mode_parsing() {
        assert_eq!("parallel".parse::<BroadcastMode>().unwrap(), BroadcastMode::Parallel);
        assert_eq!(
            "sequential".parse::<BroadcastMode>().unwrap(),
            BroadcastMode::Sequential
        );
        assert!("shotgun".parse::<BroadcastMode>().is_err());
    }

    #[test]
    fn test_unknown_offer_status_rejected() {
        let parsed: Result<OfferStatus, _> = serde_json::from_str("\"GHOSTED\"");
        assert!(parsed.is_err());
    }
}
