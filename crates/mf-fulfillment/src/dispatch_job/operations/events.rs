//! Dispatch Domain Events

use serde::{Deserialize, Serialize};

use crate::impl_domain_event;
use crate::usecase::domain_event::EventMetadata;
use crate::usecase::ExecutionContext;

const SOURCE: &str = "marketflow:fulfillment";

fn job_subject(job_id: &str) -> String {
    format!("fulfillment.job.{}", job_id)
}

fn offer_subject(offer_id: &str) -> String {
    format!("fulfillment.offer.{}", offer_id)
}

fn order_group(order_id: &str) -> String {
    format!("fulfillment:order:{}", order_id)
}

pub use crate::usecase::domain_event::order_channel;

/// Event emitted when a broadcast round sends offers out.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobBroadcasting {
    #[serde(flatten)]
    pub metadata: EventMetadata,

    pub job_id: String,
    pub order_id: String,
    pub offer_count: usize,
}

impl_domain_event!(JobBroadcasting);

impl JobBroadcasting {
    const EVENT_TYPE: &'static str = "marketflow:fulfillment:job:broadcasting";

    pub fn new(ctx: &ExecutionContext, job_id: &str, order_id: &str, offer_count: usize) -> Self {
        Self {
            metadata: EventMetadata::from_context(
                ctx,
                Self::EVENT_TYPE,
                SOURCE,
                job_subject(job_id),
                order_group(order_id),
            ),
            job_id: job_id.to_string(),
            order_id: order_id.to_string(),
            offer_count,
        }
    }
}

/// Event emitted per rider when an offer is sent.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OfferSent {
    #[serde(flatten)]
    pub metadata: EventMetadata,

    pub offer_id: String,
    pub job_id: String,
    pub order_id: String,
    pub rider_id: String,
}

impl_domain_event!(OfferSent);

impl OfferSent {
    const EVENT_TYPE: &'static str = "marketflow:fulfillment:offer:sent";

    pub fn new(
        ctx: &ExecutionContext,
        offer_id: &str,
        job_id: &str,
        order_id: &str,
        rider_id: &str,
    ) -> Self {
        Self {
            metadata: EventMetadata::from_context(
                ctx,
                Self::EVENT_TYPE,
                SOURCE,
                offer_subject(offer_id),
                order_group(order_id),
            ),
            offer_id: offer_id.to_string(),
            job_id: job_id.to_string(),
            order_id: order_id.to_string(),
            rider_id: rider_id.to_string(),
        }
    }
}

/// Event emitted when a rider accepts an offer and wins the job.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OfferAccepted {
    #[serde(flatten)]
    pub metadata: EventMetadata,

    pub offer_id: String,
    pub job_id: String,
    pub order_id: String,
    pub rider_id: String,
}

impl_domain_event!(OfferAccepted);

impl OfferAccepted {
    const EVENT_TYPE: &'static str = "marketflow:fulfillment:offer:accepted";

    pub fn new(
        ctx: &ExecutionContext,
        offer_id: &str,
        job_id: &str,
        order_id: &str,
        rider_id: &str,
    ) -> Self {
        Self {
            metadata: EventMetadata::from_context(
                ctx,
                Self::EVENT_TYPE,
                SOURCE,
                offer_subject(offer_id),
                order_group(order_id),
            ),
            offer_id: offer_id.to_string(),
            job_id: job_id.to_string(),
            order_id: order_id.to_string(),
            rider_id: rider_id.to_string(),
        }
    }
}

/// Event emitted when a rider declines an offer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OfferDeclined {
    #[serde(flatten)]
    pub metadata: EventMetadata,

    pub offer_id: String,
    pub job_id: String,
    pub order_id: String,
    pub rider_id: String,
}

impl_domain_event!(OfferDeclined);

impl OfferDeclined {
    const EVENT_TYPE: &'static str = "marketflow:fulfillment:offer:declined";

    pub fn new(
        ctx: &ExecutionContext,
        offer_id: &str,
        job_id: &str,
        order_id: &str,
        rider_id: &str,
    ) -> Self {
        Self {
            metadata: EventMetadata::from_context(
                ctx,
                Self::EVENT_TYPE,
                SOURCE,
                offer_subject(offer_id),
                order_group(order_id),
            ),
            offer_id: offer_id.to_string(),
            job_id: job_id.to_string(),
            order_id: order_id.to_string(),
            rider_id: rider_id.to_string(),
        }
    }
}

/// Event emitted when the sweeper expires an offer past its TTL.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OfferExpired {
    #[serde(flatten)]
    pub metadata: EventMetadata,

    pub offer_id: String,
    pub job_id: String,
    pub order_id: String,
    pub rider_id: String,
}

impl_domain_event!(OfferExpired);

impl OfferExpired {
    const EVENT_TYPE: &'static str = "marketflow:fulfillment:offer:expired";

    pub fn new(
        ctx: &ExecutionContext,
        offer_id: &str,
        job_id: &str,
        order_id: &str,
        rider_id: &str,
    ) -> Self {
        Self {
            metadata: EventMetadata::from_context(
                ctx,
                Self::EVENT_TYPE,
                SOURCE,
                offer_subject(offer_id),
                order_group(order_id),
            ),
            offer_id: offer_id.to_string(),
            job_id: job_id.to_string(),
            order_id: order_id.to_string(),
            rider_id: rider_id.to_string(),
        }
    }
}

/// Event emitted when a job is assigned to its winning rider.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobAssigned {
    #[serde(flatten)]
    pub metadata: EventMetadata,

    pub job_id: String,
    pub order_id: String,
    pub rider_id: String,
}

impl_domain_event!(JobAssigned);

impl JobAssigned {
    const EVENT_TYPE: &'static str = "marketflow:fulfillment:job:assigned";

    pub fn new(ctx: &ExecutionContext, job_id: &str, order_id: &str, rider_id: &str) -> Self {
        Self {
            metadata: EventMetadata::from_context(
                ctx,
                Self::EVENT_TYPE,
                SOURCE,
                job_subject(job_id),
                order_group(order_id),
            ),
            job_id: job_id.to_string(),
            order_id: order_id.to_string(),
            rider_id: rider_id.to_string(),
        }
    }
}

/// Event emitted when a job expires without an acceptance.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobExpired {
    #[serde(flatten)]
    pub metadata: EventMetadata,

    pub job_id: String,
    pub order_id: String,
}

impl_domain_event!(JobExpired);

impl JobExpired {
    const EVENT_TYPE: &'static str = "marketflow:fulfillment:job:expired";

    pub fn new(ctx: &ExecutionContext, job_id: &str, order_id: &str) -> Self {
        Self {
            metadata: EventMetadata::from_context(
                ctx,
                Self::EVENT_TYPE,
                SOURCE,
                job_subject(job_id),
                order_group(order_id),
            ),
            job_id: job_id.to_string(),
            order_id: order_id.to_string(),
        }
    }
}

/// Event emitted when an admin cancels a job.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobCancelled {
    #[serde(flatten)]
    pub metadata: EventMetadata,

    pub job_id: String,
    pub order_id: String,
}

impl_domain_event!(JobCancelled);

impl JobCancelled {
    const EVENT_TYPE: &'static str = "marketflow:fulfillment:job:cancelled";

    pub fn new(ctx: &ExecutionContext, job_id: &str, order_id: &str) -> Self {
        Self {
            metadata: EventMetadata::from_context(
                ctx,
                Self::EVENT_TYPE,
                SOURCE,
                job_subject(job_id),
                order_group(order_id),
            ),
            job_id: job_id.to_string(),
            order_id: order_id.to_string(),
        }
    }
}
