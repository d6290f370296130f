//! Dispatch Offer Engine
//!
//! Broadcasts a delivery job to eligible riders and resolves exactly one
//! acceptance under contention. Jobs and offers are closed state machines;
//! every mutation is a guarded write against the durable store.

mod entity;
pub mod operations;
mod repository;

pub use entity::{BroadcastMode, DispatchJob, DispatchOffer, JobStatus, OfferDecision, OfferStatus};
pub use operations::{
    AdvanceOutcome, BroadcastOffersCommand, BroadcastOffersUseCase, BroadcastOutcome,
    CancelJobCommand, CancelJobUseCase, CancelOutcome, CreateDispatchJobCommand,
    CreateDispatchJobUseCase, CreateJobOutcome, ExhaustionPolicy, ExpireStaleOffersCommand,
    ExpireStaleOffersUseCase, RespondCommand, RespondOutcome, RespondToOfferUseCase, SweepSummary,
};
pub use repository::{AcceptOutcome, DispatchStore};
