//! Dispatch Offer Engine Operations

pub mod advance;
pub mod broadcast;
pub mod cancel;
pub mod create;
pub mod events;
pub mod expire;
pub mod respond;

pub use advance::{AdvanceOutcome, ExhaustionPolicy};
pub use broadcast::{BroadcastOffersCommand, BroadcastOffersUseCase, BroadcastOutcome};
pub use cancel::{CancelJobCommand, CancelJobUseCase, CancelOutcome};
pub use create::{CreateDispatchJobCommand, CreateDispatchJobUseCase, CreateJobOutcome};
pub use expire::{ExpireStaleOffersCommand, ExpireStaleOffersUseCase, SweepSummary};
pub use respond::{RespondCommand, RespondOutcome, RespondToOfferUseCase};
