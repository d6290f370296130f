//! Escrow Release Engine Operations

pub mod create;
pub mod events;
pub mod freeze;
pub mod refund;
pub mod release;

pub use create::{CreateHoldCommand, CreateHoldOutcome, CreateHoldUseCase};
pub use freeze::{FreezeHoldCommand, FreezeHoldUseCase};
pub use refund::{RefundHoldCommand, RefundHoldUseCase};
pub use release::{
    ReleaseCondition, ReleaseEligibility, ReleaseHoldCommand, ReleaseHoldUseCase, ReleaseOutcome,
};
