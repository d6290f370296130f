//! Escrow Release Engine
//!
//! Holds captured funds in trust and releases them to the seller only when
//! the full release conjunction holds. The credit and the status
//! transition commit atomically, guarded by the hold still being Held.

mod entity;
pub mod operations;
mod repository;

pub use entity::{EscrowHold, HoldStatus, LedgerAccount};
pub use operations::{
    CreateHoldCommand, CreateHoldOutcome, CreateHoldUseCase, FreezeHoldCommand, FreezeHoldUseCase,
    RefundHoldCommand, RefundHoldUseCase, ReleaseCondition, ReleaseEligibility, ReleaseHoldCommand,
    ReleaseHoldUseCase, ReleaseOutcome,
};
pub use repository::EscrowStore;
