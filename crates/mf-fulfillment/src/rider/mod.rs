//! Rider Pool
//!
//! Rider availability read model and the candidate pool selector used by
//! the dispatch offer engine.

mod entity;
mod repository;
mod selector;

pub use entity::{Rider, RiderAvailability, RiderTier};
pub use repository::RiderStore;
pub use selector::{PoolSelector, RankCriterion, RankingPolicy};
