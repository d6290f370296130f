//! Use Case Layer
//!
//! Shared machinery for engine operations: execution context for tracing
//! and principal propagation, domain events with CloudEvents-style
//! metadata, and the categorized result/error types.

pub mod domain_event;
pub mod error;
pub mod execution_context;
pub mod result;

pub use domain_event::{DomainEvent, EventMetadata};
pub use error::UseCaseError;
pub use execution_context::ExecutionContext;
pub use result::UseCaseResult;
