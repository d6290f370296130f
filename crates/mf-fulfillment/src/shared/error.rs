//! Store Errors
//!
//! Infrastructure-level failures from the durable store. Domain outcomes
//! (stale offers, ineligible holds) are not errors; see the use case layer.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Duplicate key: {0}")]
    DuplicateKey(String),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

impl From<mongodb::error::Error> for StoreError {
    fn from(e: mongodb::error::Error) -> Self {
        use mongodb::error::{ErrorKind, WriteFailure};
        if let ErrorKind::Write(WriteFailure::WriteError(ref we)) = *e.kind {
            // 11000 is the server's duplicate key code
            if we.code == 11000 {
                return StoreError::DuplicateKey(we.message.clone());
            }
        }
        StoreError::Database(e.to_string())
    }
}

impl From<bson::ser::Error> for StoreError {
    fn from(e: bson::ser::Error) -> Self {
        StoreError::Serialization(e.to_string())
    }
}

impl From<bson::de::Error> for StoreError {
    fn from(e: bson::de::Error) -> Self {
        StoreError::Serialization(e.to_string())
    }
}
