//! Use Case Errors
//!
//! Categorized error types for use case failures. Errors cover structural
//! faults only (missing entities, identity mismatches, commit failures);
//! domain no-ops such as a stale offer or an ineligible hold are ordinary
//! success outcomes, not errors.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Macro for creating error detail maps.
///
/// # Example
///
/// ```ignore
/// use mf_fulfillment::details;
///
/// let details = details! {
///     "offerId" => offer_id,
///     "riderId" => rider_id
/// };
/// ```
#[macro_export]
macro_rules! details {
    () => {
        std::collections::HashMap::new()
    };
    ($($key:expr => $value:expr),+ $(,)?) => {{
        let mut map = std::collections::HashMap::new();
        $(
            map.insert($key.to_string(), serde_json::json!($value));
        )+
        map
    }};
}

/// Categorized error types for use case failures.
///
/// Each variant maps to a specific HTTP status code:
/// - `ValidationError` -> 400 Bad Request
/// - `BusinessRuleViolation` -> 409 Conflict
/// - `NotFoundError` -> 404 Not Found
/// - `ConcurrencyError` -> 409 Conflict
/// - `CommitError` -> 500 Internal Server Error
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum UseCaseError {
    /// Input validation failed (missing required fields, wrong responder, etc.)
    /// Maps to HTTP 400 Bad Request.
    ValidationError {
        code: String,
        message: String,
        #[serde(default)]
        details: HashMap<String, serde_json::Value>,
    },

    /// Business rule violation (entity in wrong state for an admin action).
    /// Maps to HTTP 409 Conflict.
    BusinessRuleViolation {
        code: String,
        message: String,
        #[serde(default)]
        details: HashMap<String, serde_json::Value>,
    },

    /// Entity not found.
    /// Maps to HTTP 404 Not Found.
    NotFoundError {
        code: String,
        message: String,
        #[serde(default)]
        details: HashMap<String, serde_json::Value>,
    },

    /// Lost a compare-and-set race in a place where that is unexpected.
    /// Maps to HTTP 409 Conflict.
    ConcurrencyError {
        code: String,
        message: String,
        #[serde(default)]
        details: HashMap<String, serde_json::Value>,
    },

    /// Store transaction failed.
    /// Maps to HTTP 500 Internal Server Error.
    CommitError {
        code: String,
        message: String,
        #[serde(default)]
        details: HashMap<String, serde_json::Value>,
    },
}

impl UseCaseError {
    /// Create a validation error with the given code and message.
    pub fn validation(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ValidationError {
            code: code.into(),
            message: message.into(),
            details: HashMap::new(),
        }
    }

    /// Create a validation error with details.
    pub fn validation_with_details(
        code: impl Into<String>,
        message: impl Into<String>,
        details: HashMap<String, serde_json::Value>,
    ) -> Self {
        Self::ValidationError {
            code: code.into(),
            message: message.into(),
            details,
        }
    }

    /// Create a business rule violation error.
    pub fn business_rule(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::BusinessRuleViolation {
            code: code.into(),
            message: message.into(),
            details: HashMap::new(),
        }
    }

    /// Create a not found error.
    pub fn not_found(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::NotFoundError {
            code: code.into(),
            message: message.into(),
            details: HashMap::new(),
        }
    }

    /// Create a concurrency error.
    pub fn concurrency(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConcurrencyError {
            code: code.into(),
            message: message.into(),
            details: HashMap::new(),
        }
    }

    /// Create a commit error.
    pub fn commit(message: impl Into<String>) -> Self {
        Self::CommitError {
            code: "COMMIT_FAILED".to_string(),
            message: message.into(),
            details: HashMap::new(),
        }
    }

    /// Get the error code.
    pub fn code(&self) -> &str {
        match self {
            Self::ValidationError { code, .. } => code,
            Self::BusinessRuleViolation { code, .. } => code,
            Self::NotFoundError { code, .. } => code,
            Self::ConcurrencyError { code, .. } => code,
            Self::CommitError { code, .. } => code,
        }
    }

    /// Get the error message.
    pub fn message(&self) -> &str {
        match self {
            Self::ValidationError { message, .. } => message,
            Self::BusinessRuleViolation { message, .. } => message,
            Self::NotFoundError { message, .. } => message,
            Self::ConcurrencyError { message, .. } => message,
            Self::CommitError { message, .. } => message,
        }
    }

    /// Get the suggested HTTP status code for this error.
    pub fn http_status_code(&self) -> u16 {
        match self {
            Self::ValidationError { .. } => 400,
            Self::BusinessRuleViolation { .. } => 409,
            Self::NotFoundError { .. } => 404,
            Self::ConcurrencyError { .. } => 409,
            Self::CommitError { .. } => 500,
        }
    }
}

impl std::fmt::Display for UseCaseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.code(), self.message())
    }
}

impl std::error::Error for UseCaseError {}

impl From<crate::shared::error::StoreError> for UseCaseError {
    fn from(e: crate::shared::error::StoreError) -> Self {
        UseCaseError::commit(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error() {
        let err = UseCaseError::validation("RESPONDER_MISMATCH", "Offer belongs to another rider");
        assert_eq!(err.code(), "RESPONDER_MISMATCH");
        assert_eq!(err.http_status_code(), 400);
    }

    #[test]
    fn test_not_found_error() {
        let err = UseCaseError::not_found("HOLD_NOT_FOUND", "Hold not found");
        assert_eq!(err.http_status_code(), 404);
    }

    #[test]
    fn test_details_macro() {
        let offer_id = "offer-1";
        let details = details! {
            "offerId" => offer_id,
            "attempt" => 2,
        };
        assert_eq!(details.get("offerId"), Some(&serde_json::json!("offer-1")));
        assert_eq!(details.get("attempt"), Some(&serde_json::json!(2)));
    }

    #[test]
    fn test_details_macro_with_error() {
        let err = UseCaseError::validation_with_details(
            "RESPONDER_MISMATCH",
            "Offer belongs to another rider",
            details! { "offerId" => "offer-1" },
        );
        if let UseCaseError::ValidationError { details, .. } = err {
            assert!(details.contains_key("offerId"));
        } else {
            panic!("Expected ValidationError");
        }
    }
}
