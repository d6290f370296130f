//! Use Case Result Type
//!
//! A result type for use case execution. Failures are reserved for
//! structural faults; concurrency races and unmet preconditions surface as
//! success values carrying a no-op outcome, so redundant invocations from
//! the sweeper or retrying callers stay cheap and silent.

use super::error::UseCaseError;

/// Result type for use case execution.
pub enum UseCaseResult<T> {
    /// Successful result containing the operation outcome.
    Success(T),
    /// Failed result containing the error.
    Failure(UseCaseError),
}

impl<T> UseCaseResult<T> {
    /// Create a failure result.
    pub fn failure(error: UseCaseError) -> Self {
        UseCaseResult::Failure(error)
    }

    /// Create a success result.
    pub(crate) fn success(value: T) -> Self {
        UseCaseResult::Success(value)
    }

    /// Check if this is a success result.
    pub fn is_success(&self) -> bool {
        matches!(self, UseCaseResult::Success(_))
    }

    /// Check if this is a failure result.
    pub fn is_failure(&self) -> bool {
        matches!(self, UseCaseResult::Failure(_))
    }

    /// Get the success value, consuming self.
    pub fn unwrap(self) -> T {
        match self {
            UseCaseResult::Success(v) => v,
            UseCaseResult::Failure(e) => panic!("Called unwrap on a Failure: {}", e),
        }
    }

    /// Get the error, consuming self.
    pub fn unwrap_err(self) -> UseCaseError {
        match self {
            UseCaseResult::Success(_) => panic!("Called unwrap_err on a Success"),
            UseCaseResult::Failure(e) => e,
        }
    }

    /// Map the success value.
    pub fn map<U, F>(self, f: F) -> UseCaseResult<U>
    where
        F: FnOnce(T) -> U,
    {
        match self {
            UseCaseResult::Success(v) => UseCaseResult::Success(f(v)),
            UseCaseResult::Failure(e) => UseCaseResult::Failure(e),
        }
    }

    /// Convert to a standard Result.
    pub fn into_result(self) -> Result<T, UseCaseError> {
        match self {
            UseCaseResult::Success(v) => Ok(v),
            UseCaseResult::Failure(e) => Err(e),
        }
    }
}

impl<T> From<UseCaseResult<T>> for Result<T, UseCaseError> {
    fn from(result: UseCaseResult<T>) -> Self {
        result.into_result()
    }
}

impl<T: std::fmt::Debug> std::fmt::Debug for UseCaseResult<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UseCaseResult::Success(v) => f.debug_tuple("Success").field(v).finish(),
            UseCaseResult::Failure(e) => f.debug_tuple("Failure").field(e).finish(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_result() {
        let result: UseCaseResult<String> = UseCaseResult::success("test".to_string());
        assert!(result.is_success());
        assert!(!result.is_failure());
        assert_eq!(result.unwrap(), "test");
    }

    #[test]
    fn test_failure_result() {
        let result: UseCaseResult<String> =
            UseCaseResult::failure(UseCaseError::validation("CODE", "message"));
        assert!(!result.is_success());
        assert!(result.is_failure());
        assert_eq!(result.unwrap_err().code(), "CODE");
    }

    #[test]
    fn test_map() {
        let result: UseCaseResult<i32> = UseCaseResult::success(42);
        let mapped = result.map(|v| v * 2);
        assert_eq!(mapped.unwrap(), 84);
    }

    #[test]
    fn test_into_result() {
        let result: UseCaseResult<i32> = UseCaseResult::success(42);
        let std_result: Result<i32, UseCaseError> = result.into_result();
        assert_eq!(std_result.unwrap(), 42);
    }
}
