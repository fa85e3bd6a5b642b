//! Domain error model.

use thiserror::Error;

/// Result type used across the domain layer.
pub type DomainResult<T> = Result<T, DomainError>;

/// Domain-level error.
///
/// Keep this focused on deterministic, business/domain failures (validation,
/// invariants, state transitions). Infrastructure concerns belong elsewhere.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// The requested aggregate does not exist in storage.
    #[error("product not found")]
    NotFound,

    /// Malformed input, rejected before any mutation.
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),

    /// A business-rule precondition failed; the aggregate is left unmutated.
    #[error("invalid state transition: {0}")]
    InvalidStateTransition(#[from] TransitionError),

    /// Exact arithmetic could not be performed (e.g. a zero denominator).
    #[error("arithmetic error: {0}")]
    Arithmetic(String),

    /// An identifier was invalid (e.g. parse failure).
    #[error("invalid identifier: {0}")]
    InvalidId(String),
}

/// Input validation failures.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("product name is required")]
    NameRequired,

    #[error("product category is required")]
    CategoryRequired,

    #[error("price must not be negative")]
    InvalidPrice,

    #[error("discount percentage must be greater than 0 and at most 100")]
    InvalidDiscountPercent,

    #[error("discount start must be before its end")]
    InvalidDiscountPeriod,

    #[error("invalid page token: {0}")]
    InvalidPageToken(String),
}

/// Lifecycle precondition failures.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum TransitionError {
    #[error("product is already active")]
    AlreadyActive,

    #[error("product is already inactive")]
    AlreadyInactive,

    #[error("product is archived")]
    Archived,

    #[error("product is not active")]
    NotActive,

    #[error("discount is not active at the given time")]
    DiscountNotActive,

    #[error("product has no discount to remove")]
    NoActiveDiscount,
}

impl DomainError {
    pub fn arithmetic(msg: impl Into<String>) -> Self {
        Self::Arithmetic(msg.into())
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }

    pub fn not_found() -> Self {
        Self::NotFound
    }

    /// Whether this is the given lifecycle precondition failure.
    pub fn is_transition(&self, expected: TransitionError) -> bool {
        matches!(self, Self::InvalidStateTransition(actual) if *actual == expected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nested_errors_convert_and_render() {
        let err: DomainError = ValidationError::NameRequired.into();
        assert_eq!(err.to_string(), "validation failed: product name is required");

        let err: DomainError = TransitionError::Archived.into();
        assert!(err.is_transition(TransitionError::Archived));
        assert!(!err.is_transition(TransitionError::NotActive));
    }
}
