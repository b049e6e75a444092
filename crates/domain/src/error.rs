//! Unified error types for the domain layer
//!
//! Provides a common error type that can be used across all domain operations,
//! enabling consistent error handling without forcing adapters to use String or anyhow.

use thiserror::Error;

/// Unified error type for domain operations
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Validation failed (e.g., invalid field values)
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Parse error (for value objects)
    #[error("Parse error: {0}")]
    Parse(String),

    /// State transition not allowed
    #[error("Invalid state transition: {0}")]
    InvalidStateTransition(String),
}

impl DomainError {
    /// Creates a validation error for configuration or field values
    /// that break a domain invariant.
    ///
    /// # Example
    /// ```ignore
    /// if hours_per_day == 0 {
    ///     return Err(DomainError::validation("hours_per_day must be positive"));
    /// }
    /// ```
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Creates a parse error for string-to-type conversion failures.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse(msg.into())
    }

    /// Create an invalid state transition error
    pub fn invalid_state_transition(msg: impl Into<String>) -> Self {
        Self::InvalidStateTransition(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_message_is_displayed() {
        let err = DomainError::validation("hours_per_day must be positive");
        assert_eq!(
            err.to_string(),
            "Validation failed: hours_per_day must be positive"
        );
    }

    #[test]
    fn helpers_build_matching_variants() {
        assert!(matches!(
            DomainError::validation("x"),
            DomainError::Validation(_)
        ));
        assert!(matches!(DomainError::parse("x"), DomainError::Parse(_)));
        assert!(matches!(
            DomainError::invalid_state_transition("x"),
            DomainError::InvalidStateTransition(_)
        ));
    }
}
