//! Error types for port operations.

/// Repository operation errors with context for debugging.
#[derive(Debug, thiserror::Error)]
pub enum RepoError {
    /// Database operation failed - includes operation name for tracing.
    #[error("Database error in {operation}: {message}")]
    Database {
        operation: &'static str,
        message: String,
    },

    /// Serialization/deserialization failed.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl RepoError {
    /// Create a Database error with operation context.
    pub fn database(operation: &'static str, message: impl ToString) -> Self {
        Self::Database {
            operation,
            message: message.to_string(),
        }
    }

    /// Create a Serialization error.
    pub fn serialization(message: impl ToString) -> Self {
        Self::Serialization(message.to_string())
    }
}

/// Failures of outbound sinks (world history, metrics).
#[derive(Debug, Clone, thiserror::Error)]
pub enum SinkError {
    #[error("Sink unavailable: {0}")]
    Unavailable(String),
}

impl From<RepoError> for SinkError {
    fn from(err: RepoError) -> Self {
        Self::Unavailable(err.to_string())
    }
}
