//! Gavel Error Definitions
//!
//! Defines error types used throughout the project.

use thiserror::Error;

/// Core engine error types
#[derive(Error, Debug)]
pub enum CoreError {
    // =========================================================================
    // Lookup Errors
    // =========================================================================
    #[error("Not found: {0}")]
    NotFound(String),

    // =========================================================================
    // Storage Errors
    // =========================================================================
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Database error: {0}")]
    Database(String),

    // =========================================================================
    // Transcription Errors
    // =========================================================================
    #[error("Transcription failed: {message}")]
    Transcription { message: String, retryable: bool },

    #[error("Timeout: {0}")]
    Timeout(String),

    // =========================================================================
    // Caller Errors
    // =========================================================================
    #[error("Validation error: {0}")]
    Validation(String),

    /// A guarded state transition lost the race against another worker.
    #[error("Conflict: {0}")]
    Conflict(String),

    // =========================================================================
    // General Errors
    // =========================================================================
    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Core engine result type
pub type CoreResult<T> = Result<T, CoreError>;

impl CoreError {
    /// Whether a failed operation may be retried with backoff.
    ///
    /// Transport failures and timeouts are transient; transcription failures
    /// carry their own classification from the adapter. Everything else is
    /// surfaced to the caller as-is.
    pub fn is_retryable(&self) -> bool {
        match self {
            CoreError::Io(_) | CoreError::Timeout(_) => true,
            CoreError::Transcription { retryable, .. } => *retryable,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_and_timeout_are_retryable() {
        let io = CoreError::Io(std::io::Error::new(std::io::ErrorKind::Other, "boom"));
        assert!(io.is_retryable());
        assert!(CoreError::Timeout("transcribe".to_string()).is_retryable());
    }

    #[test]
    fn test_transcription_carries_classification() {
        let transient = CoreError::Transcription {
            message: "service unavailable".to_string(),
            retryable: true,
        };
        let terminal = CoreError::Transcription {
            message: "unsupported codec".to_string(),
            retryable: false,
        };
        assert!(transient.is_retryable());
        assert!(!terminal.is_retryable());
    }

    #[test]
    fn test_caller_errors_are_not_retryable() {
        assert!(!CoreError::NotFound("event".to_string()).is_retryable());
        assert!(!CoreError::Validation("bad row".to_string()).is_retryable());
        assert!(!CoreError::Conflict("lost race".to_string()).is_retryable());
    }
}
