//! Error types for the segment and checkpoint manager

use thiserror::Error;

/// Result type alias using the manager Error
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for the segment and checkpoint manager
#[derive(Error, Debug)]
pub enum Error {
    // Configuration errors
    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },

    // Registration errors
    #[error("Invalid shape for segment {segment}: {message}")]
    InvalidShape { segment: String, message: String },

    #[error("Shape mismatch for segment {segment}: {message}")]
    ShapeMismatch { segment: String, message: String },

    #[error("Unknown segment: {segment}")]
    UnknownSegment { segment: String },

    #[error("Unknown parameter: {parameter}")]
    UnknownParameter { parameter: String },

    // Lifecycle errors
    #[error("Operation {operation} is not valid in state {state}")]
    InvalidState { operation: String, state: String },

    // Checkpoint errors
    #[error("Invalid checkpoint level: {level} (expected 1-4)")]
    InvalidLevel { level: u8 },

    #[error("No valid checkpoint found for recovery")]
    NoCheckpointForRecovery,

    // Storage errors
    #[error("Storage error: {message}")]
    Storage { message: String },

    // I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl Error {
    /// Returns true if this error is retryable
    ///
    /// A failed checkpoint is retryable by calling `checkpoint` again at a
    /// later iteration; the manager itself never retries.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Storage { .. } | Error::Io(_))
    }

    /// Returns true if this error indicates a programming or setup mistake
    /// that will not go away on its own
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::InvalidConfig { .. }
                | Error::InvalidState { .. }
                | Error::UnknownSegment { .. }
                | Error::UnknownParameter { .. }
        )
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_retryable() {
        let err = Error::Storage {
            message: "disk full".to_string(),
        };
        assert!(err.is_retryable());

        let err = Error::UnknownSegment {
            segment: "weights".to_string(),
        };
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_error_fatal() {
        let err = Error::InvalidState {
            operation: "checkpoint".to_string(),
            state: "initialized".to_string(),
        };
        assert!(err.is_fatal());

        let err = Error::Storage {
            message: "write failed".to_string(),
        };
        assert!(!err.is_fatal());
    }

    #[test]
    fn test_error_display_carries_context() {
        let err = Error::ShapeMismatch {
            segment: "positions".to_string(),
            message: "recorded 1024 elements, live segment has 2048".to_string(),
        };
        let text = err.to_string();
        assert!(text.contains("positions"));
        assert!(text.contains("1024"));
    }
}
