//! Error types for pdfchat.
//!
//! One enum covers every failure category of the pipeline: extraction,
//! embedding, vector storage, generation and request validation, plus the
//! configuration and I/O errors around them.

use thiserror::Error;

/// Unified error type for pdfchat.
///
/// All fallible functions return `Result<T, AppError>`.
/// Errors are represented and propagated, never panicked on.
#[derive(Error, Debug)]
pub enum AppError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O and filesystem errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A single document could not be read or parsed
    #[error("Extraction error: {0}")]
    Extraction(String),

    /// The embedding service failed or returned an unusable vector
    #[error("Embedding service error: {0}")]
    Embedding(String),

    /// Vector index storage or query failure
    #[error("Index error: {0}")]
    Index(String),

    /// The generative model call failed
    #[error("Generation error: {0}")]
    Generation(String),

    /// Malformed request input
    #[error("{0}")]
    Validation(String),

    /// No source documents matched
    #[error("No documents found in {0}")]
    NoDocumentsFound(String),

    /// Prompt system errors
    #[error("Prompt error: {0}")]
    Prompt(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Generic errors
    #[error("{0}")]
    Other(String),
}

impl AppError {
    /// Whether the error was caused by the caller's input rather than the service.
    pub fn is_client_error(&self) -> bool {
        matches!(self, AppError::Validation(_))
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

impl From<serde_yaml::Error> for AppError {
    fn from(err: serde_yaml::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

/// Convenience type alias for Results with AppError.
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_message_is_verbatim() {
        let err = AppError::Validation("No message provided".to_string());
        assert_eq!(err.to_string(), "No message provided");
        assert!(err.is_client_error());
    }

    #[test]
    fn test_service_errors_are_not_client_errors() {
        assert!(!AppError::Generation("boom".to_string()).is_client_error());
        assert!(!AppError::Index("corrupt".to_string()).is_client_error());
    }

    #[test]
    fn test_json_error_conversion() {
        let err: AppError = serde_json::from_str::<serde_json::Value>("{")
            .unwrap_err()
            .into();
        assert!(matches!(err, AppError::Serialization(_)));
    }
}
