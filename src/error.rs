//! Custom error types for the associative memory system.
//!
//! Graph operations themselves never fail; these errors only surface at the
//! boundaries (persistence, snapshot decoding, extractor output validation).

use thiserror::Error;

/// Errors that can occur at the edges of the associative memory system.
#[derive(Debug, Error)]
pub enum MemoryError {
    /// Database-related errors (SQLite).
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Snapshot encoding or decoding failed.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Invalid input provided by the caller.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// The extractor failed or produced output that does not match the
    /// `{concepts, topics}` contract.
    #[error("Extraction error: {0}")]
    Extraction(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_messages() {
        let err = MemoryError::InvalidInput("empty key".to_string());
        assert_eq!(err.to_string(), "Invalid input: empty key");

        let err = MemoryError::Extraction("concepts must be an array".to_string());
        assert_eq!(err.to_string(), "Extraction error: concepts must be an array");
    }

    #[test]
    fn test_from_serde_json() {
        let parse_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err: MemoryError = parse_err.into();
        assert!(matches!(err, MemoryError::Serialization(_)));
        assert!(std::error::Error::source(&err).is_some());
    }
}
