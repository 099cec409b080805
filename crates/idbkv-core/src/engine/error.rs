//! Engine error types

use thiserror::Error;

/// Result type for engine requests
pub type EngineResult<T> = Result<T, EngineError>;

/// Errors reported by a storage engine
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    /// The engine does not exist in this environment
    #[error("storage engine not available: {0}")]
    NotAvailable(String),

    /// Database open/upgrade error
    #[error("open error: {0}")]
    Open(String),

    /// Transaction could not start or did not complete
    #[error("transaction error: {0}")]
    Transaction(String),

    /// A single request failed
    #[error("request error: {0}")]
    Request(String),

    /// Uniqueness constraint rejected an insert; carries the key
    #[error("key already exists: {0}")]
    Constraint(String),

    /// Value could not be converted to or from the engine's representation
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for EngineError {
    fn from(err: serde_json::Error) -> Self {
        EngineError::Serialization(err.to_string())
    }
}
