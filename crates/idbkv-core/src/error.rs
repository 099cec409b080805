//! Error types for the key-value store handle

use thiserror::Error;

use crate::engine::EngineError;

/// Result type for store operations
pub type KvResult<T> = Result<T, KvError>;

/// Errors surfaced by [`crate::KvStore`].
///
/// Construction and closed-handle errors are returned synchronously from the
/// calling method. Everything else is delivered through the operation's
/// result channel (callback or [`crate::Pending`] future).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KvError {
    /// Store name missing or invalid
    #[error("invalid store configuration: {0}")]
    Construction(String),

    /// No storage engine available in this environment
    #[error("storage not supported in this environment: {0}")]
    Unsupported(String),

    /// Engine refused to open the store
    #[error("failed to open store: {0}")]
    Open(String),

    /// `add` on a key that already exists
    #[error("key already exists: {0}")]
    DuplicateKey(String),

    /// Engine failure during a read or write
    #[error("transaction failed: {0}")]
    Transaction(String),

    /// Operation attempted after `close()`
    #[error("store is closed")]
    Closed,

    /// No callback given and the host has no promise support
    #[error("no callback supplied and promises are not supported")]
    NoPromise,

    /// The executor dropped the operation before it completed
    #[error("operation abandoned before completion")]
    Abandoned,
}

impl KvError {
    /// Stable name of the error kind, used as the JS `Error.name`.
    pub fn kind(&self) -> &'static str {
        match self {
            KvError::Construction(_) => "ConstructionError",
            KvError::Unsupported(_) => "UnsupportedEnvironmentError",
            KvError::Open(_) => "OpenError",
            KvError::DuplicateKey(_) => "DuplicateKeyError",
            KvError::Transaction(_) => "TransactionError",
            KvError::Closed => "ClosedHandleError",
            KvError::NoPromise => "NoCallbackNoPromiseError",
            KvError::Abandoned => "AbandonedError",
        }
    }
}

/// Normalize engine failures into the store's error convention
impl From<EngineError> for KvError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::NotAvailable(msg) => KvError::Unsupported(msg),
            EngineError::Open(msg) => KvError::Open(msg),
            EngineError::Constraint(key) => KvError::DuplicateKey(key),
            EngineError::Transaction(msg) => KvError::Transaction(msg),
            EngineError::Request(msg) => KvError::Transaction(format!("request: {}", msg)),
            EngineError::Serialization(msg) => {
                KvError::Transaction(format!("serialization: {}", msg))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constraint_maps_to_duplicate_key() {
        let err = KvError::from(EngineError::Constraint("abc".into()));
        assert_eq!(err, KvError::DuplicateKey("abc".into()));
        assert_eq!(err.kind(), "DuplicateKeyError");
    }

    #[test]
    fn test_not_available_maps_to_unsupported() {
        let err = KvError::from(EngineError::NotAvailable("no indexedDB".into()));
        assert!(matches!(err, KvError::Unsupported(_)));
    }

    #[test]
    fn test_request_failures_are_transaction_errors() {
        let err = KvError::from(EngineError::Request("boom".into()));
        assert_eq!(err, KvError::Transaction("request: boom".into()));
        assert_eq!(err.to_string(), "transaction failed: request: boom");
    }
}
