//! Error types for the IndexedDB engine

use idbkv_core::EngineError;
use thiserror::Error;
use wasm_bindgen::{JsCast, JsValue};
use web_sys::DomException;

/// Result type for IndexedDB operations
pub type Result<T> = std::result::Result<T, IndexedDbError>;

/// Errors that can occur during IndexedDB operations
#[derive(Debug, Error)]
pub enum IndexedDbError {
    /// IndexedDB is not available in this environment
    #[error("IndexedDB not available: {0}")]
    NotAvailable(String),

    /// Database open/upgrade error
    #[error("IndexedDB open error: {0}")]
    Open(String),

    /// Transaction error or abort
    #[error("IndexedDB transaction error: {0}")]
    Transaction(String),

    /// Request error from IDB operation
    #[error("IndexedDB request error: {0}")]
    Request(String),

    /// A request violated the object store's key uniqueness
    #[error("IndexedDB constraint error: {0}")]
    Constraint(String),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// JavaScript value conversion error
    #[error("JS conversion error: {0}")]
    JsValue(String),
}

impl IndexedDbError {
    /// Classify the value a failed request rejected with.
    ///
    /// Requests reject with their `DOMException`; a `ConstraintError` is the
    /// engine refusing an insert on an existing key.
    pub fn from_request(val: JsValue) -> Self {
        match val.dyn_ref::<DomException>() {
            Some(e) if e.name() == "ConstraintError" => IndexedDbError::Constraint(e.message()),
            Some(e) => IndexedDbError::Request(format!("{}: {}", e.name(), e.message())),
            None => IndexedDbError::from(val),
        }
    }
}

impl From<JsValue> for IndexedDbError {
    fn from(val: JsValue) -> Self {
        IndexedDbError::Request(describe(&val))
    }
}

/// Best-effort human-readable text for a thrown JS value.
pub(crate) fn describe(val: &JsValue) -> String {
    if let Some(e) = val.dyn_ref::<DomException>() {
        return format!("{}: {}", e.name(), e.message());
    }
    if let Some(s) = val.as_string() {
        return s;
    }
    js_sys::JSON::stringify(val)
        .map(String::from)
        .unwrap_or_else(|_| format!("{:?}", val))
}

/// Convert IndexedDbError to EngineError for the engine traits
impl From<IndexedDbError> for EngineError {
    fn from(err: IndexedDbError) -> Self {
        match err {
            IndexedDbError::NotAvailable(msg) => EngineError::NotAvailable(msg),
            IndexedDbError::Open(msg) => EngineError::Open(msg),
            IndexedDbError::Transaction(msg) => EngineError::Transaction(msg),
            IndexedDbError::Request(msg) => EngineError::Request(msg),
            IndexedDbError::Constraint(msg) => EngineError::Constraint(msg),
            IndexedDbError::Json(e) => EngineError::Serialization(e.to_string()),
            IndexedDbError::JsValue(msg) => EngineError::Serialization(msg),
        }
    }
}
