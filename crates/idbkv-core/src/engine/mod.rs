//! Capability interface of the transactional storage engine
//!
//! The store handle never persists anything itself. Everything goes through
//! these traits, which mirror the small slice of IndexedDB the handle needs:
//!
//! - **Memory**: `BTreeMap`-backed engine for tests and native use (`MemoryEngine`)
//! - **IndexedDB**: browser engine over web-sys (separate crate, WASM only)
//!
//! Requests are issued when a [`Transaction`] method is called. The returned
//! [`Request`] future only waits for completion, so the engine observes
//! requests and transactions in exactly the order the handle created them.

mod error;
mod memory;

use futures::future::LocalBoxFuture;
use serde_json::Value;

use crate::config::StoreConfig;

pub use error::{EngineError, EngineResult};
pub use memory::MemoryEngine;

/// Completion of an already-issued engine request.
pub type Request<T> = LocalBoxFuture<'static, EngineResult<T>>;

/// Transaction scope requested from the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionMode {
    ReadOnly,
    ReadWrite,
}

/// Entry point of a storage engine: opens connections by store name.
pub trait StorageEngine {
    /// Begin opening the store described by `config`.
    ///
    /// The open request is issued immediately; the future resolves once the
    /// engine reports success or failure.
    fn open(&self, config: &StoreConfig) -> LocalBoxFuture<'static, EngineResult<Box<dyn Connection>>>;
}

/// An open connection, exclusively owned by one store handle.
pub trait Connection {
    /// Start a transaction over the handle's object store.
    fn begin(&self, mode: TransactionMode) -> EngineResult<Box<dyn Transaction>>;

    /// Release the connection. Transactions already begun may still finish.
    fn close(&self);
}

/// A single engine transaction.
pub trait Transaction {
    /// Value stored under `key`, or `None`.
    fn get(&self, key: &str) -> Request<Option<Value>>;

    /// Every record in engine key order.
    fn get_all(&self) -> Request<Vec<(String, Value)>>;

    /// Insert or overwrite.
    fn put(&self, key: &str, value: &Value) -> Request<()>;

    /// Insert, failing with [`EngineError::Constraint`] if the key exists.
    fn insert_unique(&self, key: &str, value: &Value) -> Request<()>;

    /// Delete `key`; absent keys are not an error.
    fn delete(&self, key: &str) -> Request<()>;

    /// Delete every record.
    fn clear(&self) -> Request<()>;

    /// Number of records.
    fn count(&self) -> Request<usize>;

    /// Wait for the transaction to complete.
    fn commit(self: Box<Self>) -> Request<()>;
}
