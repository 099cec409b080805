//! Key-value store handle over a transactional storage engine
//!
//! This crate wraps a transactional object store (IndexedDB in the browser,
//! an in-memory engine natively) behind a small key-value interface:
//! `get`, `set`, `add`, `remove`, `clear`, `count`, `keys`, `values`, `json`.
//!
//! A [`KvStore`] is usable as soon as it is constructed. Calls issued while
//! the engine is still opening are queued and run in order once it opens.
//! Every verb can deliver its result through a callback (`*_with`) or a
//! [`Pending`] future.
//!
//! # Example
//!
//! ```rust
//! use futures::executor::LocalPool;
//! use idbkv_core::{KvStore, MemoryEngine, StoreConfig};
//! use serde_json::json;
//!
//! let mut pool = LocalPool::new();
//! let engine = MemoryEngine::new();
//! let store = KvStore::open(StoreConfig::new("settings"), &engine, pool.spawner()).unwrap();
//!
//! // Queued until the engine finishes opening
//! let written = store.set("theme", "dark").unwrap();
//! let read = store.get("theme").unwrap();
//!
//! pool.run_until(written).unwrap();
//! assert_eq!(pool.run_until(read).unwrap(), Some(json!("dark")));
//! ```

mod adapter;
pub mod config;
pub mod engine;
pub mod error;
pub mod events;
pub mod logging;
mod sink;
pub mod store;

pub use config::StoreConfig;
pub use engine::{
    Connection, EngineError, EngineResult, MemoryEngine, Request, StorageEngine, Transaction,
    TransactionMode,
};
pub use error::{KvError, KvResult};
pub use events::{Change, ChangeStream};
pub use sink::{Callback, Pending};
pub use store::{KvStore, Lifecycle};
