//! IndexedDB storage engine for idbkv key-value stores (browser WASM)
//!
//! Implements the `idbkv-core` engine traits over `web-sys`. Each store handle
//! owns one `IdbDatabase` connection; records live in a single object store
//! (`"kv"` unless configured otherwise) with out-of-line string keys and
//! JSON-shaped values.
//!
//! # Example
//!
//! ```rust,ignore
//! use idbkv_core::{KvStore, StoreConfig};
//! use idbkv_indexeddb::{BrowserSpawner, IndexedDbEngine};
//!
//! let store = KvStore::open(StoreConfig::new("settings"), &IndexedDbEngine::new(), BrowserSpawner)?;
//! store.set("theme", "dark")?.await?;
//! let theme = store.get("theme")?.await?;
//! ```

pub mod convert;
pub mod engine;
pub mod error;
pub mod idb;
pub mod spawn;

use lazy_static::lazy_static;

pub use engine::IndexedDbEngine;
pub use error::{IndexedDbError, Result};
pub use spawn::BrowserSpawner;

lazy_static! {
    /// Whether the global scope exposes an `IdbFactory`, checked once on first read.
    pub static ref INDEXEDDB_SUPPORTED: bool = idb::idb_factory().is_ok();
}

/// Read [`INDEXEDDB_SUPPORTED`].
pub fn indexeddb_supported() -> bool {
    *INDEXEDDB_SUPPORTED
}

/// Delete a database and every object store in it.
pub async fn delete_database(name: &str) -> Result<()> {
    idb::delete_database(name).await
}
