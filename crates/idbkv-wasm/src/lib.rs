//! idbkv browser bindings
//!
//! Exposes the `IdbKvStore` class to JavaScript through wasm-bindgen. The
//! class is a thin shell over `idbkv_core::KvStore` running on the IndexedDB
//! engine: calls made before the database opens are queued, and each call
//! reports through an optional node-style callback or a returned promise.

mod reply;
mod store;

pub use store::IdbKvStore;
