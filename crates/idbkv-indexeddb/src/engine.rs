//! IndexedDB implementation of the engine traits.
//!
//! One [`IndexedDbEngine::open`] call issues one `indexedDB.open` request.
//! Each verb maps onto a single object store request issued inside a fresh
//! transaction, in the order the store handle begins them.

use futures::future::{self, FutureExt, LocalBoxFuture};
use idbkv_core::{
    Connection, EngineError, EngineResult, Request, StorageEngine, StoreConfig, Transaction,
    TransactionMode,
};
use serde_json::Value;
use wasm_bindgen::JsValue;
use web_sys::{IdbDatabase, IdbObjectStore, IdbRequest, IdbTransactionMode};

use crate::convert;
use crate::error::{describe, IndexedDbError};
use crate::idb;

/// Storage engine backed by the browser's IndexedDB.
#[derive(Debug, Clone, Copy, Default)]
pub struct IndexedDbEngine;

impl IndexedDbEngine {
    pub fn new() -> Self {
        Self
    }
}

impl StorageEngine for IndexedDbEngine {
    fn open(
        &self,
        config: &StoreConfig,
    ) -> LocalBoxFuture<'static, EngineResult<Box<dyn Connection>>> {
        let opening = match idb::open_database(&config.name, &config.object_store, config.version)
        {
            Ok(opening) => opening,
            Err(e) => return future::ready(Err(e.into())).boxed_local(),
        };

        let store_name = config.object_store.clone();
        async move {
            let db = opening.await?;
            Ok(Box::new(IdbConnection { db, store_name }) as Box<dyn Connection>)
        }
        .boxed_local()
    }
}

struct IdbConnection {
    db: IdbDatabase,
    store_name: String,
}

impl Connection for IdbConnection {
    fn begin(&self, mode: TransactionMode) -> EngineResult<Box<dyn Transaction>> {
        let mode = match mode {
            TransactionMode::ReadOnly => IdbTransactionMode::Readonly,
            TransactionMode::ReadWrite => IdbTransactionMode::Readwrite,
        };
        let (tx, store) = idb::begin_transaction(&self.db, &self.store_name, mode)?;

        // Watch completion now; a short transaction may finish before commit() is awaited
        let done = idb::watch_transaction(&tx)
            .map(|r| r.map_err(EngineError::from))
            .boxed_local();
        Ok(Box::new(IdbTxn { store, done }))
    }

    fn close(&self) {
        self.db.close();
    }
}

struct IdbTxn {
    store: IdbObjectStore,
    done: Request<()>,
}

impl IdbTxn {
    /// Watch a request issued against the object store, converting its result.
    fn issue<T: 'static>(
        &self,
        verb: &str,
        issued: Result<IdbRequest, JsValue>,
        decode: impl FnOnce(JsValue) -> EngineResult<T> + 'static,
    ) -> Request<T> {
        let req = match issued {
            Ok(req) => req,
            Err(e) => {
                let err = IndexedDbError::Request(format!("{}: {}", verb, describe(&e)));
                return future::ready(Err(err.into())).boxed_local();
            }
        };
        let watched = idb::watch_request(&req);
        async move { decode(watched.await?) }.boxed_local()
    }

    fn write(&self, verb: &str, issued: Result<IdbRequest, JsValue>) -> Request<()> {
        self.issue(verb, issued, |_| Ok(()))
    }
}

fn value_to_js(value: &Value) -> EngineResult<JsValue> {
    Ok(convert::value_to_js(value)?)
}

impl Transaction for IdbTxn {
    fn get(&self, key: &str) -> Request<Option<Value>> {
        self.issue("get", self.store.get(&JsValue::from_str(key)), |result| {
            Ok(convert::js_to_value(&result)?)
        })
    }

    fn get_all(&self) -> Request<Vec<(String, Value)>> {
        // Both requests run in the same transaction, so they see one snapshot
        let keys = self.issue("getAllKeys", self.store.get_all_keys(), |result| {
            Ok(convert::js_to_keys(&result)?)
        });
        let values = self.issue("getAll", self.store.get_all(), |result| {
            Ok(convert::js_to_values(&result)?)
        });

        async move {
            let (keys, values) = future::try_join(keys, values).await?;
            if keys.len() != values.len() {
                return Err(EngineError::Request(format!(
                    "getAllKeys returned {} keys but getAll returned {} values",
                    keys.len(),
                    values.len()
                )));
            }
            Ok(keys.into_iter().zip(values).collect())
        }
        .boxed_local()
    }

    fn put(&self, key: &str, value: &Value) -> Request<()> {
        let value = match value_to_js(value) {
            Ok(value) => value,
            Err(e) => return future::ready(Err(e)).boxed_local(),
        };
        self.write("put", self.store.put_with_key(&value, &JsValue::from_str(key)))
    }

    fn insert_unique(&self, key: &str, value: &Value) -> Request<()> {
        let value = match value_to_js(value) {
            Ok(value) => value,
            Err(e) => return future::ready(Err(e)).boxed_local(),
        };
        let request = self.write("add", self.store.add_with_key(&value, &JsValue::from_str(key)));

        let key = key.to_string();
        async move {
            request.await.map_err(|e| match e {
                EngineError::Constraint(_) => EngineError::Constraint(key),
                other => other,
            })
        }
        .boxed_local()
    }

    fn delete(&self, key: &str) -> Request<()> {
        self.write("delete", self.store.delete(&JsValue::from_str(key)))
    }

    fn clear(&self) -> Request<()> {
        self.write("clear", self.store.clear())
    }

    fn count(&self) -> Request<usize> {
        self.issue("count", self.store.count(), |result| {
            result
                .as_f64()
                .map(|n| n as usize)
                .ok_or_else(|| EngineError::Request("count result is not a number".into()))
        })
    }

    fn commit(self: Box<Self>) -> Request<()> {
        self.done
    }
}
