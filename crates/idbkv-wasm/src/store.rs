//! `IdbKvStore`: the JavaScript-facing store class
//!
//! Every data method takes an optional trailing callback. Arguments are
//! checked synchronously; storage results arrive through the callback or
//! the returned promise.

use futures::StreamExt;
use idbkv_core::logging::prefix;
use idbkv_core::{EngineError, KvError, KvResult, KvStore, StoreConfig};
use idbkv_indexeddb::{convert, BrowserSpawner, IndexedDbEngine};
use js_sys::{Array, Function};
use serde_json::Value;
use tracing::warn;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;

use crate::reply::{to_js_error, Reply};

/// Key-value store over one IndexedDB database.
///
/// ```js
/// const store = new IdbKvStore('settings')
/// store.set('theme', 'dark', (err) => { ... })
/// const theme = await store.get('theme')
/// ```
#[wasm_bindgen]
pub struct IdbKvStore {
    store: KvStore,
}

#[wasm_bindgen]
impl IdbKvStore {
    /// Open (or create) the store named `name`.
    ///
    /// Throws `ConstructionError` unless `name` is a non-empty string.
    /// `onReady`, if a function, is called as `onReady(err)` once the open
    /// completes or fails.
    #[wasm_bindgen(constructor)]
    pub fn new(name: JsValue, on_ready: JsValue) -> Result<IdbKvStore, JsValue> {
        // Route Rust panics to console.error instead of "RuntimeError: unreachable"
        console_error_panic_hook::set_once();

        let name = name.as_string().ok_or_else(|| {
            to_js_error(&KvError::Construction(
                "a string store name must be supplied".into(),
            ))
        })?;
        let config = StoreConfig::new(name);
        let engine = IndexedDbEngine::new();

        let store = match on_ready.dyn_into::<Function>() {
            Ok(on_ready) => {
                KvStore::open_with(config, &engine, BrowserSpawner, move |result| {
                    let err = match result {
                        Ok(()) => JsValue::NULL,
                        Err(e) => to_js_error(&e),
                    };
                    if let Err(e) = on_ready.call1(&JsValue::UNDEFINED, &err) {
                        warn!("{} onReady threw: {:?}", prefix::OPEN, e);
                    }
                })
            }
            Err(_) => KvStore::open(config, &engine, BrowserSpawner),
        }
        .map_err(|e| to_js_error(&e))?;

        Ok(Self { store })
    }

    /// Whether the browser exposes IndexedDB.
    #[wasm_bindgen(getter = INDEXEDDB_SUPPORT)]
    pub fn indexeddb_support() -> bool {
        idbkv_indexeddb::indexeddb_supported()
    }

    /// Delete a database by name. Close open stores on it first.
    #[wasm_bindgen(js_name = deleteDatabase)]
    pub async fn delete_database(name: String) -> Result<(), JsValue> {
        idbkv_indexeddb::delete_database(&name)
            .await
            .map_err(|e| to_js_error(&KvError::from(EngineError::from(e))))
    }

    #[wasm_bindgen(getter)]
    pub fn name(&self) -> String {
        self.store.name().to_string()
    }

    #[wasm_bindgen(getter = isOpen)]
    pub fn is_open(&self) -> bool {
        self.store.is_open()
    }

    /// Resolves (or calls back) once the store is open.
    pub fn ready(&self, callback: JsValue) -> Result<JsValue, JsValue> {
        let pending = self.store.ready().map_err(|e| to_js_error(&e))?;
        let (reply, ret) = Reply::new(callback)?;
        wasm_bindgen_futures::spawn_local(async move { reply.finish(pending.await, unit) });
        Ok(ret)
    }

    /// `get(key)` yields the value or `undefined`; `get([k1, k2])` yields
    /// an array in the same order with `undefined` for missing keys.
    pub fn get(&self, key: JsValue, callback: JsValue) -> Result<JsValue, JsValue> {
        self.store.usable().map_err(|e| to_js_error(&e))?;

        if Array::is_array(&key) {
            let keys = keys_from_js(&key)?;
            let (reply, ret) = Reply::new(callback)?;
            return self.dispatch(
                ret,
                self.store.get_many_with(keys, move |result| {
                    reply.finish(result, |values| {
                        let array = Array::new();
                        for value in values {
                            array.push(&optional_to_js(value)?);
                        }
                        Ok(array.into())
                    })
                }),
            );
        }

        let key = key_from_js(&key)?;
        let (reply, ret) = Reply::new(callback)?;
        self.dispatch(
            ret,
            self.store
                .get_with(&key, move |result| reply.finish(result, optional_to_js)),
        )
    }

    /// Insert or overwrite `key`.
    pub fn set(&self, key: JsValue, value: JsValue, callback: JsValue) -> Result<JsValue, JsValue> {
        self.store.usable().map_err(|e| to_js_error(&e))?;
        let key = key_from_js(&key)?;
        let value = value_from_js(&value)?;
        let (reply, ret) = Reply::new(callback)?;
        self.dispatch(
            ret,
            self.store
                .set_with(&key, value, move |result| reply.finish(result, unit)),
        )
    }

    /// Insert `key` only if absent; fails with `DuplicateKeyError` otherwise.
    pub fn add(&self, key: JsValue, value: JsValue, callback: JsValue) -> Result<JsValue, JsValue> {
        self.store.usable().map_err(|e| to_js_error(&e))?;
        let key = key_from_js(&key)?;
        let value = value_from_js(&value)?;
        let (reply, ret) = Reply::new(callback)?;
        self.dispatch(
            ret,
            self.store
                .add_with(&key, value, move |result| reply.finish(result, unit)),
        )
    }

    pub fn remove(&self, key: JsValue, callback: JsValue) -> Result<JsValue, JsValue> {
        self.store.usable().map_err(|e| to_js_error(&e))?;
        let key = key_from_js(&key)?;
        let (reply, ret) = Reply::new(callback)?;
        self.dispatch(
            ret,
            self.store
                .remove_with(&key, move |result| reply.finish(result, unit)),
        )
    }

    pub fn clear(&self, callback: JsValue) -> Result<JsValue, JsValue> {
        self.store.usable().map_err(|e| to_js_error(&e))?;
        let (reply, ret) = Reply::new(callback)?;
        self.dispatch(
            ret,
            self.store
                .clear_with(move |result| reply.finish(result, unit)),
        )
    }

    pub fn count(&self, callback: JsValue) -> Result<JsValue, JsValue> {
        self.store.usable().map_err(|e| to_js_error(&e))?;
        let (reply, ret) = Reply::new(callback)?;
        self.dispatch(
            ret,
            self.store.count_with(move |result| {
                reply.finish(result, |n| Ok(JsValue::from_f64(n as f64)))
            }),
        )
    }

    pub fn keys(&self, callback: JsValue) -> Result<JsValue, JsValue> {
        self.store.usable().map_err(|e| to_js_error(&e))?;
        let (reply, ret) = Reply::new(callback)?;
        self.dispatch(
            ret,
            self.store.keys_with(move |result| {
                reply.finish(result, |keys| {
                    Ok(keys
                        .iter()
                        .map(|k| JsValue::from_str(k))
                        .collect::<Array>()
                        .into())
                })
            }),
        )
    }

    pub fn values(&self, callback: JsValue) -> Result<JsValue, JsValue> {
        self.store.usable().map_err(|e| to_js_error(&e))?;
        let (reply, ret) = Reply::new(callback)?;
        self.dispatch(
            ret,
            self.store.values_with(move |result| {
                reply.finish(result, |values| value_to_js(&Value::Array(values)))
            }),
        )
    }

    /// Every record as a plain object mapping key to value.
    pub fn json(&self, callback: JsValue) -> Result<JsValue, JsValue> {
        self.store.usable().map_err(|e| to_js_error(&e))?;
        let (reply, ret) = Reply::new(callback)?;
        self.dispatch(
            ret,
            self.store.json_with(move |result| {
                reply.finish(result, |map| value_to_js(&Value::Object(map)))
            }),
        )
    }

    /// Call `listener(change)` for every committed write made through this
    /// handle. `change` is `{type, key?, value?}` with `type` one of
    /// `set`, `add`, `remove`, `clear`.
    #[wasm_bindgen(js_name = onChange)]
    pub fn on_change(&self, listener: Function) {
        let mut changes = self.store.subscribe();
        wasm_bindgen_futures::spawn_local(async move {
            while let Some(change) = changes.next().await {
                let event = serde_json::to_value(&change)
                    .map_err(|e| JsValue::from_str(&e.to_string()))
                    .and_then(|v| value_to_js(&v));
                let delivered = event.and_then(|e| listener.call1(&JsValue::UNDEFINED, &e));
                if let Err(e) = delivered {
                    warn!("{} change listener failed: {:?}", prefix::DB, e);
                }
            }
        });
    }

    /// Close the store. Later calls throw `ClosedHandleError`.
    pub fn close(&self) {
        self.store.close();
    }
}

impl IdbKvStore {
    /// Hand `ret` back to JS, or throw if the store refused the call.
    fn dispatch(&self, ret: JsValue, submitted: KvResult<()>) -> Result<JsValue, JsValue> {
        submitted.map_err(|e| to_js_error(&e))?;
        Ok(ret)
    }
}

fn key_from_js(key: &JsValue) -> Result<String, JsValue> {
    key.as_string()
        .ok_or_else(|| js_sys::TypeError::new("key must be a string").into())
}

fn keys_from_js(keys: &JsValue) -> Result<Vec<String>, JsValue> {
    Array::from(keys).iter().map(|k| key_from_js(&k)).collect()
}

/// `undefined` is stored as `null`. Values JSON cannot carry unchanged are a
/// `TypeError`.
fn value_from_js(value: &JsValue) -> Result<Value, JsValue> {
    if value.is_undefined() {
        return Ok(Value::Null);
    }
    convert::plain_js_to_value(value)
        .map_err(|e| js_sys::TypeError::new(&format!("value is not storable: {}", e)).into())
}

fn value_to_js(value: &Value) -> Result<JsValue, JsValue> {
    convert::value_to_js(value).map_err(|e| to_js_error(&KvError::from(EngineError::from(e))))
}

fn optional_to_js(value: Option<Value>) -> Result<JsValue, JsValue> {
    match value {
        Some(value) => value_to_js(&value),
        None => Ok(JsValue::UNDEFINED),
    }
}

fn unit(_: ()) -> Result<JsValue, JsValue> {
    Ok(JsValue::UNDEFINED)
}
