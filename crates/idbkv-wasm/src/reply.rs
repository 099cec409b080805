//! Result delivery to JavaScript
//!
//! A call with a function as its last argument reports through that
//! function as `callback(err, value)`, with `err === null` on success.
//! Otherwise the call returns a `Promise`. When there is neither a callback
//! nor a global `Promise`, the call throws `NoCallbackNoPromiseError`.

use idbkv_core::logging::prefix;
use idbkv_core::{KvError, KvResult};
use js_sys::{Function, Promise};
use tracing::warn;
use wasm_bindgen::{JsCast, JsValue};

/// Convert a store error into a JS `Error` whose `name` is the error kind.
pub(crate) fn to_js_error(err: &KvError) -> JsValue {
    let error = js_sys::Error::new(&err.to_string());
    error.set_name(err.kind());
    error.into()
}

/// Whether the global scope has a `Promise` constructor.
pub(crate) fn promise_supported() -> bool {
    js_sys::Reflect::get(&js_sys::global(), &"Promise".into())
        .map(|p| p.is_function())
        .unwrap_or(false)
}

pub(crate) enum Reply {
    Callback(Function),
    Promise { resolve: Function, reject: Function },
}

impl Reply {
    /// Choose how one call reports back. The second value is what the
    /// method returns to JS: the promise, or `undefined` in callback mode.
    pub(crate) fn new(callback: JsValue) -> Result<(Self, JsValue), JsValue> {
        if let Some(callback) = callback.dyn_ref::<Function>() {
            return Ok((Reply::Callback(callback.clone()), JsValue::UNDEFINED));
        }
        if !promise_supported() {
            return Err(to_js_error(&KvError::NoPromise));
        }

        let mut settle = None;
        let promise = Promise::new(&mut |resolve, reject| settle = Some((resolve, reject)));
        let (resolve, reject) =
            settle.ok_or_else(|| JsValue::from_str("Promise executor was not called"))?;
        Ok((Reply::Promise { resolve, reject }, promise.into()))
    }

    /// Deliver `result`, encoding a success with `encode`.
    pub(crate) fn finish<T>(
        self,
        result: KvResult<T>,
        encode: impl FnOnce(T) -> Result<JsValue, JsValue>,
    ) {
        let outcome = result.map_err(|e| to_js_error(&e)).and_then(encode);
        let delivered = match (self, outcome) {
            (Reply::Callback(callback), Ok(value)) => {
                callback.call2(&JsValue::UNDEFINED, &JsValue::NULL, &value)
            }
            (Reply::Callback(callback), Err(err)) => callback.call1(&JsValue::UNDEFINED, &err),
            (Reply::Promise { resolve, .. }, Ok(value)) => {
                resolve.call1(&JsValue::UNDEFINED, &value)
            }
            (Reply::Promise { reject, .. }, Err(err)) => reject.call1(&JsValue::UNDEFINED, &err),
        };
        if let Err(e) = delivered {
            warn!("{} callback threw: {:?}", prefix::DB, e);
        }
    }
}
