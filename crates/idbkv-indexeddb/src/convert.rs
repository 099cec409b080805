//! Conversion between `serde_json::Value` and structured-clonable JS values
//!
//! Values cross the boundary as JSON text, so anything a `Value` can hold is
//! stored as the equivalent plain JS object, array or primitive.

use js_sys::{Array, Object, Reflect};
use serde_json::Value;
use wasm_bindgen::{JsCast, JsValue};

use crate::error::{describe, IndexedDbError, Result};

/// Convert a value into the JS form stored by IndexedDB.
pub fn value_to_js(value: &Value) -> Result<JsValue> {
    let text = serde_json::to_string(value)?;
    js_sys::JSON::parse(&text).map_err(|e| IndexedDbError::JsValue(describe(&e)))
}

/// Convert a stored JS value back. `undefined` (no record) maps to `None`.
pub fn js_to_value(value: &JsValue) -> Result<Option<Value>> {
    if value.is_undefined() {
        return Ok(None);
    }
    let text = js_sys::JSON::stringify(value)
        .map_err(|e| IndexedDbError::JsValue(describe(&e)))?;
    let text = text
        .as_string()
        .ok_or_else(|| IndexedDbError::JsValue("value has no JSON form".into()))?;
    Ok(Some(serde_json::from_str(&text)?))
}

/// Convert a caller-supplied JS value for storage.
///
/// Only values that survive the JSON crossing unchanged are accepted: `null`,
/// booleans, strings, finite numbers, arrays and plain objects made of those.
/// Anything else (`Date`, typed arrays, `Map`, `NaN`, nested `undefined`, ...)
/// is an error rather than a silently altered record.
pub fn plain_js_to_value(value: &JsValue) -> Result<Value> {
    check_plain(value, "value")?;
    js_to_value(value)?.ok_or_else(|| IndexedDbError::JsValue("value is undefined".into()))
}

fn check_plain(value: &JsValue, path: &str) -> Result<()> {
    if value.is_null() || value.as_bool().is_some() || value.is_string() {
        return Ok(());
    }
    if let Some(n) = value.as_f64() {
        if n.is_finite() {
            return Ok(());
        }
        return Err(IndexedDbError::JsValue(format!("{} is not a finite number", path)));
    }
    if Array::is_array(value) {
        for (i, item) in Array::from(value).iter().enumerate() {
            check_plain(&item, &format!("{}[{}]", path, i))?;
        }
        return Ok(());
    }
    if value.is_object() && is_plain_object(value) {
        let object: &Object = value.unchecked_ref();
        for key in Object::keys(object).iter() {
            let name = key.as_string().unwrap_or_default();
            let item = Reflect::get(object, &key).map_err(|e| IndexedDbError::JsValue(describe(&e)))?;
            check_plain(&item, &format!("{}.{}", path, name))?;
        }
        return Ok(());
    }
    Err(IndexedDbError::JsValue(format!(
        "{} is not a plain JSON value: {}",
        path,
        type_name(value)
    )))
}

/// Object literal or `Object.create(null)`.
fn is_plain_object(value: &JsValue) -> bool {
    let proto = Object::get_prototype_of(value);
    if proto.is_null() {
        return true;
    }
    let object_proto = Object::get_prototype_of(&Object::new());
    JsValue::from(proto) == JsValue::from(object_proto)
}

fn type_name(value: &JsValue) -> String {
    if value.is_undefined() {
        return "undefined".into();
    }
    if value.is_object() {
        let constructor = Reflect::get(value, &"constructor".into())
            .ok()
            .and_then(|c| Reflect::get(&c, &"name".into()).ok())
            .and_then(|n| n.as_string());
        if let Some(name) = constructor {
            return name;
        }
    }
    value.js_typeof().as_string().unwrap_or_default()
}

/// Convert the result of `getAllKeys` into string keys.
pub fn js_to_keys(keys: &JsValue) -> Result<Vec<String>> {
    let array = js_sys::Array::from(keys);
    let mut out = Vec::with_capacity(array.length() as usize);
    for i in 0..array.length() {
        let key = array.get(i);
        let key = key
            .as_string()
            .ok_or_else(|| IndexedDbError::JsValue(format!("non-string key {}", describe(&key))))?;
        out.push(key);
    }
    Ok(out)
}

/// Convert the result of `getAll` into values.
pub fn js_to_values(values: &JsValue) -> Result<Vec<Value>> {
    let array = js_sys::Array::from(values);
    let mut out = Vec::with_capacity(array.length() as usize);
    for i in 0..array.length() {
        out.push(js_to_value(&array.get(i))?.unwrap_or(Value::Null));
    }
    Ok(out)
}
