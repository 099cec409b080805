//! Browser tests for the IdbKvStore JS class
//!
//! Run with `wasm-pack test --headless --firefox crates/idbkv-wasm`.

use futures::channel::oneshot;
use idbkv_wasm::IdbKvStore;
use js_sys::{Array, Object, Promise, Reflect};
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::JsFuture;
use wasm_bindgen_test::*;

wasm_bindgen_test_configure!(run_in_browser);

/// Helper to create a store under a random name
fn create_store() -> IdbKvStore {
    let name = format!("{}", (js_sys::Math::random() * 9e16) as u64);
    IdbKvStore::new(JsValue::from_str(&name), JsValue::UNDEFINED).unwrap()
}

/// Await a promise returned by a store method
async fn resolve(returned: Result<JsValue, JsValue>) -> Result<JsValue, JsValue> {
    JsFuture::from(returned?.unchecked_into::<Promise>()).await
}

/// Build a `(err, value)` callback and a receiver for what it gets
fn callback() -> (JsValue, oneshot::Receiver<(JsValue, JsValue)>) {
    let (tx, rx) = oneshot::channel();
    let callback = Closure::once_into_js(move |err: JsValue, value: JsValue| {
        let _ = tx.send((err, value));
    });
    (callback, rx)
}

fn error_name(err: &JsValue) -> String {
    Reflect::get(err, &"name".into())
        .ok()
        .and_then(|n| n.as_string())
        .unwrap_or_default()
}

#[wasm_bindgen_test]
fn test_indexeddb_support_flag() {
    assert!(IdbKvStore::indexeddb_support());
}

#[wasm_bindgen_test]
fn test_construction_errors() {
    let err = IdbKvStore::new(JsValue::UNDEFINED, JsValue::UNDEFINED).err().unwrap();
    assert_eq!(error_name(&err), "ConstructionError");

    let err = IdbKvStore::new(js_sys::Object::new().into(), JsValue::UNDEFINED)
        .err()
        .unwrap();
    assert_eq!(error_name(&err), "ConstructionError");

    let err = IdbKvStore::new(JsValue::from_str(""), JsValue::UNDEFINED)
        .err()
        .unwrap();
    assert_eq!(error_name(&err), "ConstructionError");
}

#[wasm_bindgen_test]
async fn test_callbacks_pre_ready() {
    let store = create_store();

    let (cb, done) = callback();
    store
        .set("abc".into(), "def".into(), cb)
        .unwrap();
    let (err, _) = done.await.unwrap();
    assert!(err.is_null());

    let (cb, done) = callback();
    store.get("abc".into(), cb).unwrap();
    let (err, value) = done.await.unwrap();
    assert!(err.is_null());
    assert_eq!(value.as_string().as_deref(), Some("def"));

    let (cb, done) = callback();
    store.get("badkey".into(), cb).unwrap();
    let (err, value) = done.await.unwrap();
    assert!(err.is_null());
    assert!(value.is_undefined());

    store.close();
}

#[wasm_bindgen_test]
async fn test_ready_callback_fires() {
    let (tx, rx) = oneshot::channel();
    let on_ready = Closure::once_into_js(move |err: JsValue| {
        let _ = tx.send(err);
    });
    let name = format!("{}", (js_sys::Math::random() * 9e16) as u64);
    let store = IdbKvStore::new(JsValue::from_str(&name), on_ready).unwrap();

    assert!(rx.await.unwrap().is_null());
    assert!(store.is_open());
    store.close();
}

#[wasm_bindgen_test]
async fn test_promise_sequence() {
    let store = create_store();
    let u = JsValue::UNDEFINED;

    resolve(store.set("a".into(), 1.into(), u.clone())).await.unwrap();
    let value = resolve(store.get("a".into(), u.clone())).await.unwrap();
    assert_eq!(value.as_f64(), Some(1.0));

    let json = resolve(store.json(u.clone())).await.unwrap();
    assert_eq!(
        js_sys::JSON::stringify(&json).unwrap().as_string().unwrap(),
        r#"{"a":1}"#
    );

    resolve(store.remove("a".into(), u.clone())).await.unwrap();
    resolve(store.clear(u.clone())).await.unwrap();
    resolve(store.add("b".into(), 2.into(), u.clone())).await.unwrap();

    let count = resolve(store.count(u.clone())).await.unwrap();
    assert_eq!(count.as_f64(), Some(1.0));

    let keys = Array::from(&resolve(store.keys(u.clone())).await.unwrap());
    assert_eq!(keys.length(), 1);
    assert_eq!(keys.get(0).as_string().as_deref(), Some("b"));

    let err = resolve(store.add("b".into(), 3.into(), u)).await.unwrap_err();
    assert_eq!(error_name(&err), "DuplicateKeyError");

    store.close();
}

#[wasm_bindgen_test]
async fn test_get_multiple() {
    let store = create_store();
    let u = JsValue::UNDEFINED;

    let _ = store.set("a".into(), 1.into(), u.clone()).unwrap();
    resolve(store.set("b".into(), 2.into(), u.clone())).await.unwrap();

    let keys: JsValue = Array::of3(&"a".into(), &"nope".into(), &"b".into()).into();
    let values = Array::from(&resolve(store.get(keys, u)).await.unwrap());
    assert_eq!(values.length(), 3);
    assert_eq!(values.get(0).as_f64(), Some(1.0));
    assert!(values.get(1).is_undefined());
    assert_eq!(values.get(2).as_f64(), Some(2.0));

    store.close();
}

#[wasm_bindgen_test]
async fn test_closed_store_throws() {
    let store = create_store();
    resolve(store.ready(JsValue::UNDEFINED)).await.unwrap();
    store.close();

    let err = store.get(JsValue::UNDEFINED, JsValue::UNDEFINED).err().unwrap();
    assert_eq!(error_name(&err), "ClosedHandleError");
    let err = store
        .set("abc".into(), "def".into(), JsValue::UNDEFINED)
        .err()
        .unwrap();
    assert_eq!(error_name(&err), "ClosedHandleError");

    // Closing again is harmless
    store.close();
}

#[wasm_bindgen_test]
async fn test_change_listener() {
    let store = create_store();
    let (tx, rx) = oneshot::channel();
    let listener = Closure::once_into_js(move |change: JsValue| {
        let _ = tx.send(change);
    });
    store.on_change(listener.unchecked_into());

    resolve(store.set("abc".into(), "def".into(), JsValue::UNDEFINED))
        .await
        .unwrap();
    let change = rx.await.unwrap();
    assert_eq!(
        js_sys::JSON::stringify(&change).unwrap().as_string().unwrap(),
        r#"{"key":"abc","type":"set","value":"def"}"#
    );

    store.close();
}

#[wasm_bindgen_test]
async fn test_values_json_would_alter_are_rejected() {
    let store = create_store();
    let u = JsValue::UNDEFINED;

    let nested_undefined = Object::new();
    Reflect::set(&nested_undefined, &"a".into(), &JsValue::UNDEFINED).unwrap();
    let rejected: Vec<(&str, JsValue)> = vec![
        ("date", js_sys::Date::new_0().into()),
        ("nan", JsValue::from_f64(f64::NAN)),
        ("infinity", JsValue::from_f64(f64::INFINITY)),
        ("bytes", js_sys::Uint8Array::new_with_length(2).into()),
        ("map", js_sys::Map::new().into()),
        ("nested", nested_undefined.into()),
        ("in-array", Array::of1(&js_sys::Set::new(&u)).into()),
    ];
    for (key, value) in rejected {
        let err = store.set(key.into(), value.clone(), u.clone()).err();
        assert_eq!(err.as_ref().map(error_name).as_deref(), Some("TypeError"), "{}", key);
        let err = store.add(key.into(), value, u.clone()).err();
        assert_eq!(err.as_ref().map(error_name).as_deref(), Some("TypeError"), "{}", key);
    }

    let plain = js_sys::JSON::parse(r#"{"n": 1.5, "list": [true, null, "s"], "o": {}}"#).unwrap();
    resolve(store.set("plain".into(), plain, u.clone())).await.unwrap();
    let keys = Array::from(&resolve(store.keys(u)).await.unwrap());
    assert_eq!(keys.length(), 1);

    store.close();
}

#[wasm_bindgen_test]
fn test_no_callback_and_no_promise_throws() {
    let store = create_store();
    let global: Object = js_sys::global().unchecked_into();
    let promise = Reflect::get(&global, &"Promise".into()).unwrap();

    assert!(Reflect::delete_property(&global, &"Promise".into()).unwrap());
    let without_promise = store.get("a".into(), JsValue::UNDEFINED);
    let (cb, _done) = callback();
    let with_callback = store.get("a".into(), cb);
    Reflect::set(&global, &"Promise".into(), &promise).unwrap();

    assert_eq!(
        error_name(&without_promise.err().unwrap()),
        "NoCallbackNoPromiseError"
    );
    assert!(with_callback.unwrap().is_undefined());
    store.close();
}

#[wasm_bindgen_test]
async fn test_missing_indexeddb_reports_unsupported() {
    let global: Object = js_sys::global().unchecked_into();
    let prop: JsValue = "indexedDB".into();
    let saved = Object::get_own_property_descriptor(&global, &prop);

    let hidden = Object::new();
    Reflect::set(&hidden, &"value".into(), &JsValue::UNDEFINED).unwrap();
    Reflect::set(&hidden, &"configurable".into(), &true.into()).unwrap();
    Object::define_property(&global, &prop, &hidden);

    let (tx, rx) = oneshot::channel();
    let on_ready = Closure::once_into_js(move |err: JsValue| {
        let _ = tx.send(err);
    });
    let name = format!("{}", (js_sys::Math::random() * 9e16) as u64);
    let store = IdbKvStore::new(JsValue::from_str(&name), on_ready);

    if saved.is_undefined() {
        Reflect::delete_property(&global, &prop).unwrap();
    } else {
        Object::define_property(&global, &prop, saved.unchecked_ref());
    }

    let store = store.unwrap();
    assert_eq!(error_name(&rx.await.unwrap()), "UnsupportedEnvironmentError");
    assert!(!store.is_open());
    let err = store.get("a".into(), JsValue::UNDEFINED).err().unwrap();
    assert_eq!(error_name(&err), "UnsupportedEnvironmentError");
}
