//! Verb tests for KvStore over the in-memory engine

use std::cell::RefCell;
use std::rc::Rc;

use futures::executor::LocalPool;
use idbkv_core::{KvError, KvResult, KvStore, Lifecycle, MemoryEngine, StoreConfig};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};

/// Helper to open a fresh store on its own engine
fn create_store(pool: &LocalPool) -> KvStore {
    idbkv_core::logging::init_with_filter("debug");
    KvStore::open(StoreConfig::new("test"), &MemoryEngine::new(), pool.spawner()).unwrap()
}

/// Helper collecting callback results
fn capture<T: 'static>() -> (Rc<RefCell<Vec<KvResult<T>>>>, impl FnOnce(KvResult<T>) + 'static) {
    let seen = Rc::new(RefCell::new(Vec::new()));
    let seen_cb = seen.clone();
    (seen, move |result| seen_cb.borrow_mut().push(result))
}

#[test]
fn test_set_and_get_before_ready() {
    let mut pool = LocalPool::new();
    let store = create_store(&pool);
    assert_eq!(store.state(), Lifecycle::Opening);

    let set = store.set("abc", "def").unwrap();
    let get = store.get("abc").unwrap();

    pool.run_until(set).unwrap();
    assert_eq!(pool.run_until(get).unwrap(), Some(json!("def")));
}

#[test]
fn test_set_and_get_after_ready() {
    let mut pool = LocalPool::new();
    let (ready, on_ready) = capture::<()>();
    let store = KvStore::open_with(
        StoreConfig::new("test"),
        &MemoryEngine::new(),
        pool.spawner(),
        on_ready,
    )
    .unwrap();

    pool.run_until_stalled();
    assert_eq!(*ready.borrow(), vec![Ok(())]);
    assert!(store.is_open());

    pool.run_until(store.set("abc", "def").unwrap()).unwrap();
    assert_eq!(
        pool.run_until(store.get("abc").unwrap()).unwrap(),
        Some(json!("def"))
    );
}

#[test]
fn test_set_and_get_object() {
    let mut pool = LocalPool::new();
    let store = create_store(&pool);
    let value = json!({"somekey": "someval", "nested": [1, {"deep": true}]});

    pool.run_until(store.set("abc", value.clone()).unwrap()).unwrap();
    assert_eq!(pool.run_until(store.get("abc").unwrap()).unwrap(), Some(value));
}

#[test]
fn test_get_missing_key() {
    let mut pool = LocalPool::new();
    let store = create_store(&pool);

    assert_eq!(pool.run_until(store.get("badkey").unwrap()).unwrap(), None);
}

#[test]
fn test_get_many_preserves_order() {
    let mut pool = LocalPool::new();
    let store = create_store(&pool);

    let _ = store.set("a", 1).unwrap();
    let _ = store.set("b", 2).unwrap();
    let values = pool
        .run_until(store.get_many(["b", "nope", "a"]).unwrap())
        .unwrap();

    assert_eq!(values, vec![Some(json!(2)), None, Some(json!(1))]);
}

#[test]
fn test_add_existing_key_fails() {
    let mut pool = LocalPool::new();
    let store = create_store(&pool);

    pool.run_until(store.add("abc", "def").unwrap()).unwrap();
    let second = pool.run_until(store.add("abc", "other").unwrap());

    assert_eq!(second, Err(KvError::DuplicateKey("abc".into())));
    assert_eq!(
        pool.run_until(store.get("abc").unwrap()).unwrap(),
        Some(json!("def"))
    );
}

#[test]
fn test_set_overwrites_existing_key() {
    let mut pool = LocalPool::new();
    let store = create_store(&pool);

    let _ = store.set("abc", "one").unwrap();
    pool.run_until(store.set("abc", "two").unwrap()).unwrap();

    assert_eq!(
        pool.run_until(store.get("abc").unwrap()).unwrap(),
        Some(json!("two"))
    );
    assert_eq!(pool.run_until(store.count().unwrap()).unwrap(), 1);
}

#[test]
fn test_remove() {
    let mut pool = LocalPool::new();
    let store = create_store(&pool);

    // Removing an absent key is not an error
    pool.run_until(store.remove("abc").unwrap()).unwrap();

    pool.run_until(store.set("abc", "def").unwrap()).unwrap();
    pool.run_until(store.remove("abc").unwrap()).unwrap();
    assert_eq!(pool.run_until(store.get("abc").unwrap()).unwrap(), None);
}

#[test]
fn test_clear() {
    let mut pool = LocalPool::new();
    let store = create_store(&pool);

    pool.run_until(store.clear().unwrap()).unwrap();
    let _ = store.set("a", 1).unwrap();
    let _ = store.set("b", 2).unwrap();
    pool.run_until(store.clear().unwrap()).unwrap();

    assert_eq!(pool.run_until(store.count().unwrap()).unwrap(), 0);
    assert_eq!(pool.run_until(store.get("a").unwrap()).unwrap(), None);
}

#[test]
fn test_count_tracks_distinct_keys() {
    let mut pool = LocalPool::new();
    let store = create_store(&pool);

    assert_eq!(pool.run_until(store.count().unwrap()).unwrap(), 0);
    let _ = store.set("a", 1).unwrap();
    let _ = store.set("b", 2).unwrap();
    let _ = store.set("a", 3).unwrap();
    assert_eq!(pool.run_until(store.count().unwrap()).unwrap(), 2);
}

#[test]
fn test_keys_and_json() {
    let mut pool = LocalPool::new();
    let store = create_store(&pool);

    assert!(pool.run_until(store.keys().unwrap()).unwrap().is_empty());
    assert!(pool.run_until(store.json().unwrap()).unwrap().is_empty());

    pool.run_until(store.set("abc", "def").unwrap()).unwrap();

    assert_eq!(pool.run_until(store.keys().unwrap()).unwrap(), vec!["abc"]);
    assert_eq!(
        Value::Object(pool.run_until(store.json().unwrap()).unwrap()),
        json!({"abc": "def"})
    );
    assert_eq!(
        pool.run_until(store.values().unwrap()).unwrap(),
        vec![json!("def")]
    );
}

#[test]
fn test_construction_requires_name() {
    let pool = LocalPool::new();
    let engine = MemoryEngine::new();

    let result = KvStore::open(StoreConfig::new(""), &engine, pool.spawner());
    assert!(matches!(result, Err(KvError::Construction(_))));

    let result = KvStore::open(StoreConfig::default(), &engine, pool.spawner());
    assert!(matches!(result, Err(KvError::Construction(_))));
}

#[test]
fn test_closed_store_fails_synchronously() {
    let mut pool = LocalPool::new();
    let store = create_store(&pool);
    pool.run_until(store.ready().unwrap()).unwrap();

    store.close();
    assert_eq!(store.state(), Lifecycle::Closed);
    assert_eq!(store.get("abc").unwrap_err(), KvError::Closed);
    assert_eq!(store.set("abc", "def").unwrap_err(), KvError::Closed);

    let (seen, callback) = capture::<Option<Value>>();
    assert_eq!(store.get_with("abc", callback), Err(KvError::Closed));
    pool.run_until_stalled();
    assert!(seen.borrow().is_empty());
}

#[test]
fn test_reopen_sees_earlier_records() {
    let mut pool = LocalPool::new();
    let engine = MemoryEngine::new();

    let first = KvStore::open(StoreConfig::new("shared"), &engine, pool.spawner()).unwrap();
    pool.run_until(first.set("abc", "def").unwrap()).unwrap();
    first.close();

    let second = KvStore::open(StoreConfig::new("shared"), &engine, pool.spawner()).unwrap();
    assert_eq!(
        pool.run_until(second.get("abc").unwrap()).unwrap(),
        Some(json!("def"))
    );
    assert_eq!(engine.records("shared", "kv"), vec![("abc".to_string(), json!("def"))]);
}

#[test]
fn test_callback_and_promise_modes_agree() {
    // Promise mode
    let mut pool = LocalPool::new();
    let store = create_store(&pool);
    let mut promised: Vec<String> = Vec::new();
    promised.push(format!("{:?}", pool.run_until(store.set("a", 1).unwrap())));
    promised.push(format!("{:?}", pool.run_until(store.get("a").unwrap())));
    promised.push(format!("{:?}", pool.run_until(store.json().unwrap())));
    promised.push(format!("{:?}", pool.run_until(store.remove("a").unwrap())));
    promised.push(format!("{:?}", pool.run_until(store.clear().unwrap())));
    promised.push(format!("{:?}", pool.run_until(store.add("b", 2).unwrap())));
    promised.push(format!("{:?}", pool.run_until(store.add("b", 3).unwrap())));
    promised.push(format!("{:?}", pool.run_until(store.count().unwrap())));
    promised.push(format!("{:?}", pool.run_until(store.keys().unwrap())));

    // Callback mode, same sequence, each result recorded in its own slot
    let mut pool = LocalPool::new();
    let store = create_store(&pool);
    let slots = Rc::new(RefCell::new(vec![String::new(); promised.len()]));
    let slot = |index: usize| {
        let slots = slots.clone();
        move |result: &dyn std::fmt::Debug| slots.borrow_mut()[index] = format!("{:?}", result)
    };

    let s = slot(0);
    store.set_with("a", 1, move |r| s(&r)).unwrap();
    let s = slot(1);
    store.get_with("a", move |r| s(&r)).unwrap();
    let s = slot(2);
    store.json_with(move |r| s(&r)).unwrap();
    let s = slot(3);
    store.remove_with("a", move |r| s(&r)).unwrap();
    let s = slot(4);
    store.clear_with(move |r| s(&r)).unwrap();
    let s = slot(5);
    store.add_with("b", 2, move |r| s(&r)).unwrap();
    let s = slot(6);
    store.add_with("b", 3, move |r| s(&r)).unwrap();
    let s = slot(7);
    store.count_with(move |r| s(&r)).unwrap();
    let s = slot(8);
    store.keys_with(move |r| s(&r)).unwrap();
    pool.run_until_stalled();

    assert_eq!(*slots.borrow(), promised);
}
