//! Low-level IndexedDB helpers using web-sys
//!
//! Wraps the callback-based IndexedDB API into Rust futures using
//! `wasm_bindgen_futures::JsFuture` and `js_sys::Promise`. Every helper
//! attaches its handlers before returning, so a request or transaction that
//! settles before the future is first polled is never missed.

use std::cell::RefCell;
use std::future::Future;
use std::rc::Rc;

use idbkv_core::logging::prefix;
use js_sys::Promise;
use tracing::{debug, error};
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::JsFuture;
use web_sys::{
    IdbDatabase, IdbFactory, IdbObjectStore, IdbOpenDbRequest, IdbRequest, IdbTransaction,
    IdbTransactionMode, IdbVersionChangeEvent,
};

use crate::error::{describe, IndexedDbError, Result};

/// Event handler pair kept alive until one of them fires
type ClosurePair = (
    Closure<dyn FnMut(web_sys::Event)>,
    Closure<dyn FnMut(web_sys::Event)>,
);

/// Get the global IndexedDB factory.
pub fn idb_factory() -> Result<IdbFactory> {
    let global = js_sys::global();

    let idb: JsValue = js_sys::Reflect::get(&global, &"indexedDB".into())
        .map_err(|_| IndexedDbError::NotAvailable("no indexedDB on global".into()))?;

    if idb.is_undefined() || idb.is_null() {
        return Err(IndexedDbError::NotAvailable(
            "indexedDB is null/undefined".into(),
        ));
    }

    idb.dyn_into::<IdbFactory>()
        .map_err(|_| IndexedDbError::NotAvailable("indexedDB is not IdbFactory".into()))
}

/// Convert an IdbRequest into a JS Promise that resolves with the request's
/// result, or rejects with the request's `DOMException`.
fn request_to_promise(req: &IdbRequest) -> Promise {
    let req = req.clone();

    Promise::new(&mut move |resolve, reject| {
        let closures: Rc<RefCell<Option<ClosurePair>>> = Rc::new(RefCell::new(None));

        let req_s = req.clone();
        let closures_for_success = closures.clone();
        let on_success = Closure::wrap(Box::new(move |_event: web_sys::Event| {
            let result = req_s.result().unwrap_or(JsValue::UNDEFINED);
            let _ = resolve.call1(&JsValue::UNDEFINED, &result);
            *closures_for_success.borrow_mut() = None;
        }) as Box<dyn FnMut(web_sys::Event)>);

        let req_e = req.clone();
        let closures_for_error = closures.clone();
        let on_error = Closure::wrap(Box::new(move |_event: web_sys::Event| {
            let err = match req_e.error() {
                Ok(Some(e)) => JsValue::from(e),
                _ => JsValue::from_str("unknown IDB error"),
            };
            let _ = reject.call1(&JsValue::UNDEFINED, &err);
            *closures_for_error.borrow_mut() = None;
        }) as Box<dyn FnMut(web_sys::Event)>);

        req.set_onsuccess(Some(on_success.as_ref().unchecked_ref()));
        req.set_onerror(Some(on_error.as_ref().unchecked_ref()));

        *closures.borrow_mut() = Some((on_success, on_error));
    })
}

/// Convert an IdbTransaction's completion into a JS Promise.
///
/// Rejects on `error` and on `abort`, whichever comes first.
fn transaction_to_promise(tx: &IdbTransaction) -> Promise {
    let tx = tx.clone();

    Promise::new(&mut move |resolve, reject| {
        let closures: Rc<RefCell<Option<ClosurePair>>> = Rc::new(RefCell::new(None));

        let closures_for_complete = closures.clone();
        let on_complete = Closure::wrap(Box::new(move |_event: web_sys::Event| {
            let _ = resolve.call0(&JsValue::UNDEFINED);
            *closures_for_complete.borrow_mut() = None;
        }) as Box<dyn FnMut(web_sys::Event)>);

        let tx_e = tx.clone();
        let closures_for_error = closures.clone();
        let on_failure = Closure::wrap(Box::new(move |_event: web_sys::Event| {
            let msg = tx_e
                .error()
                .map(|e| JsValue::from(e.message()))
                .unwrap_or_else(|| JsValue::from_str("transaction aborted"));
            let _ = reject.call1(&JsValue::UNDEFINED, &msg);
            *closures_for_error.borrow_mut() = None;
        }) as Box<dyn FnMut(web_sys::Event)>);

        tx.set_oncomplete(Some(on_complete.as_ref().unchecked_ref()));
        tx.set_onerror(Some(on_failure.as_ref().unchecked_ref()));
        tx.set_onabort(Some(on_failure.as_ref().unchecked_ref()));

        *closures.borrow_mut() = Some((on_complete, on_failure));
    })
}

/// Create the key-value object store during `upgradeneeded` if it is missing.
///
/// Records use out-of-line keys: the key is passed alongside each value.
fn create_object_store(event: &IdbVersionChangeEvent, store_name: &str) -> Result<()> {
    let target = event
        .target()
        .ok_or_else(|| IndexedDbError::Open("upgrade event has no target".into()))?;
    let req: IdbOpenDbRequest = target.unchecked_into();
    let db: IdbDatabase = req
        .result()
        .map_err(|e| IndexedDbError::Open(describe(&e)))?
        .unchecked_into();

    if !db.object_store_names().contains(store_name) {
        db.create_object_store(store_name)
            .map_err(|e| IndexedDbError::Open(describe(&e)))?;
        debug!("{} created object store '{}'", prefix::DB, store_name);
    }
    Ok(())
}

/// Issue an open (or create) request for `db_name` at `version`.
///
/// The request is sent before this returns; the future resolves with the
/// connection once the open succeeds. Object stores are only created during
/// an upgrade: if the database already exists at `version` without
/// `store_name`, the open fails with [`IndexedDbError::Open`].
pub fn open_database(
    db_name: &str,
    store_name: &str,
    version: u32,
) -> Result<impl Future<Output = Result<IdbDatabase>>> {
    let factory = idb_factory()?;

    let open_req: IdbOpenDbRequest = factory
        .open_with_u32(db_name, version)
        .map_err(|e| IndexedDbError::Open(describe(&e)))?;

    let wanted = store_name.to_string();
    let db_label = db_name.to_string();
    let store_name = store_name.to_string();
    let on_upgrade = Closure::wrap(Box::new(move |event: IdbVersionChangeEvent| {
        if let Err(e) = create_object_store(&event, &store_name) {
            error!("{} upgrade failed: {}", prefix::DB, e);
        }
    }) as Box<dyn FnMut(IdbVersionChangeEvent)>);
    open_req.set_onupgradeneeded(Some(on_upgrade.as_ref().unchecked_ref()));

    let opened = JsFuture::from(request_to_promise(open_req.unchecked_ref()));

    Ok(async move {
        let result = opened
            .await
            .map_err(|e| IndexedDbError::Open(describe(&e)));

        // The upgrade closure must outlive the open request
        open_req.set_onupgradeneeded(None);
        drop(on_upgrade);

        let db = result?
            .dyn_into::<IdbDatabase>()
            .map_err(|_| IndexedDbError::Open("result is not IdbDatabase".into()))?;

        if !db.object_store_names().contains(&wanted) {
            let found = db.version();
            db.close();
            return Err(IndexedDbError::Open(format!(
                "object store '{}' does not exist in '{}' at version {}; open with a higher version to create it",
                wanted, db_label, found
            )));
        }
        Ok(db)
    })
}

/// Start a transaction on the named object store.
pub fn begin_transaction(
    db: &IdbDatabase,
    store_name: &str,
    mode: IdbTransactionMode,
) -> Result<(IdbTransaction, IdbObjectStore)> {
    let tx = db
        .transaction_with_str_and_mode(store_name, mode)
        .map_err(|e| IndexedDbError::Transaction(describe(&e)))?;
    let store = tx
        .object_store(store_name)
        .map_err(|e| IndexedDbError::Transaction(describe(&e)))?;
    Ok((tx, store))
}

/// Watch an already-issued request; resolves to its result JsValue.
pub fn watch_request(req: &IdbRequest) -> impl Future<Output = Result<JsValue>> {
    let pending = JsFuture::from(request_to_promise(req));
    async move { pending.await.map_err(IndexedDbError::from_request) }
}

/// Watch a transaction; resolves once it completes.
pub fn watch_transaction(tx: &IdbTransaction) -> impl Future<Output = Result<()>> {
    let pending = JsFuture::from(transaction_to_promise(tx));
    async move {
        pending
            .await
            .map_err(|e| IndexedDbError::Transaction(describe(&e)))?;
        Ok(())
    }
}

/// Delete an IndexedDB database by name.
pub async fn delete_database(db_name: &str) -> Result<()> {
    let factory = idb_factory()?;
    let req = factory
        .delete_database(db_name)
        .map_err(|e| IndexedDbError::Open(format!("delete db: {}", describe(&e))))?;
    JsFuture::from(request_to_promise(req.unchecked_ref()))
        .await
        .map_err(|e| IndexedDbError::Open(format!("delete db: {}", describe(&e))))?;
    Ok(())
}
