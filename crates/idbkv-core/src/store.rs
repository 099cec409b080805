//! Store handle: lifecycle, deferred-ready queue and dual-mode verbs.
//!
//! A [`KvStore`] starts opening its engine connection as soon as it is built.
//! Calls made while the open is in flight are queued in issue order and
//! dispatched in one pass when the connection arrives, before any later call
//! can reach the engine. If the open fails, every queued call receives the
//! open error.
//!
//! Each verb comes in two forms: `verb(..)` returns a [`Pending`] future and
//! `verb_with(.., callback)` hands the result to a callback. Both return
//! `Err` immediately when the handle is closed, without calling back.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::fmt;
use std::mem;
use std::rc::Rc;

use futures::channel::{mpsc, oneshot};
use futures::future::{self, FutureExt, LocalBoxFuture};
use futures::task::{LocalSpawn, LocalSpawnExt};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::adapter::{self, Operation};
use crate::config::StoreConfig;
use crate::engine::{Connection, EngineResult, StorageEngine};
use crate::error::{KvError, KvResult};
use crate::events::{ChangeStream, Notifier};
use crate::logging::prefix;
use crate::sink::{Pending, Sink};

/// Observable lifecycle of a store handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    Opening,
    Open,
    Closed,
}

type ReadyCallback = Box<dyn FnOnce(KvResult<()>)>;
type OpenFuture = LocalBoxFuture<'static, EngineResult<Box<dyn Connection>>>;

/// A call captured before (or at) dispatch.
trait Job {
    /// Issue the call against `conn`; the future completes the caller's sink.
    fn dispatch(self: Box<Self>, conn: &dyn Connection) -> LocalBoxFuture<'static, ()>;

    /// Complete the caller's sink with `err` without touching the engine.
    fn fail(self: Box<Self>, err: KvError);

    /// Drop without completing; the caller gets the error synchronously.
    fn discard(self: Box<Self>);
}

struct Deferred<T, F> {
    start: F,
    sink: Sink<T>,
}

impl<T, F> Job for Deferred<T, F>
where
    T: 'static,
    F: FnOnce(&dyn Connection) -> Operation<T>,
{
    fn dispatch(self: Box<Self>, conn: &dyn Connection) -> LocalBoxFuture<'static, ()> {
        let Deferred { start, sink } = *self;
        let op = start(conn);
        async move { sink.complete(op.await) }.boxed_local()
    }

    fn fail(self: Box<Self>, err: KvError) {
        self.sink.complete(Err(err));
    }

    fn discard(self: Box<Self>) {
        self.sink.discard();
    }
}

enum State {
    Opening { backlog: VecDeque<Box<dyn Job>> },
    Open { conn: Box<dyn Connection> },
    Closed { reason: Option<KvError> },
}

enum Route {
    Queued,
    Dispatched(LocalBoxFuture<'static, ()>),
    Refused(Box<dyn Job>, KvError),
}

struct Shared {
    config: StoreConfig,
    state: RefCell<State>,
    spawner: Rc<dyn LocalSpawn>,
    changes: Notifier,
}

impl Shared {
    fn spawn(&self, op: LocalBoxFuture<'static, ()>) {
        // A refused future is dropped, which completes its sink as abandoned
        if let Err(e) = self.spawner.spawn_local(op) {
            warn!(
                "{} executor refused operation on '{}': {}",
                prefix::DB,
                self.config.name,
                e
            );
        }
    }

    fn finish_open(
        &self,
        outcome: EngineResult<Box<dyn Connection>>,
        on_ready: Option<ReadyCallback>,
    ) {
        let result = match outcome {
            Ok(conn) => self.drain(conn),
            Err(e) => self.fail_backlog(KvError::from(e)),
        };
        if let Some(on_ready) = on_ready {
            on_ready(result);
        }
    }

    /// Move to Open and dispatch the backlog in FIFO order.
    fn drain(&self, conn: Box<dyn Connection>) -> KvResult<()> {
        let mut state = self.state.borrow_mut();
        let backlog = match &mut *state {
            State::Opening { backlog } => Some(mem::take(backlog)),
            _ => None,
        };
        let Some(backlog) = backlog else {
            drop(state);
            debug!(
                "{} '{}' closed before open completed",
                prefix::CLOSE,
                self.config.name
            );
            conn.close();
            return Err(KvError::Closed);
        };

        let queued = backlog.len();
        let ops: Vec<_> = backlog
            .into_iter()
            .map(|job| job.dispatch(conn.as_ref()))
            .collect();
        *state = State::Open { conn };
        drop(state);

        debug!(
            "{} '{}' open, draining {} queued operations",
            prefix::OPEN,
            self.config.name,
            queued
        );
        for op in ops {
            self.spawn(op);
        }
        Ok(())
    }

    /// Move to Closed with `err` as the reason and fail the backlog.
    ///
    /// A handle closed while opening keeps [`KvError::Closed`]; that is what
    /// `on_ready` receives.
    fn fail_backlog(&self, err: KvError) -> KvResult<()> {
        let mut state = self.state.borrow_mut();
        let backlog = match &mut *state {
            State::Opening { backlog } => Some(mem::take(backlog)),
            _ => None,
        };
        let Some(backlog) = backlog else {
            drop(state);
            debug!(
                "{} '{}' closed before open failed: {}",
                prefix::CLOSE,
                self.config.name,
                err
            );
            return Err(KvError::Closed);
        };
        *state = State::Closed {
            reason: Some(err.clone()),
        };
        drop(state);

        warn!(
            "{} failed to open '{}': {} ({} queued operations failed)",
            prefix::DB,
            self.config.name,
            err,
            backlog.len()
        );
        self.changes.close();
        for job in backlog {
            job.fail(err.clone());
        }
        Err(err)
    }
}

impl Drop for Shared {
    fn drop(&mut self) {
        if let State::Open { conn } = self.state.get_mut() {
            conn.close();
        }
    }
}

/// Handle to one named key-value store.
///
/// Cloning is cheap and yields another handle to the same store and
/// connection. The handle is single-threaded (`!Send`); operations run on the
/// local executor given at construction.
#[derive(Clone)]
pub struct KvStore {
    shared: Rc<Shared>,
}

impl KvStore {
    /// Build a handle and start opening the store.
    ///
    /// Fails synchronously if the configuration is invalid or the executor
    /// refuses the open task. Operations may be issued immediately.
    pub fn open<S>(config: StoreConfig, engine: &dyn StorageEngine, spawner: S) -> KvResult<Self>
    where
        S: LocalSpawn + 'static,
    {
        Self::start(config, engine, Rc::new(spawner), None)
    }

    /// Like [`KvStore::open`], calling `on_ready` once the open completes
    /// or fails. Queued operations are dispatched before `on_ready` runs.
    pub fn open_with<S>(
        config: StoreConfig,
        engine: &dyn StorageEngine,
        spawner: S,
        on_ready: impl FnOnce(KvResult<()>) + 'static,
    ) -> KvResult<Self>
    where
        S: LocalSpawn + 'static,
    {
        Self::start(config, engine, Rc::new(spawner), Some(Box::new(on_ready)))
    }

    fn start(
        config: StoreConfig,
        engine: &dyn StorageEngine,
        spawner: Rc<dyn LocalSpawn>,
        on_ready: Option<ReadyCallback>,
    ) -> KvResult<Self> {
        config.validate()?;
        debug!(
            "{} opening '{}' (store '{}', v{})",
            prefix::OPEN,
            config.name,
            config.object_store,
            config.version
        );

        let shared = Rc::new(Shared {
            config,
            state: RefCell::new(State::Opening {
                backlog: VecDeque::new(),
            }),
            spawner,
            changes: Notifier::default(),
        });

        // The engine is only asked to open once the executor has taken the driver
        let (start, started) = oneshot::channel::<OpenFuture>();
        let driver = {
            let shared = Rc::clone(&shared);
            async move {
                let Ok(opening) = started.await else {
                    return;
                };
                let outcome = opening.await;
                shared.finish_open(outcome, on_ready);
            }
        };
        shared
            .spawner
            .spawn_local(driver)
            .map_err(|e| KvError::Construction(format!("executor unavailable: {}", e)))?;

        if start.is_canceled() {
            return Err(KvError::Construction(
                "executor dropped the open task".into(),
            ));
        }
        let _ = start.send(engine.open(&shared.config));
        Ok(Self { shared })
    }

    pub fn name(&self) -> &str {
        &self.shared.config.name
    }

    pub fn config(&self) -> &StoreConfig {
        &self.shared.config
    }

    pub fn state(&self) -> Lifecycle {
        match &*self.shared.state.borrow() {
            State::Opening { .. } => Lifecycle::Opening,
            State::Open { .. } => Lifecycle::Open,
            State::Closed { .. } => Lifecycle::Closed,
        }
    }

    pub fn is_open(&self) -> bool {
        self.state() == Lifecycle::Open
    }

    /// `Ok` unless the handle is closed; then the error any call would get.
    pub fn usable(&self) -> KvResult<()> {
        match &*self.shared.state.borrow() {
            State::Closed { reason } => Err(reason.clone().unwrap_or(KvError::Closed)),
            _ => Ok(()),
        }
    }

    /// Close the handle and release the connection.
    ///
    /// Calls still queued receive [`KvError::Closed`]; calls already
    /// dispatched finish normally. Later calls fail synchronously. Closing
    /// twice is a no-op.
    pub fn close(&self) {
        let previous = mem::replace(
            &mut *self.shared.state.borrow_mut(),
            State::Closed { reason: None },
        );
        match previous {
            State::Opening { backlog } => {
                debug!(
                    "{} closing '{}' while opening, failing {} queued",
                    prefix::CLOSE,
                    self.name(),
                    backlog.len()
                );
                for job in backlog {
                    job.fail(KvError::Closed);
                }
            }
            State::Open { conn } => {
                debug!("{} closing '{}'", prefix::CLOSE, self.name());
                conn.close();
            }
            State::Closed { .. } => {}
        }
        self.shared.changes.close();
    }

    /// Stream of committed writes made through this handle.
    ///
    /// The stream ends when the handle closes.
    pub fn subscribe(&self) -> ChangeStream {
        if self.state() == Lifecycle::Closed {
            let (_, rx) = mpsc::unbounded();
            return rx;
        }
        self.shared.changes.subscribe()
    }

    /// Resolves once the store is open, or with the open error.
    pub fn ready(&self) -> KvResult<Pending<()>> {
        promise(|sink| self.submit(|_| future::ready(Ok(())).boxed_local(), sink))
    }

    // ========================================================================
    // Reads
    // ========================================================================

    /// Value stored under `key`; `None` if absent.
    pub fn get(&self, key: &str) -> KvResult<Pending<Option<Value>>> {
        promise(|sink| self.submit_get(key, sink))
    }

    pub fn get_with(
        &self,
        key: &str,
        callback: impl FnOnce(KvResult<Option<Value>>) + 'static,
    ) -> KvResult<()> {
        self.submit_get(key, Sink::callback(callback))
    }

    fn submit_get(&self, key: &str, sink: Sink<Option<Value>>) -> KvResult<()> {
        let key = key.to_string();
        self.submit(move |conn| adapter::get(conn, &key), sink)
    }

    /// Values for several keys in one transaction, in the order given.
    /// Absent keys yield `None` in their slot.
    pub fn get_many(
        &self,
        keys: impl IntoIterator<Item = impl Into<String>>,
    ) -> KvResult<Pending<Vec<Option<Value>>>> {
        let keys: Vec<String> = keys.into_iter().map(Into::into).collect();
        promise(|sink| self.submit_get_many(keys, sink))
    }

    pub fn get_many_with(
        &self,
        keys: impl IntoIterator<Item = impl Into<String>>,
        callback: impl FnOnce(KvResult<Vec<Option<Value>>>) + 'static,
    ) -> KvResult<()> {
        let keys: Vec<String> = keys.into_iter().map(Into::into).collect();
        self.submit_get_many(keys, Sink::callback(callback))
    }

    fn submit_get_many(&self, keys: Vec<String>, sink: Sink<Vec<Option<Value>>>) -> KvResult<()> {
        self.submit(move |conn| adapter::get_many(conn, &keys), sink)
    }

    /// Number of records.
    pub fn count(&self) -> KvResult<Pending<usize>> {
        promise(|sink| self.submit(adapter::count, sink))
    }

    pub fn count_with(&self, callback: impl FnOnce(KvResult<usize>) + 'static) -> KvResult<()> {
        self.submit(adapter::count, Sink::callback(callback))
    }

    /// Every key, in engine order.
    pub fn keys(&self) -> KvResult<Pending<Vec<String>>> {
        promise(|sink| self.submit(adapter::keys, sink))
    }

    pub fn keys_with(&self, callback: impl FnOnce(KvResult<Vec<String>>) + 'static) -> KvResult<()> {
        self.submit(adapter::keys, Sink::callback(callback))
    }

    /// Every value, in engine key order.
    pub fn values(&self) -> KvResult<Pending<Vec<Value>>> {
        promise(|sink| self.submit(adapter::values, sink))
    }

    pub fn values_with(&self, callback: impl FnOnce(KvResult<Vec<Value>>) + 'static) -> KvResult<()> {
        self.submit(adapter::values, Sink::callback(callback))
    }

    /// Every record as a key to value map.
    pub fn json(&self) -> KvResult<Pending<Map<String, Value>>> {
        promise(|sink| self.submit(adapter::json, sink))
    }

    pub fn json_with(
        &self,
        callback: impl FnOnce(KvResult<Map<String, Value>>) + 'static,
    ) -> KvResult<()> {
        self.submit(adapter::json, Sink::callback(callback))
    }

    // ========================================================================
    // Writes
    // ========================================================================

    /// Insert or overwrite.
    pub fn set(&self, key: &str, value: impl Into<Value>) -> KvResult<Pending<()>> {
        let value = value.into();
        promise(|sink| self.submit_set(key, value, sink))
    }

    pub fn set_with(
        &self,
        key: &str,
        value: impl Into<Value>,
        callback: impl FnOnce(KvResult<()>) + 'static,
    ) -> KvResult<()> {
        self.submit_set(key, value.into(), Sink::callback(callback))
    }

    fn submit_set(&self, key: &str, value: Value, sink: Sink<()>) -> KvResult<()> {
        let key = key.to_string();
        let changes = self.shared.changes.clone();
        self.submit(move |conn| adapter::set(conn, key, value, changes), sink)
    }

    /// Insert only if `key` is absent; otherwise [`KvError::DuplicateKey`]
    /// and the stored value is left untouched.
    pub fn add(&self, key: &str, value: impl Into<Value>) -> KvResult<Pending<()>> {
        let value = value.into();
        promise(|sink| self.submit_add(key, value, sink))
    }

    pub fn add_with(
        &self,
        key: &str,
        value: impl Into<Value>,
        callback: impl FnOnce(KvResult<()>) + 'static,
    ) -> KvResult<()> {
        self.submit_add(key, value.into(), Sink::callback(callback))
    }

    fn submit_add(&self, key: &str, value: Value, sink: Sink<()>) -> KvResult<()> {
        let key = key.to_string();
        let changes = self.shared.changes.clone();
        self.submit(move |conn| adapter::add(conn, key, value, changes), sink)
    }

    /// Delete `key`; absent keys are not an error.
    pub fn remove(&self, key: &str) -> KvResult<Pending<()>> {
        promise(|sink| self.submit_remove(key, sink))
    }

    pub fn remove_with(&self, key: &str, callback: impl FnOnce(KvResult<()>) + 'static) -> KvResult<()> {
        self.submit_remove(key, Sink::callback(callback))
    }

    fn submit_remove(&self, key: &str, sink: Sink<()>) -> KvResult<()> {
        let key = key.to_string();
        let changes = self.shared.changes.clone();
        self.submit(move |conn| adapter::remove(conn, key, changes), sink)
    }

    /// Delete every record.
    pub fn clear(&self) -> KvResult<Pending<()>> {
        promise(|sink| self.submit_clear(sink))
    }

    pub fn clear_with(&self, callback: impl FnOnce(KvResult<()>) + 'static) -> KvResult<()> {
        self.submit_clear(Sink::callback(callback))
    }

    fn submit_clear(&self, sink: Sink<()>) -> KvResult<()> {
        let changes = self.shared.changes.clone();
        self.submit(move |conn| adapter::clear(conn, changes), sink)
    }

    // ========================================================================
    // Dispatch
    // ========================================================================

    /// Queue while opening, dispatch when open, refuse when closed.
    fn submit<T, F>(&self, start: F, sink: Sink<T>) -> KvResult<()>
    where
        T: 'static,
        F: FnOnce(&dyn Connection) -> Operation<T> + 'static,
    {
        let job: Box<dyn Job> = Box::new(Deferred { start, sink });
        let route = {
            let mut state = self.shared.state.borrow_mut();
            match &mut *state {
                State::Opening { backlog } => {
                    backlog.push_back(job);
                    Route::Queued
                }
                State::Open { conn } => Route::Dispatched(job.dispatch(conn.as_ref())),
                State::Closed { reason } => {
                    Route::Refused(job, reason.clone().unwrap_or(KvError::Closed))
                }
            }
        };

        match route {
            Route::Queued => Ok(()),
            Route::Dispatched(op) => {
                self.shared.spawn(op);
                Ok(())
            }
            Route::Refused(job, err) => {
                job.discard();
                Err(err)
            }
        }
    }
}

impl fmt::Debug for KvStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KvStore")
            .field("name", &self.name())
            .field("state", &self.state())
            .finish()
    }
}

fn promise<T>(submit: impl FnOnce(Sink<T>) -> KvResult<()>) -> KvResult<Pending<T>> {
    let (sink, pending) = Sink::promise();
    submit(sink)?;
    Ok(pending)
}
