//! In-memory storage engine
//!
//! A `BTreeMap`-backed implementation of the engine traits for testing and
//! native use. Databases live as long as the engine (and its clones), so a
//! store reopened under the same name sees the records written before.

use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, HashMap};
use std::rc::Rc;

use futures::future::{self, FutureExt, LocalBoxFuture};
use serde_json::Value;

use crate::config::StoreConfig;
use crate::engine::{
    Connection, EngineError, EngineResult, Request, StorageEngine, Transaction, TransactionMode,
};

type Table = Rc<RefCell<BTreeMap<String, Value>>>;

/// In-memory storage engine.
///
/// Records are kept per database name and object store. Keys iterate in
/// sorted order, matching IndexedDB's ordering for string keys.
#[derive(Debug, Clone)]
pub struct MemoryEngine {
    databases: Rc<RefCell<HashMap<String, HashMap<String, Table>>>>,
    available: bool,
}

impl MemoryEngine {
    /// Create an engine with no databases.
    pub fn new() -> Self {
        Self {
            databases: Rc::new(RefCell::new(HashMap::new())),
            available: true,
        }
    }

    /// An engine that behaves like an environment without storage support:
    /// every open fails with [`EngineError::NotAvailable`].
    pub fn unavailable() -> Self {
        Self {
            available: false,
            ..Self::new()
        }
    }

    /// Whether opens can succeed.
    pub fn is_available(&self) -> bool {
        self.available
    }

    /// Names of the databases opened so far, sorted (for testing).
    pub fn database_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.databases.borrow().keys().cloned().collect();
        names.sort();
        names
    }

    /// Snapshot of one object store's records (for testing).
    pub fn records(&self, name: &str, object_store: &str) -> Vec<(String, Value)> {
        self.databases
            .borrow()
            .get(name)
            .and_then(|stores| stores.get(object_store))
            .map(|table| {
                table
                    .borrow()
                    .iter()
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }

    fn table(&self, name: &str, object_store: &str) -> Table {
        let mut databases = self.databases.borrow_mut();
        databases
            .entry(name.to_string())
            .or_default()
            .entry(object_store.to_string())
            .or_default()
            .clone()
    }
}

impl Default for MemoryEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl StorageEngine for MemoryEngine {
    fn open(
        &self,
        config: &StoreConfig,
    ) -> LocalBoxFuture<'static, EngineResult<Box<dyn Connection>>> {
        if !self.available {
            return future::ready(Err(EngineError::NotAvailable(
                "memory engine is disabled".into(),
            )))
            .boxed_local();
        }

        let connection = MemoryConnection {
            table: self.table(&config.name, &config.object_store),
            closed: Cell::new(false),
        };
        async move { Ok(Box::new(connection) as Box<dyn Connection>) }.boxed_local()
    }
}

struct MemoryConnection {
    table: Table,
    closed: Cell<bool>,
}

impl Connection for MemoryConnection {
    fn begin(&self, mode: TransactionMode) -> EngineResult<Box<dyn Transaction>> {
        if self.closed.get() {
            return Err(EngineError::Transaction("connection is closed".into()));
        }
        Ok(Box::new(MemoryTransaction {
            table: self.table.clone(),
            mode,
        }))
    }

    fn close(&self) {
        self.closed.set(true);
    }
}

struct MemoryTransaction {
    table: Table,
    mode: TransactionMode,
}

impl MemoryTransaction {
    fn read<T: 'static>(&self, f: impl FnOnce(&BTreeMap<String, Value>) -> T) -> Request<T> {
        let result = f(&self.table.borrow());
        future::ready(Ok(result)).boxed_local()
    }

    fn write<T: 'static>(
        &self,
        f: impl FnOnce(&mut BTreeMap<String, Value>) -> EngineResult<T>,
    ) -> Request<T> {
        let result = match self.mode {
            TransactionMode::ReadOnly => Err(EngineError::Transaction(
                "write in a read-only transaction".into(),
            )),
            TransactionMode::ReadWrite => f(&mut self.table.borrow_mut()),
        };
        future::ready(result).boxed_local()
    }
}

impl Transaction for MemoryTransaction {
    fn get(&self, key: &str) -> Request<Option<Value>> {
        self.read(|table| table.get(key).cloned())
    }

    fn get_all(&self) -> Request<Vec<(String, Value)>> {
        self.read(|table| {
            table
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect()
        })
    }

    fn put(&self, key: &str, value: &Value) -> Request<()> {
        self.write(|table| {
            table.insert(key.to_string(), value.clone());
            Ok(())
        })
    }

    fn insert_unique(&self, key: &str, value: &Value) -> Request<()> {
        self.write(|table| {
            if table.contains_key(key) {
                return Err(EngineError::Constraint(key.to_string()));
            }
            table.insert(key.to_string(), value.clone());
            Ok(())
        })
    }

    fn delete(&self, key: &str) -> Request<()> {
        self.write(|table| {
            table.remove(key);
            Ok(())
        })
    }

    fn clear(&self) -> Request<()> {
        self.write(|table| {
            table.clear();
            Ok(())
        })
    }

    fn count(&self) -> Request<usize> {
        self.read(|table| table.len())
    }

    fn commit(self: Box<Self>) -> Request<()> {
        future::ready(Ok(())).boxed_local()
    }
}
