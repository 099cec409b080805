//! Translates store verbs into engine transactions.
//!
//! Each function begins its transaction and issues its requests before
//! returning, so dispatch order is the order the engine sees. The returned
//! [`Operation`] waits for the requests, then for the transaction to complete.
//! Engine errors come back as [`KvError`] values, never as panics.

use futures::future::{self, FutureExt, LocalBoxFuture};
use serde_json::{Map, Value};

use crate::engine::{Connection, Request, Transaction, TransactionMode};
use crate::error::KvResult;
use crate::events::{Change, Notifier};

/// An issued operation awaiting completion.
pub(crate) type Operation<T> = LocalBoxFuture<'static, KvResult<T>>;

fn run<T: 'static>(
    conn: &dyn Connection,
    mode: TransactionMode,
    issue: impl FnOnce(&dyn Transaction) -> Request<T>,
) -> Operation<T> {
    let tx = match conn.begin(mode) {
        Ok(tx) => tx,
        Err(e) => return future::ready(Err(e.into())).boxed_local(),
    };
    let request = issue(tx.as_ref());

    async move {
        let value = request.await?;
        tx.commit().await?;
        Ok(value)
    }
    .boxed_local()
}

/// Run a write, then announce it once the transaction has committed.
fn write(
    conn: &dyn Connection,
    issue: impl FnOnce(&dyn Transaction) -> Request<()>,
    changes: Notifier,
    change: Change,
) -> Operation<()> {
    let op = run(conn, TransactionMode::ReadWrite, issue);
    async move {
        op.await?;
        changes.emit(change);
        Ok(())
    }
    .boxed_local()
}

pub(crate) fn get(conn: &dyn Connection, key: &str) -> Operation<Option<Value>> {
    run(conn, TransactionMode::ReadOnly, |tx| tx.get(key))
}

/// One read-only transaction, one request per key, results in input order.
pub(crate) fn get_many(conn: &dyn Connection, keys: &[String]) -> Operation<Vec<Option<Value>>> {
    run(conn, TransactionMode::ReadOnly, |tx| {
        let requests: Vec<Request<Option<Value>>> = keys.iter().map(|k| tx.get(k)).collect();
        future::try_join_all(requests).boxed_local()
    })
}

pub(crate) fn set(conn: &dyn Connection, key: String, value: Value, changes: Notifier) -> Operation<()> {
    let issue = |tx: &dyn Transaction| tx.put(&key, &value);
    write(conn, issue, changes, Change::Set { key: key.clone(), value: value.clone() })
}

/// Insert relying on the engine's uniqueness constraint; no existence check.
pub(crate) fn add(conn: &dyn Connection, key: String, value: Value, changes: Notifier) -> Operation<()> {
    let issue = |tx: &dyn Transaction| tx.insert_unique(&key, &value);
    write(conn, issue, changes, Change::Add { key: key.clone(), value: value.clone() })
}

pub(crate) fn remove(conn: &dyn Connection, key: String, changes: Notifier) -> Operation<()> {
    let issue = |tx: &dyn Transaction| tx.delete(&key);
    write(conn, issue, changes, Change::Remove { key: key.clone() })
}

pub(crate) fn clear(conn: &dyn Connection, changes: Notifier) -> Operation<()> {
    write(conn, |tx| tx.clear(), changes, Change::Clear)
}

pub(crate) fn count(conn: &dyn Connection) -> Operation<usize> {
    run(conn, TransactionMode::ReadOnly, |tx| tx.count())
}

pub(crate) fn keys(conn: &dyn Connection) -> Operation<Vec<String>> {
    let op = run(conn, TransactionMode::ReadOnly, |tx| tx.get_all());
    async move { Ok(op.await?.into_iter().map(|(key, _)| key).collect()) }.boxed_local()
}

pub(crate) fn values(conn: &dyn Connection) -> Operation<Vec<Value>> {
    let op = run(conn, TransactionMode::ReadOnly, |tx| tx.get_all());
    async move { Ok(op.await?.into_iter().map(|(_, value)| value).collect()) }.boxed_local()
}

pub(crate) fn json(conn: &dyn Connection) -> Operation<Map<String, Value>> {
    let op = run(conn, TransactionMode::ReadOnly, |tx| tx.get_all());
    async move { Ok(op.await?.into_iter().collect()) }.boxed_local()
}
