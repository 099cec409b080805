//! Result delivery: callback or future, chosen once per call.
//!
//! Every operation completes through [`Sink::complete`]. The sink either hands
//! the result to a callback or settles a oneshot channel read by [`Pending`].
//! A sink dropped without completing reports [`KvError::Abandoned`], so no
//! caller is ever left waiting.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use futures::channel::oneshot;

use crate::error::{KvError, KvResult};

/// Callback receiving an operation's result.
pub type Callback<T> = Box<dyn FnOnce(KvResult<T>)>;

enum Target<T> {
    Callback(Callback<T>),
    Promise(oneshot::Sender<KvResult<T>>),
}

impl<T> Target<T> {
    fn deliver(self, result: KvResult<T>) {
        match self {
            Target::Callback(callback) => callback(result),
            Target::Promise(tx) => {
                // Receiver dropped means nobody is waiting
                let _ = tx.send(result);
            }
        }
    }
}

pub(crate) struct Sink<T> {
    target: Option<Target<T>>,
}

impl<T> Sink<T> {
    pub(crate) fn callback(callback: impl FnOnce(KvResult<T>) + 'static) -> Self {
        Self {
            target: Some(Target::Callback(Box::new(callback))),
        }
    }

    pub(crate) fn promise() -> (Self, Pending<T>) {
        let (tx, rx) = oneshot::channel();
        let sink = Self {
            target: Some(Target::Promise(tx)),
        };
        (sink, Pending { rx })
    }

    pub(crate) fn complete(mut self, result: KvResult<T>) {
        if let Some(target) = self.target.take() {
            target.deliver(result);
        }
    }

    /// Drop without delivering anything; the caller reports the failure
    /// synchronously instead.
    pub(crate) fn discard(mut self) {
        self.target = None;
    }
}

impl<T> Drop for Sink<T> {
    fn drop(&mut self) {
        if let Some(target) = self.target.take() {
            target.deliver(Err(KvError::Abandoned));
        }
    }
}

/// Future resolving to an operation's result.
///
/// Returned by the promise-style methods of [`crate::KvStore`].
#[must_use = "operations still run, but their result is lost unless awaited"]
pub struct Pending<T> {
    rx: oneshot::Receiver<KvResult<T>>,
}

impl<T> Future for Pending<T> {
    type Output = KvResult<T>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match Pin::new(&mut self.rx).poll(cx) {
            Poll::Ready(Ok(result)) => Poll::Ready(result),
            Poll::Ready(Err(oneshot::Canceled)) => Poll::Ready(Err(KvError::Abandoned)),
            Poll::Pending => Poll::Pending,
        }
    }
}

impl<T> fmt::Debug for Pending<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pending").finish_non_exhaustive()
    }
}
