//! Promise values for asynchronous formulas

use crate::error::Fault;
use crate::value::Value;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use tokio::sync::OnceCell;

type PendingFuture = Pin<Box<dyn Future<Output = Value> + Send + 'static>>;

/// A pending or settled asynchronous computation.
///
/// The underlying future runs at most once, on the first call to
/// [`Promise::resolve`]; every clone observes the same settled value.
/// Failure is a settled [`Value::Error`].
#[derive(Clone)]
pub struct Promise {
    inner: Arc<PromiseInner>,
}

struct PromiseInner {
    pending: Mutex<Option<PendingFuture>>,
    settled: OnceCell<Value>,
}

impl Promise {
    /// Wrap a future producing a value
    pub fn new<F>(future: F) -> Self
    where
        F: Future<Output = Value> + Send + 'static,
    {
        Self {
            inner: Arc::new(PromiseInner {
                pending: Mutex::new(Some(Box::pin(future))),
                settled: OnceCell::new(),
            }),
        }
    }

    /// A promise that is already settled with a value
    pub fn resolved(value: Value) -> Self {
        Self {
            inner: Arc::new(PromiseInner {
                pending: Mutex::new(None),
                settled: OnceCell::new_with(Some(value)),
            }),
        }
    }

    /// A promise that is already settled with a failure
    pub fn rejected(fault: Fault) -> Self {
        Self::resolved(Value::error(fault))
    }

    /// Whether the promise has settled
    pub fn is_settled(&self) -> bool {
        self.inner.settled.initialized()
    }

    /// The settled value, if any
    pub fn try_value(&self) -> Option<Value> {
        self.inner.settled.get().cloned()
    }

    /// Wait for the promise to settle and return its value
    pub async fn resolve(&self) -> Value {
        self.inner
            .settled
            .get_or_init(|| async {
                let pending = self
                    .inner
                    .pending
                    .lock()
                    .ok()
                    .and_then(|mut guard| guard.take());
                match pending {
                    Some(future) => future.await,
                    None => Value::error(Fault::internal("promise future was dropped before settling")),
                }
            })
            .await
            .clone()
    }

    /// Identity comparison
    pub fn ptr_eq(&self, other: &Promise) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for Promise {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.inner.settled.get() {
            Some(value) => f.debug_tuple("Promise").field(value).finish(),
            None => f.write_str("Promise(<pending>)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn test_resolve_runs_future_once() {
        let runs = Arc::new(AtomicUsize::new(0));
        let counter = runs.clone();
        let promise = Promise::new(async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Value::from(7)
        });

        assert!(!promise.is_settled());
        let copy = promise.clone();
        assert_eq!(promise.resolve().await, Value::from(7));
        assert_eq!(copy.resolve().await, Value::from(7));
        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert!(copy.is_settled());
    }

    #[tokio::test]
    async fn test_rejected() {
        let promise = Promise::rejected(Fault::host("offline"));
        assert!(promise.is_settled());
        assert_eq!(promise.resolve().await, Value::error(Fault::host("offline")));
    }

    #[test]
    fn test_identity() {
        let a = Promise::resolved(Value::from(1));
        let b = Promise::resolved(Value::from(1));
        assert!(a.ptr_eq(&a.clone()));
        assert!(!a.ptr_eq(&b));
        assert_eq!(a.try_value(), Some(Value::from(1)));
    }
}
