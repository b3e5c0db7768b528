//! Duplicate-load suppression (spec §4.4): collapses concurrent work for the same key
//! into a single execution, with every waiter receiving the same result.

use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use futures::future::{FutureExt, Shared};

type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send>>;

struct Flight<V, E> {
    id: u64,
    fut: Shared<BoxFuture<Result<V, E>>>,
}

impl<V, E> Clone for Flight<V, E> {
    fn clone(&self) -> Self {
        Flight {
            id: self.id,
            fut: self.fut.clone(),
        }
    }
}

/// Admits at most one concurrent execution of the work function per key. Keys are
/// compared by equality of the group's key type. Not cancellable: callers wait to
/// completion. Waiters are released before the originating caller's flight is cleaned up;
/// no fairness guarantee is made about wakeup order.
pub struct SingleFlight<K, V, E> {
    next_id: AtomicU64,
    inflight: Mutex<HashMap<K, Flight<V, E>>>,
}

impl<K, V, E> Default for SingleFlight<K, V, E>
where
    K: Eq + Hash,
{
    fn default() -> Self {
        Self {
            next_id: AtomicU64::new(0),
            inflight: Mutex::new(HashMap::new()),
        }
    }
}

impl<K, V, E> SingleFlight<K, V, E>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs `make_work()` to completion behind the single-flight gate for `key`. If a
    /// flight is already in progress for `key`, this call joins it instead of invoking
    /// `make_work`. An abnormal termination of the work future propagates to every waiter
    /// and the coordinator cleans up so the next call for `key` starts a fresh flight.
    pub async fn do_work<F, Fut>(&self, key: K, make_work: F) -> Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>> + Send + 'static,
    {
        let (flight, owns_flight) = {
            let mut guard = self.inflight.lock().unwrap();
            if let Some(flight) = guard.get(&key) {
                (flight.clone(), false)
            } else {
                let id = self.next_id.fetch_add(1, Ordering::Relaxed);
                let fut: Shared<BoxFuture<Result<V, E>>> =
                    (Box::pin(make_work()) as BoxFuture<Result<V, E>>).shared();
                let flight = Flight { id, fut };
                guard.insert(key.clone(), flight.clone());
                (flight, true)
            }
        };

        let result = flight.fut.await;

        if owns_flight {
            let mut guard = self.inflight.lock().unwrap();
            if matches!(guard.get(&key), Some(current) if current.id == flight.id) {
                guard.remove(&key);
            }
        }

        result
    }
}
