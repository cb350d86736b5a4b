//! Per-key request coalescing
//!
//! At most one load per key runs on a node at a time. Callers that arrive
//! while a load is pending attach to it and receive a clone of its result,
//! value or error.
//!
//! The load runs in its own task. A waiter that is dropped (client went away,
//! caller timed out) only stops waiting; the load still finishes for everyone
//! else. The in-flight entry is removed by a guard owned by that task, so it
//! goes away on success, on error and on panic alike.

use futures_util::future::{BoxFuture, FutureExt, Shared};
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::common::Result;

type SharedLoad<V> = Shared<BoxFuture<'static, Result<V>>>;
type FlightMap<V> = Arc<Mutex<HashMap<String, SharedLoad<V>>>>;

fn lock<V>(map: &Mutex<HashMap<String, SharedLoad<V>>>) -> MutexGuard<'_, HashMap<String, SharedLoad<V>>> {
    map.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Outcome of [`Coalescer::run`]
#[derive(Debug)]
pub struct Flight<V> {
    pub result: Result<V>,
    /// `true` when this caller joined a load somebody else started
    pub joined: bool,
}

/// Removes the in-flight entry when the load task ends, however it ends.
struct FlightGuard<V> {
    in_flight: FlightMap<V>,
    key: String,
}

impl<V> Drop for FlightGuard<V> {
    fn drop(&mut self) {
        lock(&self.in_flight).remove(&self.key);
    }
}

/// Tracks the pending load of every key on this node.
pub struct Coalescer<V> {
    in_flight: FlightMap<V>,
}

impl<V> Default for Coalescer<V> {
    fn default() -> Self {
        Self {
            in_flight: Arc::new(Mutex::new(HashMap::new())),
        }
    }
}

impl<V> Coalescer<V>
where
    V: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `producer` for `key` unless a load for `key` is already pending,
    /// in which case wait for that one instead.
    ///
    /// `producer` is only called by the caller that starts the load. Must be
    /// called from within a tokio runtime.
    pub async fn run<F, Fut>(&self, key: &str, producer: F) -> Flight<V>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V>> + Send + 'static,
    {
        let (load, joined) = {
            let mut in_flight = lock(&self.in_flight);
            match in_flight.get(key) {
                Some(load) => (load.clone(), true),
                None => {
                    let guard = FlightGuard {
                        in_flight: Arc::clone(&self.in_flight),
                        key: key.to_string(),
                    };
                    let work = producer();
                    // The guard cannot take the map lock before we release
                    // it below, so the entry is always inserted before it
                    // can be removed.
                    let task = tokio::spawn(async move {
                        let _guard = guard;
                        work.await
                    });
                    let load = async move {
                        match task.await {
                            Ok(result) => result,
                            Err(e) => Err(crate::Error::Internal(format!("load task failed: {}", e))),
                        }
                    }
                    .boxed()
                    .shared();
                    in_flight.insert(key.to_string(), load.clone());
                    (load, false)
                }
            }
        };

        Flight {
            result: load.await,
            joined,
        }
    }

    /// Number of keys with a pending load
    pub fn in_flight(&self) -> usize {
        lock(&self.in_flight).len()
    }

    pub fn is_pending(&self, key: &str) -> bool {
        lock(&self.in_flight).contains_key(key)
    }
}
