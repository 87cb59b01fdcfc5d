//! Request coalescer: at-most-one in-flight async call per key.
//!
//! Callers here are async tasks waiting on real network I/O, so joined
//! callers block on a `tokio::sync::Notify` paired with a result slot,
//! guarded by the same map lock that tracks which keys have an in-flight
//! call.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use parking_lot::Mutex;
use ringcache_common::Error;
use tokio::sync::Notify;

struct Call<V> {
    result: Mutex<Option<Result<V, Error>>>,
    done: Notify,
}

/// Guarantees that concurrent callers asking for the same key share one
/// execution of the supplied async function.
pub struct Coalescer<V> {
    calls: Mutex<HashMap<String, Arc<Call<V>>>>,
}

impl<V: Clone> Coalescer<V> {
    pub fn new() -> Self {
        Coalescer {
            calls: Mutex::new(HashMap::new()),
        }
    }

    /// Runs `f` for `key` if no call is already in flight, otherwise joins
    /// the in-flight call and returns its exact outcome.
    ///
    /// The record for `key` is removed once the call completes, successfully
    /// or not, so the next caller re-executes `f`.
    pub async fn do_once<F, Fut>(&self, key: &str, f: F) -> Result<V, Error>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, Error>>,
    {
        let (call, is_leader) = {
            let mut calls = self.calls.lock();
            if let Some(existing) = calls.get(key) {
                (Arc::clone(existing), false)
            } else {
                let call = Arc::new(Call {
                    result: Mutex::new(None),
                    done: Notify::new(),
                });
                calls.insert(key.to_string(), Arc::clone(&call));
                (call, true)
            }
        };

        if is_leader {
            let outcome = f().await;
            *call.result.lock() = Some(outcome.clone());
            self.calls.lock().remove(key);
            call.done.notify_waiters();
            outcome
        } else {
            // Register as a waiter before checking the result slot: if we
            // checked first, the leader could finish and call
            // `notify_waiters()` in the gap between our check and our
            // `notified().await`, and `notify_waiters()` stores no permit
            // for a waiter that registers after it ran, so that wakeup
            // would be lost forever. `enable()` registers this waiter
            // immediately, without suspending, so the only way to still
            // miss the real-time notification is if the leader finished
            // (and thus filled the slot) before we registered — which the
            // post-registration slot check below catches.
            let notified = call.done.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if let Some(result) = call.result.lock().clone() {
                return result;
            }

            notified.await;
            call.result
                .lock()
                .clone()
                .expect("leader always fills the result slot before notifying")
        }
    }
}

impl<V: Clone> Default for Coalescer<V> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn concurrent_callers_share_one_execution() {
        let coalescer = Arc::new(Coalescer::<String>::new());
        let invocations = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..100 {
            let coalescer = Arc::clone(&coalescer);
            let invocations = Arc::clone(&invocations);
            handles.push(tokio::spawn(async move {
                coalescer
                    .do_once("K", || async {
                        invocations.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(50)).await;
                        Ok::<_, Error>("v".to_string())
                    })
                    .await
            }));
        }

        for handle in handles {
            assert_eq!(handle.await.unwrap().unwrap(), "v");
        }
        assert_eq!(invocations.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn a_failed_call_is_shared_and_then_cleared() {
        let coalescer = Coalescer::<String>::new();
        let err = coalescer
            .do_once("K", || async { Err::<String, _>(Error::NotFound("K".into())) })
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));

        // record was cleared; a fresh call re-executes.
        let ok = coalescer
            .do_once("K", || async { Ok::<_, Error>("v".to_string()) })
            .await
            .unwrap();
        assert_eq!(ok, "v");
    }
}
