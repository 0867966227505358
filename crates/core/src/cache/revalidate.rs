//! Single-flight background revalidation.
//!
//! At most one refresh per key runs at a time in this process. Callers that
//! trigger a refresh while one is in flight get a handle to the same outcome
//! instead of starting a second task. Tasks are spawned onto the runtime, so
//! they finish even if every caller drops its handle; `shutdown` waits for
//! them up to a deadline and abandons the rest.

use std::collections::HashMap;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use futures_util::FutureExt;
use futures_util::future::{BoxFuture, Shared};
use tokio::sync::oneshot;
use tokio::task::JoinSet;

use super::lock::mutex_lock;
use crate::Error;

const TARGET: &str = "cache::revalidate";

/// How a revalidation ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RevalidationOutcome {
    /// The task completed and wrote fresh data.
    Refreshed,
    /// The task returned an error or panicked. Already logged.
    Failed(String),
    /// The task was dropped before reporting, e.g. during runtime shutdown.
    Abandoned,
}

/// Awaitable, cloneable handle to an in-flight revalidation.
///
/// Dropping it does not cancel the task.
pub type RevalidationHandle = Shared<BoxFuture<'static, RevalidationOutcome>>;

#[derive(Default)]
struct Inner {
    in_flight: Mutex<HashMap<String, RevalidationHandle>>,
    tasks: Mutex<JoinSet<()>>,
}

/// Deduplicates background refreshes per key.
#[derive(Clone, Default)]
pub struct RevalidationCoordinator {
    inner: Arc<Inner>,
}

impl RevalidationCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `task` for `key` unless a run for `key` is already in flight.
    ///
    /// Only the dedup bookkeeping happens synchronously; the task itself runs
    /// on a spawned tokio task. `task` is not invoked at all when the call
    /// joins an existing run. Must be called from within a tokio runtime.
    pub fn run_exclusive<F, Fut>(&self, key: &str, task: F) -> RevalidationHandle
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<(), Error>> + Send + 'static,
    {
        let mut in_flight = mutex_lock(&self.inner.in_flight, TARGET, "run_exclusive");
        if let Some(existing) = in_flight.get(key) {
            tracing::debug!(key, "revalidation already in flight, joining");
            return existing.clone();
        }

        // Build the future before registering the key, so a panicking
        // closure leaves no entry behind.
        let work = task();

        let (tx, rx) = oneshot::channel();
        let handle: RevalidationHandle =
            async move { rx.await.unwrap_or(RevalidationOutcome::Abandoned) }.boxed().shared();
        in_flight.insert(key.to_string(), handle.clone());
        drop(in_flight);

        let inner = Arc::clone(&self.inner);
        let key = key.to_string();

        let mut tasks = mutex_lock(&self.inner.tasks, TARGET, "run_exclusive");
        // Reap finished tasks so the set only holds live ones.
        while tasks.try_join_next().is_some() {}
        tasks.spawn(async move {
            let started = Instant::now();
            let outcome = match AssertUnwindSafe(work).catch_unwind().await {
                Ok(Ok(())) => {
                    tracing::debug!(
                        key = %key,
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        "revalidation finished"
                    );
                    RevalidationOutcome::Refreshed
                }
                Ok(Err(err)) => {
                    tracing::warn!(
                        key = %key,
                        code = err.code(),
                        error = %err,
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        "revalidation failed, serving stale data until the next trigger"
                    );
                    RevalidationOutcome::Failed(err.to_string())
                }
                Err(_) => {
                    tracing::warn!(key = %key, "revalidation task panicked");
                    RevalidationOutcome::Failed(Error::RevalidationFailed("task panicked".into()).to_string())
                }
            };

            // Leave the map before publishing, so a caller reacting to the
            // outcome can start a fresh run.
            mutex_lock(&inner.in_flight, TARGET, "settle").remove(&key);
            let _ = tx.send(outcome);
        });

        handle
    }

    /// Whether a revalidation for `key` is currently running.
    pub fn is_in_flight(&self, key: &str) -> bool {
        mutex_lock(&self.inner.in_flight, TARGET, "is_in_flight").contains_key(key)
    }

    pub fn in_flight_count(&self) -> usize {
        mutex_lock(&self.inner.in_flight, TARGET, "in_flight_count").len()
    }

    /// Wait up to `grace` for running revalidations, then abort the rest.
    ///
    /// Returns the number of tasks that had to be abandoned.
    pub async fn shutdown(&self, grace: Duration) -> usize {
        let mut tasks = std::mem::take(&mut *mutex_lock(&self.inner.tasks, TARGET, "shutdown"));
        let pending = tasks.len();

        let drained = tokio::time::timeout(grace, async {
            while tasks.join_next().await.is_some() {}
        })
        .await;

        if drained.is_ok() {
            tracing::debug!(pending, "revalidations drained");
            return 0;
        }

        let abandoned = tasks.len();
        tasks.abort_all();
        mutex_lock(&self.inner.in_flight, TARGET, "shutdown").clear();
        tracing::warn!(abandoned, grace_ms = grace.as_millis() as u64, "abandoning in-flight revalidations");
        abandoned
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    fn counting_task(
        counter: &Arc<AtomicUsize>, delay: Duration, result: Result<(), Error>,
    ) -> impl FnOnce() -> BoxFuture<'static, Result<(), Error>> {
        let counter = Arc::clone(counter);
        move || {
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(delay).await;
                result
            }
            .boxed()
        }
    }

    #[tokio::test]
    async fn test_concurrent_callers_share_one_run() {
        let coordinator = RevalidationCoordinator::new();
        let runs = Arc::new(AtomicUsize::new(0));

        let first =
            coordinator.run_exclusive("item:post-9", counting_task(&runs, Duration::from_millis(50), Ok(())));
        let second =
            coordinator.run_exclusive("item:post-9", counting_task(&runs, Duration::from_millis(50), Ok(())));
        assert!(coordinator.is_in_flight("item:post-9"));

        let (a, b) = tokio::join!(first, second);
        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert_eq!(a, RevalidationOutcome::Refreshed);
        assert_eq!(a, b);
        assert!(!coordinator.is_in_flight("item:post-9"));
    }

    #[tokio::test]
    async fn test_many_callers_same_failure() {
        let coordinator = RevalidationCoordinator::new();
        let runs = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                coordinator.run_exclusive(
                    "list:1",
                    counting_task(&runs, Duration::from_millis(20), Err(Error::Upstream("HTTP 503".into()))),
                )
            })
            .collect();

        let outcomes = futures_util::future::join_all(handles).await;
        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert!(outcomes.iter().all(|o| matches!(o, RevalidationOutcome::Failed(msg) if msg.contains("HTTP 503"))));
        assert_eq!(coordinator.in_flight_count(), 0);
    }

    #[tokio::test]
    async fn test_distinct_keys_run_independently() {
        let coordinator = RevalidationCoordinator::new();
        let runs = Arc::new(AtomicUsize::new(0));

        let a = coordinator.run_exclusive("a", counting_task(&runs, Duration::from_millis(10), Ok(())));
        let b = coordinator.run_exclusive("b", counting_task(&runs, Duration::from_millis(10), Ok(())));
        let _ = tokio::join!(a, b);
        assert_eq!(runs.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_new_run_after_settle() {
        let coordinator = RevalidationCoordinator::new();
        let runs = Arc::new(AtomicUsize::new(0));

        coordinator
            .run_exclusive("k", counting_task(&runs, Duration::ZERO, Ok(())))
            .await;
        coordinator
            .run_exclusive("k", counting_task(&runs, Duration::ZERO, Ok(())))
            .await;
        assert_eq!(runs.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_dropped_handle_still_runs() {
        let coordinator = RevalidationCoordinator::new();
        let runs = Arc::new(AtomicUsize::new(0));

        drop(coordinator.run_exclusive("k", counting_task(&runs, Duration::from_millis(10), Ok(()))));
        assert_eq!(coordinator.shutdown(Duration::from_secs(1)).await, 0);
        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert!(!coordinator.is_in_flight("k"));
    }

    #[tokio::test]
    async fn test_panicking_task_is_contained() {
        let coordinator = RevalidationCoordinator::new();
        let outcome = coordinator
            .run_exclusive("k", || async {
                if true {
                    panic!("refresh blew up");
                }
                Ok(())
            })
            .await;

        assert!(matches!(outcome, RevalidationOutcome::Failed(_)));
        assert!(!coordinator.is_in_flight("k"));
    }

    #[tokio::test]
    async fn test_panicking_closure_leaves_no_entry() {
        let coordinator = RevalidationCoordinator::new();
        let runs = Arc::new(AtomicUsize::new(0));

        let result = std::panic::catch_unwind(AssertUnwindSafe(|| {
            coordinator.run_exclusive("k", || -> BoxFuture<'static, Result<(), Error>> {
                panic!("could not build refresh");
            })
        }));
        assert!(result.is_err());
        assert!(!coordinator.is_in_flight("k"));

        let outcome = coordinator
            .run_exclusive("k", counting_task(&runs, Duration::ZERO, Ok(())))
            .await;
        assert_eq!(outcome, RevalidationOutcome::Refreshed);
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_shutdown_abandons_stuck_tasks() {
        let coordinator = RevalidationCoordinator::new();
        let runs = Arc::new(AtomicUsize::new(0));

        let handle = coordinator.run_exclusive("stuck", counting_task(&runs, Duration::from_secs(3600), Ok(())));
        tokio::task::yield_now().await;

        let abandoned = coordinator.shutdown(Duration::from_millis(20)).await;
        assert_eq!(abandoned, 1);
        assert_eq!(handle.await, RevalidationOutcome::Abandoned);
    }
}
