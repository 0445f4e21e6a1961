//! Bounded-concurrency dispatch of independent work units.
//!
//! Units run concurrently up to a fixed limit, each under a soft timeout.
//! Cancelling stops the dispatch: results already completed are kept,
//! in-flight units are dropped and no new units start.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use futures_util::stream::{self, StreamExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Concurrency limit and per-unit timeout for one phase.
#[derive(Debug, Clone, Copy)]
pub struct Dispatcher {
    max_concurrency: usize,
    unit_timeout: Duration,
}

/// Outcome of a dispatch.
#[derive(Debug)]
pub struct DispatchReport<R> {
    /// Results of units that completed, in completion order.
    pub completed: Vec<R>,
    /// Units that returned an error.
    pub failed: usize,
    /// Units that exceeded the per-unit timeout.
    pub timed_out: usize,
    /// Whether the dispatch stopped because of cancellation.
    pub cancelled: bool,
}

impl<R> Default for DispatchReport<R> {
    fn default() -> Self {
        Self {
            completed: Vec::new(),
            failed: 0,
            timed_out: 0,
            cancelled: false,
        }
    }
}

impl Dispatcher {
    /// Create a dispatcher. A concurrency of zero is treated as one.
    #[must_use]
    pub fn new(max_concurrency: usize, unit_timeout: Duration) -> Self {
        Self {
            max_concurrency: max_concurrency.max(1),
            unit_timeout,
        }
    }

    #[must_use]
    pub const fn max_concurrency(&self) -> usize {
        self.max_concurrency
    }

    /// Run `unit` over every item.
    ///
    /// Failed and timed-out units are logged and counted; they never affect
    /// their siblings.
    pub async fn run<I, T, R, E, F, Fut>(
        &self,
        items: I,
        unit: F,
        cancel: &CancellationToken,
    ) -> DispatchReport<R>
    where
        I: IntoIterator<Item = T>,
        F: Fn(T) -> Fut,
        Fut: Future<Output = Result<R, E>>,
        E: Display,
    {
        let timeout = self.unit_timeout;
        let unit = &unit;
        let mut results = std::pin::pin!(stream::iter(items)
            .map(|item| async move { tokio::time::timeout(timeout, unit(item)).await })
            .buffer_unordered(self.max_concurrency));

        let mut report = DispatchReport::default();

        loop {
            tokio::select! {
                biased;
                () = cancel.cancelled() => {
                    report.cancelled = true;
                    break;
                }
                next = results.next() => match next {
                    Some(Ok(Ok(result))) => report.completed.push(result),
                    Some(Ok(Err(e))) => {
                        report.failed += 1;
                        warn!("Work unit failed: {e:#}");
                    }
                    Some(Err(_)) => {
                        report.timed_out += 1;
                        warn!(timeout_secs = timeout.as_secs(), "Work unit timed out");
                    }
                    None => break,
                },
            }
        }

        debug!(
            completed = report.completed.len(),
            failed = report.failed,
            timed_out = report.timed_out,
            cancelled = report.cancelled,
            "Dispatch finished"
        );

        report
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use super::*;

    #[tokio::test]
    async fn test_collects_all_results() {
        let dispatcher = Dispatcher::new(3, Duration::from_secs(5));
        let cancel = CancellationToken::new();

        let report = dispatcher
            .run(1..=10u32, |n| async move { Ok::<_, String>(n * 2) }, &cancel)
            .await;

        let mut completed = report.completed;
        completed.sort_unstable();
        assert_eq!(completed, (1..=10).map(|n| n * 2).collect::<Vec<_>>());
        assert_eq!(report.failed, 0);
        assert!(!report.cancelled);
    }

    #[tokio::test]
    async fn test_failures_do_not_affect_siblings() {
        let dispatcher = Dispatcher::new(2, Duration::from_secs(5));
        let cancel = CancellationToken::new();

        let report = dispatcher
            .run(
                1..=6u32,
                |n| async move {
                    if n % 3 == 0 {
                        Err(format!("unit {n} broke"))
                    } else {
                        Ok(n)
                    }
                },
                &cancel,
            )
            .await;

        assert_eq!(report.completed.len(), 4);
        assert_eq!(report.failed, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_is_counted() {
        let dispatcher = Dispatcher::new(2, Duration::from_secs(1));
        let cancel = CancellationToken::new();

        let report = dispatcher
            .run(
                [0u64, 10],
                |secs| async move {
                    tokio::time::sleep(Duration::from_secs(secs)).await;
                    Ok::<_, String>(secs)
                },
                &cancel,
            )
            .await;

        assert_eq!(report.completed, vec![0]);
        assert_eq!(report.timed_out, 1);
    }

    #[tokio::test]
    async fn test_concurrency_is_bounded() {
        let dispatcher = Dispatcher::new(2, Duration::from_secs(5));
        let cancel = CancellationToken::new();
        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let report = dispatcher
            .run(
                0..8,
                |_| {
                    let in_flight = Arc::clone(&in_flight);
                    let peak = Arc::clone(&peak);
                    async move {
                        let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                        peak.fetch_max(now, Ordering::SeqCst);
                        tokio::task::yield_now().await;
                        in_flight.fetch_sub(1, Ordering::SeqCst);
                        Ok::<_, String>(())
                    }
                },
                &cancel,
            )
            .await;

        assert_eq!(report.completed.len(), 8);
        assert!(peak.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn test_cancel_keeps_completed_results() {
        let dispatcher = Dispatcher::new(1, Duration::from_secs(60));
        let cancel = CancellationToken::new();

        let report = dispatcher
            .run(
                0..10u32,
                |n| {
                    let cancel = cancel.clone();
                    async move {
                        if n >= 4 {
                            cancel.cancel();
                            std::future::pending::<()>().await;
                        }
                        Ok::<_, String>(n)
                    }
                },
                &cancel,
            )
            .await;

        assert!(report.cancelled);
        assert_eq!(report.completed, vec![0, 1, 2, 3]);
    }

    #[tokio::test]
    async fn test_already_cancelled_runs_nothing() {
        let dispatcher = Dispatcher::new(4, Duration::from_secs(60));
        let cancel = CancellationToken::new();
        cancel.cancel();

        let report = dispatcher
            .run(0..10u32, |n| async move { Ok::<_, String>(n) }, &cancel)
            .await;

        assert!(report.cancelled);
        assert!(report.completed.is_empty());
    }
}
