//! Per-key coalescing of concurrent cache misses.
//!
//! The first caller for a key becomes the leader and runs the fetch; callers
//! arriving while it is in flight await the same shared future instead of
//! issuing their own. The entry is removed as soon as the leader finishes or
//! is dropped, so completed results are never served from here.

use std::{
    future::Future,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
};

use dashmap::{DashMap, mapref::entry::Entry};
use futures::future::{BoxFuture, FutureExt, Shared};
use metrics::counter;

pub(crate) const METRIC_COALESCED_WAIT: &str = "lectern_coalesced_wait_total";

type Flight<T> = Shared<BoxFuture<'static, T>>;

#[derive(Clone)]
pub struct MissCoalescer<T: Clone> {
    inflight: Arc<DashMap<String, (u64, Flight<T>)>>,
    next_id: Arc<AtomicU64>,
}

impl<T> Default for MissCoalescer<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T> MissCoalescer<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self {
            inflight: Arc::new(DashMap::new()),
            next_id: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Run `fetch` for `key` unless an identical fetch is already in flight,
    /// in which case its outcome is shared.
    pub async fn run<F, Fut>(&self, key: &str, fetch: F) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T> + Send + 'static,
    {
        let (flight, guard) = match self.inflight.entry(key.to_string()) {
            Entry::Occupied(occupied) => {
                counter!(METRIC_COALESCED_WAIT).increment(1);
                (occupied.get().1.clone(), None)
            }
            Entry::Vacant(vacant) => {
                let id = self.next_id.fetch_add(1, Ordering::Relaxed);
                let flight = fetch().boxed().shared();
                vacant.insert((id, flight.clone()));
                let guard = FlightGuard {
                    key: key.to_string(),
                    id,
                    inflight: Arc::clone(&self.inflight),
                };
                (flight, Some(guard))
            }
        };

        let outcome = flight.await;
        drop(guard);
        outcome
    }

    /// Number of keys with a fetch currently in flight.
    pub fn in_flight(&self) -> usize {
        self.inflight.len()
    }
}

struct FlightGuard<T: Clone> {
    key: String,
    id: u64,
    inflight: Arc<DashMap<String, (u64, Flight<T>)>>,
}

impl<T: Clone> Drop for FlightGuard<T> {
    fn drop(&mut self) {
        self.inflight
            .remove_if(&self.key, |_, (id, _)| *id == self.id);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    use tokio::sync::Barrier;

    use super::*;

    #[tokio::test]
    async fn concurrent_misses_share_one_fetch() {
        let coalescer = MissCoalescer::<u32>::new();
        let fetches = Arc::new(AtomicUsize::new(0));
        let barrier = Arc::new(Barrier::new(8));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let coalescer = coalescer.clone();
            let fetches = Arc::clone(&fetches);
            let barrier = Arc::clone(&barrier);
            handles.push(tokio::spawn(async move {
                barrier.wait().await;
                coalescer
                    .run("article:1", move || async move {
                        fetches.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(50)).await;
                        7
                    })
                    .await
            }));
        }

        for handle in handles {
            assert_eq!(handle.await.expect("task completes"), 7);
        }
        assert_eq!(fetches.load(Ordering::SeqCst), 1);
        assert_eq!(coalescer.in_flight(), 0);
    }

    #[tokio::test]
    async fn distinct_keys_fetch_independently() {
        let coalescer = MissCoalescer::<&'static str>::new();
        let fetches = Arc::new(AtomicUsize::new(0));

        let first = {
            let fetches = Arc::clone(&fetches);
            coalescer.run("article:1", move || async move {
                fetches.fetch_add(1, Ordering::SeqCst);
                "one"
            })
        };
        let second = {
            let fetches = Arc::clone(&fetches);
            coalescer.run("article:2", move || async move {
                fetches.fetch_add(1, Ordering::SeqCst);
                "two"
            })
        };

        let (first, second) = tokio::join!(first, second);
        assert_eq!((first, second), ("one", "two"));
        assert_eq!(fetches.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn finished_flights_are_not_reused() {
        let coalescer = MissCoalescer::<usize>::new();
        let fetches = Arc::new(AtomicUsize::new(0));

        for expected in 1..=3 {
            let fetches = Arc::clone(&fetches);
            let value = coalescer
                .run("articles_all", move || async move {
                    fetches.fetch_add(1, Ordering::SeqCst) + 1
                })
                .await;
            assert_eq!(value, expected);
        }
    }

    #[tokio::test]
    async fn dropped_leader_releases_the_key() {
        let coalescer = MissCoalescer::<u8>::new();

        let pending = coalescer.run("article:9", || async {
            std::future::pending::<()>().await;
            0
        });
        let timed_out = tokio::time::timeout(Duration::from_millis(10), pending).await;
        assert!(timed_out.is_err());
        assert_eq!(coalescer.in_flight(), 0);

        let value = coalescer.run("article:9", || async { 3 }).await;
        assert_eq!(value, 3);
    }
}
