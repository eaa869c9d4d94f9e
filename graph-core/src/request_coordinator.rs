//! Request Coordinator (C1): dedupe, prioritize, throttle and cancel the
//! fetches every loading strategy issues. Grounded on the teacher's
//! coarse-first priority queue (`priority_queue.rs`) and cancellable worker
//! loop (`worker.rs`), generalized from a fixed tile-fetch payload to an
//! arbitrary caller-supplied async closure.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use tokio_util::sync::CancellationToken;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum RequestKind {
    Bounds,
    Nodes,
    Edges,
    Stats,
}

impl RequestKind {
    fn base_priority(self) -> i64 {
        match self {
            RequestKind::Bounds => 3_000,
            RequestKind::Nodes => 2_000,
            RequestKind::Edges => 1_000,
            RequestKind::Stats => 0,
        }
    }

    pub fn as_metric_label(self) -> &'static str {
        match self {
            RequestKind::Bounds => "bounds",
            RequestKind::Nodes => "nodes",
            RequestKind::Edges => "edges",
            RequestKind::Stats => "stats",
        }
    }
}

#[derive(Clone, Copy, Debug)]
pub struct RequestPriority {
    pub user_initiated: bool,
    pub lod_level: usize,
    pub num_levels: usize,
}

impl RequestPriority {
    pub fn background(lod_level: usize, num_levels: usize) -> Self {
        Self { user_initiated: false, lod_level, num_levels }
    }

    fn score(self, kind: RequestKind) -> i64 {
        let mut score = kind.base_priority();
        if self.user_initiated {
            score += 500;
        }
        if self.num_levels > 0 {
            // Finer LOD (lower index) = more detail = more urgent.
            let finer_bonus = (self.num_levels - self.lod_level.min(self.num_levels - 1)) as i64;
            score += finer_bonus * 10;
        }
        score
    }
}

pub enum RequestOutcome<T> {
    Completed(T),
    /// Cancelled (superseded by a dedup replacement, or an explicit cancel).
    /// Not an error: callers should treat this as "nothing to do".
    Cancelled,
    /// Dropped before it ran because it sat in the queue past `stale_after`.
    Stale,
    /// The execute closure itself returned an error (e.g. a timeout);
    /// retrying is the caller's decision, the coordinator never retries.
    Failed(anyhow::Error),
}

#[derive(Clone, Debug)]
pub struct CoordinatorConfig {
    pub max_concurrent: usize,
    pub throttle: Duration,
    pub stale_after: Duration,
    pub poll_interval: Duration,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            max_concurrent: 3,
            throttle: Duration::from_millis(100),
            stale_after: Duration::from_secs(15),
            poll_interval: Duration::from_millis(15),
        }
    }
}

struct Ticket {
    id: u64,
    priority: i64,
}

impl PartialEq for Ticket {
    fn eq(&self, other: &Self) -> bool {
        self.priority == other.priority && self.id == other.id
    }
}
impl Eq for Ticket {}
impl PartialOrd for Ticket {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for Ticket {
    fn cmp(&self, other: &Self) -> Ordering {
        match self.priority.cmp(&other.priority) {
            // FIFO within the same priority: lower id (earlier) wins, and
            // BinaryHeap is a max-heap so we reverse the id comparison.
            Ordering::Equal => other.id.cmp(&self.id),
            ord => ord,
        }
    }
}

/// `generation` is the ticket id of whichever `queue()` call currently owns
/// `key`'s slot in `active`. A call only clears the entry it itself
/// installed, so a dedup replacement (which bumps the generation) is never
/// clobbered by the call it replaced finishing late.
struct ActiveEntry {
    kind: RequestKind,
    token: CancellationToken,
    generation: u64,
}

struct Inner {
    active: FxHashMap<String, ActiveEntry>,
    pending: BinaryHeap<Ticket>,
    running: usize,
    last_start: Option<Instant>,
    next_seq: u64,
}

/// The single request coordinator for a `GraphCoordinator`. Per spec §5 this
/// is a process-wide singleton per coordinator instance, created with
/// `initialize` and reset with `destroy`/`emergency_reset`.
pub struct RequestCoordinator {
    inner: Mutex<Inner>,
    config: CoordinatorConfig,
}

impl RequestCoordinator {
    pub fn new(config: CoordinatorConfig) -> Self {
        Self {
            inner: Mutex::new(Inner {
                active: FxHashMap::default(),
                pending: BinaryHeap::new(),
                running: 0,
                last_start: None,
                next_seq: 0,
            }),
            config,
        }
    }

    /// Queues `execute` under `key`, cancelling and replacing any request
    /// already active or queued with the same key (dedup), and waits for an
    /// admission slot before running it. `execute` receives a token it
    /// should race against via `tokio::select!`.
    pub async fn queue<F, Fut, T>(
        &self,
        kind: RequestKind,
        key: impl Into<String>,
        priority: RequestPriority,
        execute: F,
    ) -> RequestOutcome<T>
    where
        F: FnOnce(CancellationToken) -> Fut,
        Fut: std::future::Future<Output = anyhow::Result<T>>,
    {
        let key = key.into();
        let token = CancellationToken::new();
        let enqueued_at = Instant::now();

        let ticket_id = {
            let mut inner = self.inner.lock();
            if let Some(previous) = inner.active.remove(&key) {
                previous.token.cancel();
            }
            let id = inner.next_seq;
            inner.next_seq += 1;
            inner
                .active
                .insert(key.clone(), ActiveEntry { kind, token: token.clone(), generation: id });
            inner.pending.push(Ticket { id, priority: priority.score(kind) });
            id
        };
        graph_common::metrics::request_queued(kind.as_metric_label());

        loop {
            if token.is_cancelled() {
                self.forget(&key, ticket_id);
                graph_common::metrics::request_dropped(kind.as_metric_label(), "cancelled");
                return RequestOutcome::Cancelled;
            }
            if enqueued_at.elapsed() > self.config.stale_after {
                self.forget(&key, ticket_id);
                graph_common::metrics::request_dropped(kind.as_metric_label(), "stale");
                return RequestOutcome::Stale;
            }

            let admitted = {
                let mut inner = self.inner.lock();
                let throttle_elapsed = inner
                    .last_start
                    .map(|t| t.elapsed() >= self.config.throttle)
                    .unwrap_or(true);
                let is_next = matches!(inner.pending.peek(), Some(top) if top.id == ticket_id);
                if inner.running < self.config.max_concurrent && throttle_elapsed && is_next {
                    inner.pending.pop();
                    inner.running += 1;
                    inner.last_start = Some(Instant::now());
                    true
                } else {
                    false
                }
            };

            if admitted {
                break;
            }
            tokio::time::sleep(self.config.poll_interval).await;
        }

        let start = Instant::now();
        let result = tokio::select! {
            _ = token.cancelled() => Err(anyhow::anyhow!("cancelled")),
            res = execute(token.clone()) => res,
        };

        {
            let mut inner = self.inner.lock();
            inner.running = inner.running.saturating_sub(1);
        }
        self.forget(&key, ticket_id);

        if token.is_cancelled() {
            graph_common::metrics::request_dropped(kind.as_metric_label(), "cancelled");
            return RequestOutcome::Cancelled;
        }

        match result {
            Ok(value) => {
                graph_common::metrics::request_completed(
                    kind.as_metric_label(),
                    start.elapsed().as_secs_f64(),
                );
                RequestOutcome::Completed(value)
            }
            Err(err) => RequestOutcome::Failed(err),
        }
    }

    /// Removes `key`'s active entry iff it's still the one this ticket
    /// installed, and drops any leftover pending ticket for it.
    fn forget(&self, key: &str, ticket_id: u64) {
        let mut inner = self.inner.lock();
        if matches!(inner.active.get(key), Some(entry) if entry.generation == ticket_id) {
            inner.active.remove(key);
        }
        inner.pending.retain(|t| t.id != ticket_id);
    }

    /// Cancels the active/queued request for `key`, if any.
    pub fn cancel_key(&self, key: &str) {
        let mut inner = self.inner.lock();
        if let Some(entry) = inner.active.remove(key) {
            entry.token.cancel();
        }
    }

    /// Cancels every active/queued request of `kind`.
    pub fn cancel_kind(&self, kind: RequestKind) {
        let mut inner = self.inner.lock();
        let keys: Vec<String> = inner
            .active
            .iter()
            .filter(|(_, e)| e.kind == kind)
            .map(|(k, _)| k.clone())
            .collect();
        for key in keys {
            if let Some(entry) = inner.active.remove(&key) {
                entry.token.cancel();
            }
        }
    }

    /// Aborts everything and clears the queue. Called from
    /// `GraphCoordinator::destroy`.
    pub fn emergency_reset(&self) {
        let mut inner = self.inner.lock();
        for (_, entry) in inner.active.drain() {
            entry.token.cancel();
        }
        inner.pending.clear();
        inner.running = 0;
        inner.last_start = None;
    }

    pub fn active_count(&self) -> usize {
        self.inner.lock().active.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn completes_and_clears_active_entry() {
        let coordinator = RequestCoordinator::new(CoordinatorConfig {
            max_concurrent: 2,
            throttle: Duration::from_millis(0),
            stale_after: Duration::from_secs(5),
            poll_interval: Duration::from_millis(1),
        });

        let outcome = coordinator
            .queue(
                RequestKind::Nodes,
                "tile-1",
                RequestPriority::background(0, 4),
                |_token| async { Ok::<_, anyhow::Error>(42) },
            )
            .await;

        assert!(matches!(outcome, RequestOutcome::Completed(42)));
        assert_eq!(coordinator.active_count(), 0);
    }

    #[tokio::test]
    async fn dedup_cancels_the_request_it_replaces() {
        use std::sync::Arc;

        let coordinator = Arc::new(RequestCoordinator::new(CoordinatorConfig {
            max_concurrent: 1,
            throttle: Duration::from_millis(0),
            stale_after: Duration::from_secs(5),
            poll_interval: Duration::from_millis(1),
        }));

        let c1 = coordinator.clone();
        let first = tokio::spawn(async move {
            c1.queue(RequestKind::Nodes, "dup", RequestPriority::background(0, 4), |token| async move {
                token.cancelled().await;
                Ok::<_, anyhow::Error>(1)
            })
            .await
        });

        tokio::time::sleep(Duration::from_millis(10)).await;

        let second = coordinator
            .queue(RequestKind::Nodes, "dup", RequestPriority::background(0, 4), |_token| async {
                Ok::<_, anyhow::Error>(2)
            })
            .await;

        let first_outcome = first.await.unwrap();
        assert!(matches!(first_outcome, RequestOutcome::Cancelled));
        assert!(matches!(second, RequestOutcome::Completed(2)));
    }

    #[tokio::test]
    async fn concurrency_cap_is_respected() {
        use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};
        use std::sync::Arc;

        let coordinator = Arc::new(RequestCoordinator::new(CoordinatorConfig {
            max_concurrent: 2,
            throttle: Duration::from_millis(0),
            stale_after: Duration::from_secs(5),
            poll_interval: Duration::from_millis(1),
        }));
        let concurrent = Arc::new(AtomicUsize::new(0));
        let max_seen = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for i in 0..6 {
            let coordinator = coordinator.clone();
            let concurrent = concurrent.clone();
            let max_seen = max_seen.clone();
            handles.push(tokio::spawn(async move {
                coordinator
                    .queue(
                        RequestKind::Nodes,
                        format!("key-{i}"),
                        RequestPriority::background(0, 4),
                        move |_token| {
                            let concurrent = concurrent.clone();
                            let max_seen = max_seen.clone();
                            async move {
                                let now = concurrent.fetch_add(1, AtomicOrdering::SeqCst) + 1;
                                max_seen.fetch_max(now, AtomicOrdering::SeqCst);
                                tokio::time::sleep(Duration::from_millis(20)).await;
                                concurrent.fetch_sub(1, AtomicOrdering::SeqCst);
                                Ok::<_, anyhow::Error>(())
                            }
                        },
                    )
                    .await
            }));
        }
        for h in handles {
            let _ = h.await;
        }
        assert!(max_seen.load(AtomicOrdering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn stale_request_is_dropped_before_executing() {
        let coordinator = RequestCoordinator::new(CoordinatorConfig {
            max_concurrent: 0,
            throttle: Duration::from_millis(0),
            stale_after: Duration::from_millis(5),
            poll_interval: Duration::from_millis(1),
        });

        let outcome = coordinator
            .queue(
                RequestKind::Nodes,
                "never-runs",
                RequestPriority::background(0, 4),
                |_token| async { Ok::<_, anyhow::Error>(()) },
            )
            .await;

        assert!(matches!(outcome, RequestOutcome::Stale));
    }
}
