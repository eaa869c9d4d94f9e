//! Standard (flat) loading strategy: paginated batch fetch of every node in
//! the viewport at the resolved LOD, with adaptive batch sizing and early
//! termination. Grounded on the teacher's worker loop shape (queue through
//! the coordinator, race a timeout, retry transient failures with backoff)
//! generalized from a fixed tile payload to a paginated node/edge fetch.

use graph_common::config::{ApiConfig, LoadingConfig};

use crate::backend::{EdgePriority, GraphBackend, NodesBoxQuery};
use crate::model::{Bounds, LodLevel, Tile, quantize_bounds};
use crate::request_coordinator::{RequestKind, RequestPriority, RequestCoordinator, RequestOutcome};
use crate::spatial_cache::SpatialCache;

use super::{LoadOutcome, LoadStats};

pub struct StandardStrategy;

impl StandardStrategy {
    pub fn new() -> Self {
        Self
    }

    /// Loads every node (and, if `level.load_edges`, every incident edge)
    /// inside `bounds` at `level`, paginating through the backend until
    /// `has_more` is false or an early-termination condition fires.
    #[allow(clippy::too_many_arguments)]
    pub async fn load_viewport(
        &self,
        backend: &dyn GraphBackend,
        requests: &RequestCoordinator,
        cache: &mut SpatialCache,
        level: &LodLevel,
        num_levels: usize,
        bounds: Bounds,
        visible_clusters: Option<&[u32]>,
        loading: &LoadingConfig,
        api: &ApiConfig,
        user_initiated: bool,
        now_ms: i64,
    ) -> anyhow::Result<LoadOutcome> {
        // A level switch (or any new viewport load) supersedes whatever
        // node batches are still in flight for a prior level; let them go
        // rather than let their results land after ours.
        requests.cancel_kind(RequestKind::Nodes);

        let cell_size = 10.0 * (level.index as f64 + 1.0);
        let tile = Tile { spatial_hash: quantize_bounds(&bounds, level.index, cell_size), lod_level: level.index };

        if cache.is_hit(&tile, now_ms) {
            graph_common::metrics::cache_hit(level.index);
            return Ok(LoadOutcome { has_more: false, ..Default::default() });
        }
        graph_common::metrics::cache_miss(level.index);

        let priority = RequestPriority { user_initiated, lod_level: level.index, num_levels };
        let mut batch_size = loading.batch_size.clamp(loading.min_batch_size, loading.max_batch_size);
        let mut offset = 0usize;
        let mut empty_batches = 0usize;
        let mut batches_fetched = 0usize;
        let mut nodes = Vec::new();
        let mut has_more = false;

        loop {
            if batches_fetched * batch_size >= level.max_nodes {
                break;
            }
            let key = format!("nodes:{}:{}:{offset}", tile.lod_level, tile.spatial_hash);
            let query = NodesBoxQuery {
                bounds,
                limit: batch_size,
                offset,
                visible_clusters: visible_clusters.map(|c| c.to_vec()),
                min_degree: level.min_degree,
                light: level.index > 0,
            };

            let page = match self.fetch_with_retry(requests, key, priority, api, move |token| {
                let query = query.clone();
                async move {
                    tokio::select! {
                        _ = token.cancelled() => Err(anyhow::anyhow!("cancelled")),
                        res = backend.nodes_in_box(query) => res,
                    }
                }
            }).await {
                FetchResult::Completed(page) => page,
                FetchResult::GaveUp => break,
            };

            batches_fetched += 1;
            let fetched = page.nodes.len();
            has_more = page.has_more;
            offset += fetched;

            if fetched == 0 {
                empty_batches += 1;
                if loading.early_termination && empty_batches >= loading.max_empty_batches {
                    break;
                }
            } else {
                empty_batches = 0;
                if loading.adaptive_batching && fetched == batch_size {
                    batch_size = (batch_size + batch_size / 2).min(loading.max_batch_size);
                } else if loading.adaptive_batching {
                    batch_size = (batch_size / 2).max(loading.min_batch_size);
                }
            }
            nodes.extend(page.nodes);

            if !has_more {
                break;
            }
            if loading.smart_termination && nodes.len() >= level.max_nodes {
                has_more = true;
                break;
            }
        }

        let mut edges = Vec::new();
        if level.load_edges && !nodes.is_empty() {
            let ids: Vec<String> = nodes.iter().map(|n| n.id.as_str().to_string()).collect();
            let key = format!("edges:{}:{}", tile.lod_level, tile.spatial_hash);
            if let RequestOutcome::Completed(fetched) = requests
                .queue(RequestKind::Edges, key, priority, |token| {
                    let ids = ids.clone();
                    async move {
                        tokio::select! {
                            _ = token.cancelled() => Err(anyhow::anyhow!("cancelled")),
                            res = backend.edges_batch(&ids, loading.max_batch_size, EdgePriority::All) => res,
                        }
                    }
                })
                .await
            {
                edges = fetched;
            }
        }

        cache.insert(tile, nodes.len(), now_ms);

        Ok(LoadOutcome {
            nodes,
            edges,
            broken_edges: Vec::new(),
            has_more,
            stats: LoadStats { batches_fetched, empty_batches, connectivity: None },
        })
    }

    /// Queues `execute` through the coordinator, retrying transient
    /// failures (including a client-side timeout race) up to
    /// `api.max_retries` times with exponential-jitter backoff.
    async fn fetch_with_retry<Fut, T>(
        &self,
        requests: &RequestCoordinator,
        key: String,
        priority: RequestPriority,
        api: &ApiConfig,
        make_execute: impl Fn(tokio_util::sync::CancellationToken) -> Fut,
    ) -> FetchResult<T>
    where
        Fut: std::future::Future<Output = anyhow::Result<T>>,
    {
        let timeout = std::time::Duration::from_millis(api.timeout_ms);
        for attempt in 0..=api.max_retries {
            let outcome = requests
                .queue(RequestKind::Nodes, key.clone(), priority, |token| {
                    let fut = make_execute(token);
                    async move {
                        match tokio::time::timeout(timeout, fut).await {
                            Ok(res) => res,
                            Err(_) => Err(anyhow::anyhow!("request timed out")),
                        }
                    }
                })
                .await;
            match outcome {
                RequestOutcome::Completed(value) => return FetchResult::Completed(value),
                RequestOutcome::Cancelled | RequestOutcome::Stale => return FetchResult::GaveUp,
                RequestOutcome::Failed(err) => {
                    tracing::warn!(%err, attempt, "batch fetch failed, retrying");
                    if attempt < api.max_retries {
                        let delay = graph_common::backoff::full_jitter(
                            std::time::Duration::from_millis(api.retry_delay_ms),
                            std::time::Duration::from_secs(5),
                            attempt,
                        );
                        tokio::time::sleep(delay).await;
                    }
                }
            }
        }
        FetchResult::GaveUp
    }
}

impl Default for StandardStrategy {
    fn default() -> Self {
        Self::new()
    }
}

enum FetchResult<T> {
    Completed(T),
    GaveUp,
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;

    use super::*;
    use crate::backend::{GraphBounds, NodesPage, SearchHit, SearchQuery, TreeInBoxQuery, TreeInBoxResult};
    use crate::model::{Node, NodeId};
    use crate::request_coordinator::CoordinatorConfig;

    struct StubBackend {
        calls: AtomicUsize,
        pages: Vec<NodesPage>,
    }

    #[async_trait]
    impl GraphBackend for StubBackend {
        async fn top_nodes(&self, _: usize, _: Option<&[u32]>, _: u32) -> anyhow::Result<Vec<Node>> {
            Ok(Vec::new())
        }
        async fn nodes_in_box(&self, _query: NodesBoxQuery) -> anyhow::Result<NodesPage> {
            let i = self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.pages.get(i).cloned().unwrap_or(NodesPage { nodes: vec![], has_more: false }))
        }
        async fn tree_in_box(&self, _: TreeInBoxQuery) -> anyhow::Result<TreeInBoxResult> {
            unimplemented!()
        }
        async fn edges_batch(&self, _: &[String], _: usize, _: EdgePriority) -> anyhow::Result<Vec<crate::model::Edge>> {
            Ok(Vec::new())
        }
        async fn edges_for_node(&self, _: &str) -> anyhow::Result<Vec<crate::model::Edge>> {
            Ok(Vec::new())
        }
        async fn bounds(&self) -> anyhow::Result<GraphBounds> {
            unimplemented!()
        }
        async fn search(&self, _: SearchQuery) -> anyhow::Result<Vec<SearchHit>> {
            Ok(Vec::new())
        }
        async fn search_suggestions(&self, _: &str, _: usize) -> anyhow::Result<Vec<String>> {
            Ok(Vec::new())
        }
        async fn search_node(&self, _: &str) -> anyhow::Result<Option<Node>> {
            Ok(None)
        }
    }

    fn node(id: &str) -> Node {
        Node { id: NodeId::new(id), x: 0.0, y: 0.0, degree: 0, cluster_id: 0, label: None, tree_level: None, last_seen_ms: 0 }
    }

    fn level() -> LodLevel {
        LodLevel { index: 0, name: "paper".into(), ratio_upper_bound: 2.0, max_nodes: 100, min_degree: 0, load_edges: false }
    }

    #[tokio::test]
    async fn paginates_until_has_more_is_false() {
        let backend = StubBackend {
            calls: AtomicUsize::new(0),
            pages: vec![
                NodesPage { nodes: vec![node("a"), node("b")], has_more: true },
                NodesPage { nodes: vec![node("c")], has_more: false },
            ],
        };
        let requests = RequestCoordinator::new(CoordinatorConfig {
            max_concurrent: 2,
            throttle: Duration::from_millis(0),
            stale_after: Duration::from_secs(5),
            poll_interval: Duration::from_millis(1),
        });
        let mut cache = SpatialCache::new(10_000, 100);
        let strategy = StandardStrategy::new();
        let loading = LoadingConfig { adaptive_batching: false, ..LoadingConfig::default() };
        let api = ApiConfig::default();

        let outcome = strategy
            .load_viewport(
                &backend,
                &requests,
                &mut cache,
                &level(),
                4,
                Bounds::new(0.0, 10.0, 0.0, 10.0),
                None,
                &loading,
                &api,
                true,
                0,
            )
            .await
            .unwrap();

        assert_eq!(outcome.nodes.len(), 3);
        assert!(!outcome.has_more);
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn cached_tile_short_circuits_the_fetch() {
        let backend = Arc::new(StubBackend { calls: AtomicUsize::new(0), pages: vec![] });
        let requests = RequestCoordinator::new(CoordinatorConfig::default());
        let mut cache = SpatialCache::new(10_000, 100);
        let bounds = Bounds::new(0.0, 10.0, 0.0, 10.0);
        let lvl = level();
        let cell_size = 10.0 * (lvl.index as f64 + 1.0);
        let tile = Tile { spatial_hash: quantize_bounds(&bounds, lvl.index, cell_size), lod_level: lvl.index };
        cache.insert(tile, 5, 0);

        let strategy = StandardStrategy::new();
        let outcome = strategy
            .load_viewport(
                backend.as_ref(),
                &requests,
                &mut cache,
                &lvl,
                4,
                bounds,
                None,
                &LoadingConfig::default(),
                &ApiConfig::default(),
                false,
                1,
            )
            .await
            .unwrap();
        assert!(outcome.nodes.is_empty());
        assert_eq!(backend.calls.load(Ordering::SeqCst), 0);
    }
}
