//! Tree-first loading strategy: one atomic tree-in-box request per tile,
//! disconnected-node repair before the fragment is committed, and
//! dwell-triggered enrichment with extra edges and broken-edge tree paths.

use graph_common::config::{ApiConfig, LoadingConfig};

use crate::backend::{EdgePriority, GraphBackend, TreeInBoxQuery};
use crate::model::{Bounds, Edge, LodLevel, Node, NodeId, Tile, quantize_bounds};
use crate::request_coordinator::{RequestCoordinator, RequestKind, RequestOutcome, RequestPriority};
use crate::spatial_cache::SpatialCache;
use crate::tree_state::TreeStateManager;

use super::{LoadOutcome, LoadStats};

/// Bounds a repair walk climbs before giving up and reporting the node as
/// disconnected (spec doesn't name a dedicated path endpoint; we climb via
/// `edges_for_node` instead, so a cap avoids walking an unbounded DAG).
const MAX_REPAIR_HOPS: usize = 32;

pub struct TreeFirstStrategy;

impl TreeFirstStrategy {
    pub fn new() -> Self {
        Self
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn load_viewport(
        &self,
        backend: &dyn GraphBackend,
        requests: &RequestCoordinator,
        cache: &mut SpatialCache,
        tree_state: &mut TreeStateManager,
        level: &LodLevel,
        num_levels: usize,
        bounds: Bounds,
        visible_clusters: Option<&[u32]>,
        loading: &LoadingConfig,
        api: &ApiConfig,
        user_initiated: bool,
        now_ms: i64,
    ) -> anyhow::Result<LoadOutcome> {
        let cell_size = 10.0 * (level.index as f64 + 1.0);
        let tile = Tile { spatial_hash: quantize_bounds(&bounds, level.index, cell_size), lod_level: level.index };

        if cache.is_hit(&tile, now_ms) {
            graph_common::metrics::cache_hit(level.index);
            return Ok(LoadOutcome { has_more: false, ..Default::default() });
        }
        graph_common::metrics::cache_miss(level.index);

        let priority = RequestPriority { user_initiated, lod_level: level.index, num_levels };
        let key = format!("tree:{}:{}", tile.lod_level, tile.spatial_hash);
        let timeout = std::time::Duration::from_secs(5);
        let query = TreeInBoxQuery {
            bounds,
            max_nodes: level.max_nodes,
            min_degree: level.min_degree,
            offset: 0,
            edge_type: None,
            visible_clusters: visible_clusters.map(|c| c.to_vec()),
        };

        let outcome = requests
            .queue(RequestKind::Nodes, key, priority, move |token| {
                let query = query.clone();
                async move {
                    tokio::select! {
                        _ = token.cancelled() => Err(anyhow::anyhow!("cancelled")),
                        res = tokio::time::timeout(timeout, backend.tree_in_box(query)) => {
                            res.map_err(|_| anyhow::anyhow!("tree-in-box timed out"))?
                        }
                    }
                }
            })
            .await;

        let fragment = match outcome {
            RequestOutcome::Completed(fragment) => fragment,
            RequestOutcome::Cancelled | RequestOutcome::Stale => {
                return Ok(LoadOutcome { has_more: false, ..Default::default() });
            }
            RequestOutcome::Failed(err) => return Err(err),
        };

        let tree_edge_pairs: Vec<(NodeId, NodeId)> = fragment
            .tree_edges
            .iter()
            .map(|e| (e.id.a.clone(), e.id.b.clone()))
            .collect();
        let node_ids: Vec<NodeId> = fragment.nodes.iter().map(|n| n.id.clone()).collect();
        tree_state.ingest_fragment(
            bounds,
            level.index,
            node_ids.clone(),
            tree_edge_pairs,
            fragment.broken_edges.clone(),
            now_ms,
        );
        for n in &fragment.nodes {
            if n.tree_level == Some(0) {
                tree_state.mark_root(n.id.clone());
            }
        }

        // Repair: any node the fragment delivered without a path to a root
        // must be connected before the fragment is committed visually.
        let disconnected = tree_state.find_disconnected(node_ids.iter());
        let mut repaired_nodes = Vec::new();
        let mut repaired_edges = Vec::new();
        for id in &disconnected {
            match self.repair_path(backend, requests, tree_state, priority, id, now_ms).await {
                Ok((nodes, edges)) => {
                    repaired_nodes.extend(nodes);
                    repaired_edges.extend(edges);
                }
                Err(err) => {
                    tracing::warn!(node = %id, %err, "could not repair tree path, node stays disconnected");
                }
            }
        }

        let mut nodes = fragment.nodes;
        nodes.extend(repaired_nodes);
        let mut edges = fragment.tree_edges;
        edges.extend(repaired_edges);

        cache.insert(tile, nodes.len(), now_ms);

        Ok(LoadOutcome {
            nodes,
            edges,
            broken_edges: fragment.broken_edges,
            has_more: fragment.has_more,
            stats: LoadStats { batches_fetched: 1, empty_batches: 0, connectivity: fragment.connectivity },
        })
    }

    /// Climbs tree-edge parents from `node_id` via `edges_for_node` until it
    /// reaches a node the tree state already considers connected (or a
    /// root), or exhausts `MAX_REPAIR_HOPS`.
    async fn repair_path(
        &self,
        backend: &dyn GraphBackend,
        requests: &RequestCoordinator,
        tree_state: &mut TreeStateManager,
        priority: RequestPriority,
        node_id: &NodeId,
        now_ms: i64,
    ) -> anyhow::Result<(Vec<Node>, Vec<Edge>)> {
        let mut nodes = Vec::new();
        let mut edges = Vec::new();
        let mut current = node_id.clone();

        for _ in 0..MAX_REPAIR_HOPS {
            if tree_state.is_connected(&current) {
                return Ok((nodes, edges));
            }
            let key = format!("repair:{current}");
            let edges_for_current = requests
                .queue(RequestKind::Edges, key, priority, |token| {
                    let current = current.clone();
                    async move {
                        tokio::select! {
                            _ = token.cancelled() => Err(anyhow::anyhow!("cancelled")),
                            res = backend.edges_for_node(current.as_str()) => res,
                        }
                    }
                })
                .await;
            let incident = match edges_for_current {
                RequestOutcome::Completed(edges) => edges,
                RequestOutcome::Cancelled | RequestOutcome::Stale => {
                    return Err(anyhow::anyhow!("repair walk for {current} was cancelled"));
                }
                RequestOutcome::Failed(err) => return Err(err),
            };
            let Some(parent_edge) = incident.iter().find(|e| {
                matches!(e.kind, crate::model::EdgeKind::Tree) && (e.id.a == current || e.id.b == current)
            }) else {
                return Err(anyhow::anyhow!("no tree-edge parent found for {current}"));
            };
            let parent = if parent_edge.id.a == current { parent_edge.id.b.clone() } else { parent_edge.id.a.clone() };

            let Some(parent_node) = backend.search_node(parent.as_str()).await.ok().flatten() else {
                return Err(anyhow::anyhow!("parent node {parent} could not be fetched"));
            };

            tree_state.ingest_fragment(
                Bounds::new(parent_node.x, parent_node.x, parent_node.y, parent_node.y),
                0,
                vec![parent.clone(), current.clone()],
                vec![(parent.clone(), current.clone())],
                Vec::new(),
                now_ms,
            );
            nodes.push(parent_node);
            edges.push(parent_edge.clone());
            current = parent;
        }
        Err(anyhow::anyhow!("exceeded max repair hops for {node_id}"))
    }

    /// Dwell enrichment: extra edges whose both endpoints are loaded, and
    /// tree paths for broken edges whose target is now inside `bounds`.
    pub async fn enrich(
        &self,
        backend: &dyn GraphBackend,
        requests: &RequestCoordinator,
        tree_state: &TreeStateManager,
        loaded_ids: &[NodeId],
        bounds: &Bounds,
        loading: &LoadingConfig,
    ) -> anyhow::Result<Vec<Edge>> {
        let priority = RequestPriority::background(0, 1);
        let ids: Vec<String> = loaded_ids.iter().map(|id| id.as_str().to_string()).collect();
        let key = format!("enrich:{}", quantize_bounds(bounds, 0, 10.0));

        let extra = requests
            .queue(RequestKind::Edges, key, priority, move |token| {
                let ids = ids.clone();
                async move {
                    tokio::select! {
                        _ = token.cancelled() => Err(anyhow::anyhow!("cancelled")),
                        res = backend.edges_batch(&ids, loading.max_batch_size, EdgePriority::Extra) => res,
                    }
                }
            })
            .await;

        let mut edges = match extra {
            RequestOutcome::Completed(edges) => edges,
            RequestOutcome::Cancelled | RequestOutcome::Stale => Vec::new(),
            RequestOutcome::Failed(err) => return Err(err),
        };

        let candidates = tree_state.enrichment_candidates(bounds);
        for broken in candidates {
            let target = broken.target.clone();
            let key = format!("repair:{target}");
            let outcome = requests
                .queue(RequestKind::Edges, key, priority, |token| {
                    let target = target.clone();
                    async move {
                        tokio::select! {
                            _ = token.cancelled() => Err(anyhow::anyhow!("cancelled")),
                            res = backend.edges_for_node(target.as_str()) => res,
                        }
                    }
                })
                .await;
            if let RequestOutcome::Completed(found) = outcome {
                edges.extend(found);
            }
        }
        Ok(edges)
    }
}

impl Default for TreeFirstStrategy {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::backend::{GraphBounds, NodesBoxQuery, NodesPage, SearchHit, SearchQuery, TreeInBoxResult};
    use crate::model::{BrokenEdge, EdgeId, EdgeKind};
    use crate::request_coordinator::CoordinatorConfig;

    fn node(id: &str, x: f64, y: f64) -> Node {
        Node { id: NodeId::new(id), x, y, degree: 0, cluster_id: 0, label: None, tree_level: None, last_seen_ms: 0 }
    }

    struct StubBackend;

    #[async_trait]
    impl GraphBackend for StubBackend {
        async fn top_nodes(&self, _: usize, _: Option<&[u32]>, _: u32) -> anyhow::Result<Vec<Node>> {
            Ok(Vec::new())
        }
        async fn nodes_in_box(&self, _: NodesBoxQuery) -> anyhow::Result<NodesPage> {
            unimplemented!()
        }
        async fn tree_in_box(&self, _query: TreeInBoxQuery) -> anyhow::Result<TreeInBoxResult> {
            let root = node("root", 0.0, 0.0);
            let child = node("child", 1.0, 1.0);
            Ok(TreeInBoxResult {
                nodes: vec![root.clone(), child.clone()],
                tree_edges: vec![Edge {
                    id: EdgeId::new(root.id.clone(), child.id.clone()),
                    kind: EdgeKind::Tree,
                    highlighted: false,
                }],
                broken_edges: vec![BrokenEdge {
                    source: child.id,
                    target: NodeId::new("far"),
                    target_x: 500.0,
                    target_y: 500.0,
                    reason: "outside fragment".into(),
                }],
                has_more: false,
                node_count: 2,
                edge_count: 1,
                connectivity: Some(1.0),
            })
        }
        async fn edges_batch(&self, _: &[String], _: usize, _: EdgePriority) -> anyhow::Result<Vec<Edge>> {
            Ok(Vec::new())
        }
        async fn edges_for_node(&self, _: &str) -> anyhow::Result<Vec<Edge>> {
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

    fn level() -> LodLevel {
        LodLevel { index: 0, name: "paper".into(), ratio_upper_bound: 2.0, max_nodes: 100, min_degree: 0, load_edges: true }
    }

    #[tokio::test]
    async fn fully_connected_fragment_needs_no_repair() {
        let backend = StubBackend;
        let requests = RequestCoordinator::new(CoordinatorConfig::default());
        let mut cache = SpatialCache::new(10_000, 100);
        let mut tree_state = TreeStateManager::new();
        tree_state.mark_root(NodeId::new("root"));
        let strategy = TreeFirstStrategy::new();

        let outcome = strategy
            .load_viewport(
                &backend,
                &requests,
                &mut cache,
                &mut tree_state,
                &level(),
                4,
                Bounds::new(0.0, 10.0, 0.0, 10.0),
                None,
                &LoadingConfig::default(),
                &ApiConfig::default(),
                true,
                0,
            )
            .await
            .unwrap();

        assert_eq!(outcome.nodes.len(), 2);
        assert_eq!(outcome.broken_edges.len(), 1);
        assert!(tree_state.is_connected(&NodeId::new("child")));
    }
}
