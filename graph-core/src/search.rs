//! Search & Highlight (C11): resolves a query to focus/neighbor nodes,
//! ensures they and their neighbors are loaded, centers the camera, and
//! applies a visual override that `clear` can restore exactly.

use rustc_hash::FxHashMap;

use graph_common::config::SearchVisualConfig;

use crate::backend::{GraphBackend, SearchQuery};
use crate::edge_store::EdgeStore;
use crate::error::GraphError;
use crate::model::{EdgeId, Node, NodeId};
use crate::node_store::NodeStore;
use crate::viewport_service::ViewportService;

pub const DEFAULT_K_FOCUS: usize = 3;

#[derive(Clone, Debug, PartialEq)]
pub struct NodeVisualOverride {
    pub color: String,
    pub size_multiplier: f64,
}

#[derive(Clone, Debug, PartialEq)]
pub struct EdgeVisualOverride {
    pub color: String,
    pub size: f64,
}

#[derive(Clone, Debug)]
pub struct HighlightResult {
    pub focus_ids: Vec<NodeId>,
    pub neighbor_ids: Vec<NodeId>,
}

#[derive(Clone, Debug)]
pub struct ClearedHighlight {
    pub node_ids: Vec<NodeId>,
    pub edge_ids: Vec<EdgeId>,
}

/// Snapshot of whatever override (if any) was in effect for an id right
/// before the current highlight overwrote it, so `clear` can restore it
/// exactly rather than just resetting to the config default.
struct ActiveHighlight {
    focus_ids: Vec<NodeId>,
    neighbor_ids: Vec<NodeId>,
    previous_node_overrides: FxHashMap<NodeId, Option<NodeVisualOverride>>,
    previous_edge_overrides: FxHashMap<EdgeId, Option<EdgeVisualOverride>>,
    /// Ids re-pushed to the back of `draw_order`, implementing the
    /// "remove and re-add" trick for edges that must draw on top.
    draw_order: Vec<EdgeId>,
}

pub struct SearchHighlighter {
    node_overrides: FxHashMap<NodeId, NodeVisualOverride>,
    edge_overrides: FxHashMap<EdgeId, EdgeVisualOverride>,
    active: Option<ActiveHighlight>,
}

impl SearchHighlighter {
    pub fn new() -> Self {
        Self { node_overrides: FxHashMap::default(), edge_overrides: FxHashMap::default(), active: None }
    }

    pub fn node_override(&self, id: &NodeId) -> Option<&NodeVisualOverride> {
        self.node_overrides.get(id)
    }

    pub fn edge_override(&self, id: &EdgeId) -> Option<&EdgeVisualOverride> {
        self.edge_overrides.get(id)
    }

    /// Runs a query, ensures the top `k` results and their immediate
    /// neighbors are loaded, centers on the first result, and applies the
    /// focus/neighbor visual override. Clears any highlight already active.
    pub async fn search_and_highlight(
        &mut self,
        backend: &dyn GraphBackend,
        nodes: &mut NodeStore,
        edges: &mut EdgeStore,
        viewport: &mut ViewportService,
        visual: &SearchVisualConfig,
        query: SearchQuery,
        k: usize,
        k_focus: usize,
        now_ms: i64,
    ) -> Result<HighlightResult, GraphError> {
        self.clear();

        let hits = backend
            .search(query.clone())
            .await
            .map_err(|err| GraphError::BackendInvalid { endpoint: "/search".into(), detail: err.to_string() })?;
        if hits.is_empty() {
            return Err(GraphError::SearchNotFound { query: query.q });
        }
        let top: Vec<_> = hits.into_iter().take(k.max(1)).collect();

        let mut loaded_ids = Vec::with_capacity(top.len());
        for hit in &top {
            let id = NodeId::new(hit.id.clone());
            if !nodes.has(&id) {
                match backend.search_node(&hit.id).await {
                    Ok(Some(node)) => {
                        nodes.add(vec![node]);
                    }
                    Ok(None) => continue,
                    Err(err) => {
                        tracing::warn!(id = %hit.id, %err, "failed to fetch search result node");
                        continue;
                    }
                }
            }
            loaded_ids.push(id);
        }
        if loaded_ids.is_empty() {
            return Err(GraphError::SearchNotFound { query: query.q });
        }

        for id in &loaded_ids {
            match backend.edges_for_node(id.as_str()).await {
                Ok(neighbor_edges) => {
                    let mut new_nodes: Vec<Node> = Vec::new();
                    for edge in &neighbor_edges {
                        let other = if &edge.id.a == id { &edge.id.b } else { &edge.id.a };
                        if !nodes.has(other)
                            && let Ok(Some(node)) = backend.search_node(other.as_str()).await
                        {
                            new_nodes.push(node);
                        }
                    }
                    nodes.add(new_nodes);
                    edges.add(neighbor_edges, nodes);
                }
                Err(err) => tracing::warn!(%err, "failed to load neighbors for search result"),
            }
        }

        if let Some(first) = loaded_ids.first()
            && let Some(node) = nodes.get(first)
        {
            viewport.center_on(node.x, node.y, None);
        }

        let k_focus = k_focus.min(loaded_ids.len());
        let focus_ids: Vec<NodeId> = loaded_ids[..k_focus].to_vec();
        let neighbor_ids: Vec<NodeId> = loaded_ids[k_focus..].to_vec();

        let mut previous_node_overrides = FxHashMap::default();
        for id in focus_ids.iter().chain(neighbor_ids.iter()) {
            previous_node_overrides.insert(id.clone(), self.node_overrides.get(id).cloned());
        }
        for id in &focus_ids {
            self.node_overrides.insert(
                id.clone(),
                NodeVisualOverride { color: visual.focus_node_color.clone(), size_multiplier: 2.0 },
            );
        }
        for id in &neighbor_ids {
            self.node_overrides.insert(
                id.clone(),
                NodeVisualOverride { color: visual.neighbor_node_color.clone(), size_multiplier: 1.3 },
            );
        }

        let mut previous_edge_overrides = FxHashMap::default();
        let mut draw_order = Vec::new();
        let result_set: std::collections::HashSet<NodeId> = loaded_ids.iter().cloned().collect();
        for edge in edges.for_nodes(&loaded_ids) {
            let connects_focus = focus_ids.contains(&edge.id.a) || focus_ids.contains(&edge.id.b);
            let both_in_results = result_set.contains(&edge.id.a) && result_set.contains(&edge.id.b);
            if connects_focus && both_in_results {
                previous_edge_overrides.insert(edge.id.clone(), self.edge_overrides.get(&edge.id).cloned());
                self.edge_overrides.insert(
                    edge.id.clone(),
                    EdgeVisualOverride { color: visual.focus_edge_color.clone(), size: visual.focus_edge_size },
                );
                draw_order.push(edge.id.clone());
            }
        }
        for id in &draw_order {
            if let Some(edge) = edges.get_mut(id) {
                edge.highlighted = true;
            }
        }
        let _ = now_ms;

        self.active = Some(ActiveHighlight {
            focus_ids: focus_ids.clone(),
            neighbor_ids: neighbor_ids.clone(),
            previous_node_overrides,
            previous_edge_overrides,
            draw_order,
        });

        Ok(HighlightResult { focus_ids, neighbor_ids })
    }

    /// Restores every overridden node/edge attribute to its pre-highlight
    /// value and clears the active highlight, if any.
    pub fn clear(&mut self) -> Option<ClearedHighlight> {
        let active = self.active.take()?;
        let mut node_ids = Vec::new();
        for (id, previous) in active.previous_node_overrides {
            match previous {
                Some(ov) => {
                    self.node_overrides.insert(id.clone(), ov);
                }
                None => {
                    self.node_overrides.remove(&id);
                }
            }
            node_ids.push(id);
        }
        let mut edge_ids = Vec::new();
        for (id, previous) in active.previous_edge_overrides {
            match previous {
                Some(ov) => {
                    self.edge_overrides.insert(id.clone(), ov);
                }
                None => {
                    self.edge_overrides.remove(&id);
                }
            }
            edge_ids.push(id);
        }
        Some(ClearedHighlight { node_ids, edge_ids })
    }

    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }

    pub fn focus_ids(&self) -> &[NodeId] {
        self.active.as_ref().map(|a| a.focus_ids.as_slice()).unwrap_or(&[])
    }

    pub fn neighbor_ids(&self) -> &[NodeId] {
        self.active.as_ref().map(|a| a.neighbor_ids.as_slice()).unwrap_or(&[])
    }
}

impl Default for SearchHighlighter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::backend::{
        EdgePriority, GraphBounds, NodesBoxQuery, NodesPage, SearchHit, TreeInBoxQuery, TreeInBoxResult,
    };
    use crate::model::{Edge, EdgeKind};

    struct StubBackend;

    fn node(id: &str, x: f64, y: f64) -> Node {
        Node { id: NodeId::new(id), x, y, degree: 1, cluster_id: 0, label: None, tree_level: None, last_seen_ms: 0 }
    }

    #[async_trait]
    impl GraphBackend for StubBackend {
        async fn top_nodes(&self, _: usize, _: Option<&[u32]>, _: u32) -> anyhow::Result<Vec<Node>> {
            Ok(Vec::new())
        }
        async fn nodes_in_box(&self, _: NodesBoxQuery) -> anyhow::Result<NodesPage> {
            unimplemented!()
        }
        async fn tree_in_box(&self, _: TreeInBoxQuery) -> anyhow::Result<TreeInBoxResult> {
            unimplemented!()
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
            Ok(vec![
                SearchHit { id: "a".into(), label: Some("A".into()), score: Some(1.0) },
                SearchHit { id: "b".into(), label: Some("B".into()), score: Some(0.8) },
            ])
        }
        async fn search_suggestions(&self, _: &str, _: usize) -> anyhow::Result<Vec<String>> {
            Ok(Vec::new())
        }
        async fn search_node(&self, id: &str) -> anyhow::Result<Option<Node>> {
            Ok(Some(node(id, 1.0, 2.0)))
        }
    }

    #[tokio::test]
    async fn highlight_then_clear_restores_defaults() {
        let backend = StubBackend;
        let mut nodes = NodeStore::new(5.0);
        let mut edges = EdgeStore::new();
        let mut viewport = ViewportService::new(&graph_common::config::ViewportConfig::default(), std::time::Duration::from_millis(0));
        let mut highlighter = SearchHighlighter::new();
        let visual = SearchVisualConfig::default();

        let result = highlighter
            .search_and_highlight(
                &backend,
                &mut nodes,
                &mut edges,
                &mut viewport,
                &visual,
                SearchQuery { q: "graphs".into(), limit: 10, ..Default::default() },
                10,
                DEFAULT_K_FOCUS,
                0,
            )
            .await
            .unwrap();

        assert_eq!(result.focus_ids.len(), 2);
        assert!(highlighter.node_override(&NodeId::new("a")).is_some());

        let cleared = highlighter.clear().unwrap();
        assert!(cleared.node_ids.contains(&NodeId::new("a")));
        assert!(highlighter.node_override(&NodeId::new("a")).is_none());
        assert!(!highlighter.is_active());
    }

    #[tokio::test]
    async fn empty_results_report_not_found() {
        struct EmptyBackend;
        #[async_trait]
        impl GraphBackend for EmptyBackend {
            async fn top_nodes(&self, _: usize, _: Option<&[u32]>, _: u32) -> anyhow::Result<Vec<Node>> {
                Ok(Vec::new())
            }
            async fn nodes_in_box(&self, _: NodesBoxQuery) -> anyhow::Result<NodesPage> {
                unimplemented!()
            }
            async fn tree_in_box(&self, _: TreeInBoxQuery) -> anyhow::Result<TreeInBoxResult> {
                unimplemented!()
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

        let backend = EmptyBackend;
        let mut nodes = NodeStore::new(5.0);
        let mut edges = EdgeStore::new();
        let mut viewport = ViewportService::new(&graph_common::config::ViewportConfig::default(), std::time::Duration::from_millis(0));
        let mut highlighter = SearchHighlighter::new();

        let err = highlighter
            .search_and_highlight(
                &backend,
                &mut nodes,
                &mut edges,
                &mut viewport,
                &SearchVisualConfig::default(),
                SearchQuery { q: "nothing".into(), ..Default::default() },
                10,
                DEFAULT_K_FOCUS,
                0,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, GraphError::SearchNotFound { .. }));
    }
}
