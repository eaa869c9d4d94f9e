//! The abstract backend boundary (spec §6). `graph-core` only ever calls
//! through this trait; the HTTP/JSON implementation lives in [`http`], and
//! tests use an in-process stub.

pub mod http;

use async_trait::async_trait;

use crate::model::{Bounds, Edge, Node};

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum EdgePriority {
    All,
    Tree,
    Extra,
}

#[derive(Clone, Debug, Default)]
pub struct NodesBoxQuery {
    pub bounds: Bounds,
    pub limit: usize,
    pub offset: usize,
    pub visible_clusters: Option<Vec<u32>>,
    pub min_degree: u32,
    /// `/nodes/box/light` strips attributes down to x, y, size, degree[,
    /// color] — the client only distinguishes it by which fields it reads
    /// out of the response, so the trait surface stays identical.
    pub light: bool,
}

#[derive(Clone, Debug)]
pub struct NodesPage {
    pub nodes: Vec<Node>,
    pub has_more: bool,
}

#[derive(Clone, Debug, Default)]
pub struct TreeInBoxQuery {
    pub bounds: Bounds,
    pub max_nodes: usize,
    pub min_degree: u32,
    pub offset: usize,
    pub edge_type: Option<String>,
    pub visible_clusters: Option<Vec<u32>>,
}

#[derive(Clone, Debug)]
pub struct TreeInBoxResult {
    pub nodes: Vec<Node>,
    pub tree_edges: Vec<Edge>,
    pub broken_edges: Vec<crate::model::BrokenEdge>,
    pub has_more: bool,
    pub node_count: usize,
    pub edge_count: usize,
    pub connectivity: Option<f64>,
}

#[derive(Clone, Debug)]
pub struct GraphBounds {
    pub bounds: Bounds,
    pub total_nodes: u64,
}

#[derive(Clone, Debug, Default)]
pub struct SearchQuery {
    pub q: String,
    pub limit: usize,
    pub offset: usize,
    pub include_abstract: bool,
    pub min_citations: Option<u32>,
    pub year_from: Option<u32>,
    pub year_to: Option<u32>,
}

#[derive(Clone, Debug)]
pub struct SearchHit {
    pub id: String,
    pub label: Option<String>,
    pub score: Option<f64>,
}

/// The HTTP/JSON backend interface the engine consumes (spec §6). All
/// methods are cancel-safe: callers race them against a `CancellationToken`
/// via `tokio::select!` rather than the trait doing its own cancellation.
#[async_trait]
pub trait GraphBackend: Send + Sync {
    async fn top_nodes(
        &self,
        limit: usize,
        visible_clusters: Option<&[u32]>,
        min_degree: u32,
    ) -> anyhow::Result<Vec<Node>>;

    async fn nodes_in_box(&self, query: NodesBoxQuery) -> anyhow::Result<NodesPage>;

    async fn tree_in_box(&self, query: TreeInBoxQuery) -> anyhow::Result<TreeInBoxResult>;

    async fn edges_batch(
        &self,
        node_ids: &[String],
        limit: usize,
        priority: EdgePriority,
    ) -> anyhow::Result<Vec<Edge>>;

    async fn edges_for_node(&self, node_id: &str) -> anyhow::Result<Vec<Edge>>;

    async fn bounds(&self) -> anyhow::Result<GraphBounds>;

    async fn search(&self, query: SearchQuery) -> anyhow::Result<Vec<SearchHit>>;

    async fn search_suggestions(&self, q: &str, limit: usize) -> anyhow::Result<Vec<String>>;

    async fn search_node(&self, id: &str) -> anyhow::Result<Option<Node>>;
}
