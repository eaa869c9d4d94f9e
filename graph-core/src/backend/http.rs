//! `reqwest`-backed implementation of [`GraphBackend`], following the shape
//! of a single base-URL client with one method per endpoint, explicit
//! status-code branches, and `.context(...)` on every fallible step.

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use reqwest::StatusCode;

use crate::model::{
    BoundsResponse, EdgeKind, NodesBoxResponse, RawEdge, SearchResponse, TreeInBoxResponse,
};

use super::{
    EdgePriority, GraphBackend, GraphBounds, NodesBoxQuery, NodesPage, SearchHit, SearchQuery,
    TreeInBoxQuery, TreeInBoxResult,
};
use crate::model::{BrokenEdge, Edge, Node, NodeId};

pub struct HttpBackend {
    client: reqwest::Client,
    base_url: String,
}

impl HttpBackend {
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .build()
            .context("failed to build reqwest client")?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn with_client(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

fn clusters_param(clusters: Option<&[u32]>) -> Option<String> {
    clusters.map(|c| c.iter().map(u32::to_string).collect::<Vec<_>>().join(","))
}

#[async_trait]
impl GraphBackend for HttpBackend {
    async fn top_nodes(
        &self,
        limit: usize,
        visible_clusters: Option<&[u32]>,
        min_degree: u32,
    ) -> Result<Vec<Node>> {
        let mut req = self
            .client
            .get(self.url("/nodes/top"))
            .query(&[("limit", limit.to_string()), ("min_degree", min_degree.to_string())]);
        if let Some(clusters) = clusters_param(visible_clusters) {
            req = req.query(&[("visible_clusters", clusters)]);
        }
        let resp = req
            .send()
            .await
            .context("failed to request top nodes")?;
        let resp = check_status(resp, "/nodes/top").await?;
        let body: NodesBoxResponse = resp
            .json()
            .await
            .context("failed to parse /nodes/top response")?;
        Ok(body.nodes.into_iter().map(Node::from).collect())
    }

    async fn nodes_in_box(&self, query: NodesBoxQuery) -> Result<NodesPage> {
        let path = if query.light { "/nodes/box/light" } else { "/nodes/box" };
        let mut req = self.client.get(self.url(path)).query(&[
            ("minX", query.bounds.min_x.to_string()),
            ("maxX", query.bounds.max_x.to_string()),
            ("minY", query.bounds.min_y.to_string()),
            ("maxY", query.bounds.max_y.to_string()),
            ("limit", query.limit.to_string()),
            ("offset", query.offset.to_string()),
            ("min_degree", query.min_degree.to_string()),
        ]);
        if let Some(clusters) = clusters_param(query.visible_clusters.as_deref()) {
            req = req.query(&[("visible_clusters", clusters)]);
        }
        let resp = req.send().await.context("failed to request nodes in box")?;
        let resp = check_status(resp, path).await?;
        let body: NodesBoxResponse = resp
            .json()
            .await
            .context("failed to parse nodes-in-box response")?;
        Ok(NodesPage {
            nodes: body.nodes.into_iter().map(Node::from).collect(),
            has_more: body.has_more,
        })
    }

    async fn tree_in_box(&self, query: TreeInBoxQuery) -> Result<TreeInBoxResult> {
        let body = serde_json::json!({
            "minX": query.bounds.min_x,
            "maxX": query.bounds.max_x,
            "minY": query.bounds.min_y,
            "maxY": query.bounds.max_y,
            "maxNodes": query.max_nodes,
            "minDegree": query.min_degree,
            "offset": query.offset,
            "edgeType": query.edge_type,
            "visible_clusters": query.visible_clusters,
        });
        let resp = self
            .client
            .post(self.url("/nodes/tree-in-box"))
            .json(&body)
            .send()
            .await
            .context("failed to request tree-in-box")?;
        let resp = check_status(resp, "/nodes/tree-in-box").await?;
        let body: TreeInBoxResponse = resp
            .json()
            .await
            .context("failed to parse tree-in-box response")?;
        let nodes: Vec<Node> = body.nodes.into_iter().map(Node::from).collect();
        let tree_edges: Vec<Edge> = body
            .tree_edges
            .into_iter()
            .map(|e: RawEdge| e.into_edge(EdgeKind::Tree))
            .collect();
        let broken_edges = body
            .broken_edges
            .into_iter()
            .map(|b| BrokenEdge {
                source: NodeId::new(b.source),
                target: NodeId::new(b.target),
                target_x: b.target_x,
                target_y: b.target_y,
                reason: b.reason.unwrap_or_else(|| "out-of-fragment".to_string()),
            })
            .collect();
        let (node_count, edge_count, connectivity) = match body.stats {
            Some(stats) => (stats.node_count, stats.edge_count, stats.connectivity),
            None => (nodes.len(), tree_edges.len(), None),
        };
        Ok(TreeInBoxResult {
            nodes,
            tree_edges,
            broken_edges,
            has_more: body.has_more,
            node_count,
            edge_count,
            connectivity,
        })
    }

    async fn edges_batch(
        &self,
        node_ids: &[String],
        limit: usize,
        priority: EdgePriority,
    ) -> Result<Vec<Edge>> {
        let priority_str = match priority {
            EdgePriority::All => "all",
            EdgePriority::Tree => "tree",
            EdgePriority::Extra => "extra",
        };
        let body = serde_json::json!({
            "node_ids": node_ids,
            "limit": limit,
            "priority": priority_str,
        });
        let resp = self
            .client
            .post(self.url("/edges/batch"))
            .json(&body)
            .send()
            .await
            .context("failed to request edges batch")?;
        let resp = check_status(resp, "/edges/batch").await?;
        let edges: Vec<RawEdge> = resp
            .json()
            .await
            .context("failed to parse edges-batch response")?;
        Ok(edges
            .into_iter()
            .map(|e| e.into_edge(EdgeKind::Extra))
            .collect())
    }

    async fn edges_for_node(&self, node_id: &str) -> Result<Vec<Edge>> {
        let resp = self
            .client
            .get(self.url("/edges"))
            .query(&[("nodeId", node_id)])
            .send()
            .await
            .context("failed to request edges for node")?;
        let resp = check_status(resp, "/edges").await?;
        let edges: Vec<RawEdge> = resp
            .json()
            .await
            .context("failed to parse edges-for-node response")?;
        Ok(edges
            .into_iter()
            .map(|e| e.into_edge(EdgeKind::Extra))
            .collect())
    }

    async fn bounds(&self) -> Result<GraphBounds> {
        let resp = self
            .client
            .get(self.url("/bounds"))
            .send()
            .await
            .context("failed to request bounds")?;
        let resp = check_status(resp, "/bounds").await?;
        let body: BoundsResponse = resp
            .json()
            .await
            .context("failed to parse bounds response")?;
        Ok(GraphBounds {
            bounds: crate::model::Bounds::new(body.min_x, body.max_x, body.min_y, body.max_y),
            total_nodes: body.total_papers.unwrap_or(0),
        })
    }

    async fn search(&self, query: SearchQuery) -> Result<Vec<SearchHit>> {
        let mut req = self.client.get(self.url("/search")).query(&[
            ("q", query.q.clone()),
            ("limit", query.limit.to_string()),
            ("offset", query.offset.to_string()),
            ("include_abstract", query.include_abstract.to_string()),
        ]);
        if let Some(min_citations) = query.min_citations {
            req = req.query(&[("min_citations", min_citations.to_string())]);
        }
        if let Some(year_from) = query.year_from {
            req = req.query(&[("year_from", year_from.to_string())]);
        }
        if let Some(year_to) = query.year_to {
            req = req.query(&[("year_to", year_to.to_string())]);
        }
        let resp = req.send().await.context("failed to request search")?;
        let resp = check_status(resp, "/search").await?;
        let body: SearchResponse = resp.json().await.context("failed to parse search response")?;
        Ok(body
            .results
            .into_iter()
            .map(|r| SearchHit { id: r.id, label: r.label, score: r.score })
            .collect())
    }

    async fn search_suggestions(&self, q: &str, limit: usize) -> Result<Vec<String>> {
        let resp = self
            .client
            .get(self.url("/search/suggestions"))
            .query(&[("q", q), ("limit", &limit.to_string())])
            .send()
            .await
            .context("failed to request search suggestions")?;
        let resp = check_status(resp, "/search/suggestions").await?;
        resp.json()
            .await
            .context("failed to parse search-suggestions response")
    }

    async fn search_node(&self, id: &str) -> Result<Option<Node>> {
        let resp = self
            .client
            .get(self.url(&format!("/search/node/{id}")))
            .send()
            .await
            .context("failed to request search node")?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let resp = check_status(resp, "/search/node").await?;
        let raw: crate::model::RawNode = resp
            .json()
            .await
            .context("failed to parse search-node response")?;
        Ok(Some(Node::from(raw)))
    }
}

async fn check_status(resp: reqwest::Response, endpoint: &str) -> Result<reqwest::Response> {
    if resp.status().is_success() {
        return Ok(resp);
    }
    let status = resp.status();
    let body = resp.text().await.unwrap_or_default();
    bail!("{endpoint} returned {status}: {body}");
}
