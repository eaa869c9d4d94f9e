//! Core data types shared by every component: nodes, edges, viewports, LOD
//! levels, cache tiles, tree fragments and the wire envelopes the backend
//! sends over the HTTP/JSON interface.

use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Opaque, cheap-to-clone node identifier.
#[derive(Clone, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct NodeId(Arc<str>);

impl NodeId {
    pub fn new(id: impl Into<Arc<str>>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeId({})", self.0)
    }
}

impl From<&str> for NodeId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for NodeId {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

/// A loaded paper. Coordinates, `degree`, `cluster_id`, and `tree_level` are
/// immutable after construction; only `last_seen_ms` is refreshed in place.
#[derive(Clone, Debug, PartialEq)]
pub struct Node {
    pub id: NodeId,
    pub x: f64,
    pub y: f64,
    pub degree: u32,
    pub cluster_id: u32,
    pub label: Option<String>,
    /// `Some(0)` marks a DAG root in tree-first mode.
    pub tree_level: Option<u32>,
    pub last_seen_ms: i64,
}

impl Node {
    pub fn touch(&mut self, now_ms: i64) {
        self.last_seen_ms = self.last_seen_ms.max(now_ms);
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum EdgeKind {
    Tree,
    Extra,
}

/// Edge identity is the unordered pair of endpoints, canonicalized so `(u,
/// v)` and `(v, u)` hash identically; multi-edges are forbidden by
/// construction.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct EdgeId {
    pub a: NodeId,
    pub b: NodeId,
}

impl EdgeId {
    pub fn new(x: NodeId, y: NodeId) -> Self {
        if x <= y { Self { a: x, b: y } } else { Self { a: y, b: x } }
    }
}

impl Hash for EdgeId {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.a.hash(state);
        self.b.hash(state);
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Edge {
    pub id: EdgeId,
    pub kind: EdgeKind,
    pub highlighted: bool,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Bounds {
    pub min_x: f64,
    pub max_x: f64,
    pub min_y: f64,
    pub max_y: f64,
}

impl Bounds {
    pub fn new(min_x: f64, max_x: f64, min_y: f64, max_y: f64) -> Self {
        Self { min_x, max_x, min_y, max_y }
    }

    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }

    pub fn area(&self) -> f64 {
        self.width().max(0.0) * self.height().max(0.0)
    }

    pub fn is_finite_nonempty(&self) -> bool {
        [self.min_x, self.max_x, self.min_y, self.max_y]
            .iter()
            .all(|v| v.is_finite())
            && self.width() > 0.0
            && self.height() > 0.0
    }

    pub fn center(&self) -> (f64, f64) {
        ((self.min_x + self.max_x) / 2.0, (self.min_y + self.max_y) / 2.0)
    }

    pub fn expand(&self, margin: f64) -> Bounds {
        Bounds {
            min_x: self.min_x - margin,
            max_x: self.max_x + margin,
            min_y: self.min_y - margin,
            max_y: self.max_y + margin,
        }
    }

    pub fn intersects(&self, other: &Bounds) -> bool {
        self.min_x <= other.max_x
            && self.max_x >= other.min_x
            && self.min_y <= other.max_y
            && self.max_y >= other.min_y
    }

    pub fn contains_point(&self, x: f64, y: f64) -> bool {
        x >= self.min_x && x <= self.max_x && y >= self.min_y && y <= self.max_y
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Viewport {
    pub bounds: Bounds,
    pub camera_ratio: f64,
}

#[derive(Clone, Debug, PartialEq)]
pub struct LodLevel {
    pub index: usize,
    pub name: String,
    pub ratio_upper_bound: f64,
    pub max_nodes: usize,
    pub min_degree: u32,
    pub load_edges: bool,
}

/// Cache key for a quantized viewport region at a given LOD. `spatial_hash`
/// is produced by [`quantize_bounds`].
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub struct Tile {
    pub spatial_hash: u64,
    pub lod_level: usize,
}

/// Quantizes `bounds` to a grid whose cell size is `cell_size`, hashing the
/// four quantized grid coordinates with FNV-1a. Identical tiles at a level
/// share a hash; `cell_size` should grow with LOD level so coarser levels
/// cache larger regions.
pub fn quantize_bounds(bounds: &Bounds, lod_level: usize, cell_size: f64) -> u64 {
    let q = |v: f64| -> i64 {
        if cell_size <= 0.0 {
            0
        } else {
            (v / cell_size).floor() as i64
        }
    };
    let coords = [q(bounds.min_x), q(bounds.max_x), q(bounds.min_y), q(bounds.max_y)];

    const FNV_OFFSET: u64 = 0xcbf29ce484222325;
    const FNV_PRIME: u64 = 0x100000001b3;
    let mut hash = FNV_OFFSET;
    for coord in coords {
        for byte in coord.to_le_bytes() {
            hash ^= byte as u64;
            hash = hash.wrapping_mul(FNV_PRIME);
        }
    }
    for byte in (lod_level as u64).to_le_bytes() {
        hash ^= byte as u64;
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}

#[derive(Clone, Debug)]
pub struct BrokenEdge {
    pub source: NodeId,
    pub target: NodeId,
    pub target_x: f64,
    pub target_y: f64,
    pub reason: String,
}

#[derive(Clone, Debug)]
pub struct TreeFragment {
    pub id: u64,
    pub bounds: Bounds,
    pub lod_level: usize,
    pub node_ids: Vec<NodeId>,
    pub tree_edge_ids: Vec<EdgeId>,
    pub broken_edges: HashMap<EdgeId, BrokenEdge>,
    pub created_at_ms: i64,
}

#[derive(Clone, Debug)]
pub struct NodeImportanceRecord {
    pub node_id: NodeId,
    pub degree: u32,
    pub distance_from_center: f64,
    pub last_seen_ms: i64,
    pub lod_level: usize,
    pub importance: f64,
    pub in_viewport: bool,
}

/// Raw node payload as received from the backend. Accepts both camelCase
/// (tree responses) and snake_case (legacy routes) key spellings, and both
/// `key`/`id`/`nodeId` and `cluster_id`/`community` naming conventions
/// (spec §6, §9 open question: ingress accepts both, egress always emits
/// `id`/`cluster_id`).
#[derive(Clone, Debug, Deserialize)]
pub struct RawNode {
    #[serde(alias = "key", alias = "nodeId")]
    pub id: String,
    pub x: f64,
    pub y: f64,
    #[serde(default)]
    pub degree: u32,
    #[serde(default, alias = "community")]
    pub cluster_id: u32,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default, alias = "treeLevel")]
    pub tree_level: Option<u32>,
}

impl From<RawNode> for Node {
    fn from(raw: RawNode) -> Self {
        Node {
            id: NodeId::new(raw.id),
            x: raw.x,
            y: raw.y,
            degree: raw.degree,
            cluster_id: raw.cluster_id,
            label: raw.label,
            tree_level: raw.tree_level,
            last_seen_ms: 0,
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct RawEdge {
    #[serde(alias = "source", alias = "from")]
    pub source: String,
    #[serde(alias = "target", alias = "to")]
    pub target: String,
    #[serde(default)]
    pub kind: Option<String>,
}

impl RawEdge {
    pub fn into_edge(self, default_kind: EdgeKind) -> Edge {
        let kind = match self.kind.as_deref() {
            Some("tree") => EdgeKind::Tree,
            Some("extra") => EdgeKind::Extra,
            _ => default_kind,
        };
        Edge {
            id: EdgeId::new(NodeId::new(self.source), NodeId::new(self.target)),
            kind,
            highlighted: false,
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodesBoxResponse {
    pub nodes: Vec<RawNode>,
    #[serde(default, alias = "has_more")]
    pub has_more: bool,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TreeInBoxResponse {
    pub nodes: Vec<RawNode>,
    pub tree_edges: Vec<RawEdge>,
    #[serde(default)]
    pub broken_edges: Vec<RawBrokenEdge>,
    #[serde(default, alias = "has_more")]
    pub has_more: bool,
    #[serde(default)]
    pub stats: Option<TreeInBoxStats>,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawBrokenEdge {
    pub source: String,
    pub target: String,
    pub target_x: f64,
    pub target_y: f64,
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TreeInBoxStats {
    pub node_count: usize,
    pub edge_count: usize,
    #[serde(default)]
    pub load_time: Option<f64>,
    #[serde(default)]
    pub connectivity: Option<f64>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct BoundsResponse {
    #[serde(rename = "minX")]
    pub min_x: f64,
    #[serde(rename = "maxX")]
    pub max_x: f64,
    #[serde(rename = "minY")]
    pub min_y: f64,
    #[serde(rename = "maxY")]
    pub max_y: f64,
    #[serde(default)]
    pub total_papers: Option<u64>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct SearchResultItem {
    #[serde(alias = "key", alias = "nodeId")]
    pub id: String,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub score: Option<f64>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SearchResponse {
    pub results: Vec<SearchResultItem>,
}
