//! In-memory edge set (C6). Distinguishes tree edges from extra edges and
//! refuses to store an edge whose endpoints are not both loaded.

use rustc_hash::FxHashMap;

use crate::model::{Edge, EdgeId, NodeId};
use crate::node_store::NodeStore;

pub struct EdgeStore {
    edges: FxHashMap<EdgeId, Edge>,
    /// node -> incident edge ids, for `for_nodes` and cascade removal.
    incident: FxHashMap<NodeId, Vec<EdgeId>>,
}

impl EdgeStore {
    pub fn new() -> Self {
        Self {
            edges: FxHashMap::default(),
            incident: FxHashMap::default(),
        }
    }

    /// Adds a batch of edges. Any edge whose endpoints aren't both present
    /// in `nodes` is silently refused (spec §4.5: "must refuse an edge
    /// whose endpoints are not both present").
    pub fn add(&mut self, batch: Vec<Edge>, nodes: &NodeStore) {
        for edge in batch {
            if !nodes.has(&edge.id.a) || !nodes.has(&edge.id.b) {
                continue;
            }
            if self.edges.contains_key(&edge.id) {
                continue;
            }
            self.incident.entry(edge.id.a.clone()).or_default().push(edge.id.clone());
            self.incident.entry(edge.id.b.clone()).or_default().push(edge.id.clone());
            self.edges.insert(edge.id.clone(), edge);
        }
    }

    pub fn remove(&mut self, ids: &[EdgeId]) {
        for id in ids {
            if let Some(edge) = self.edges.remove(id) {
                self.drop_incidence(&edge.id);
            }
        }
    }

    /// Removes every edge incident to `node_id`. Called when the node store
    /// evicts a node.
    pub fn remove_incident_to(&mut self, node_id: &NodeId) -> Vec<EdgeId> {
        let Some(ids) = self.incident.remove(node_id) else { return Vec::new() };
        for id in &ids {
            self.edges.remove(id);
            let other = if &id.a == node_id { &id.b } else { &id.a };
            if let Some(list) = self.incident.get_mut(other) {
                list.retain(|e| e != id);
            }
        }
        ids
    }

    fn drop_incidence(&mut self, id: &EdgeId) {
        if let Some(list) = self.incident.get_mut(&id.a) {
            list.retain(|e| e != id);
        }
        if let Some(list) = self.incident.get_mut(&id.b) {
            list.retain(|e| e != id);
        }
    }

    pub fn for_nodes(&self, ids: &[NodeId]) -> Vec<&Edge> {
        let mut out = Vec::new();
        let mut seen = std::collections::HashSet::new();
        for id in ids {
            let Some(edge_ids) = self.incident.get(id) else { continue };
            for edge_id in edge_ids {
                if seen.insert(edge_id.clone())
                    && let Some(edge) = self.edges.get(edge_id)
                {
                    out.push(edge);
                }
            }
        }
        out
    }

    pub fn get(&self, id: &EdgeId) -> Option<&Edge> {
        self.edges.get(id)
    }

    pub fn get_mut(&mut self, id: &EdgeId) -> Option<&mut Edge> {
        self.edges.get_mut(id)
    }

    pub fn count(&self) -> usize {
        self.edges.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Edge> {
        self.edges.values()
    }
}

impl Default for EdgeStore {
    fn default() -> Self {
        Self::new()
    }
}
