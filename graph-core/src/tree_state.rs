//! Tree State Manager (C9): tracks tree fragments, connectivity to roots,
//! and pending broken (cross-viewport) edges awaiting enrichment.

use std::collections::{HashMap, HashSet};

use crate::model::{BrokenEdge, EdgeId, NodeId, TreeFragment};

pub struct TreeStateManager {
    fragments: HashMap<u64, TreeFragment>,
    /// node -> fragment containing it, for O(1) membership queries.
    node_fragment: HashMap<NodeId, u64>,
    /// tree-edge parent pointers: child -> parent, across all fragments.
    parent: HashMap<NodeId, NodeId>,
    roots: HashSet<NodeId>,
    next_fragment_id: u64,
}

impl TreeStateManager {
    pub fn new() -> Self {
        Self {
            fragments: HashMap::new(),
            node_fragment: HashMap::new(),
            parent: HashMap::new(),
            roots: HashSet::new(),
            next_fragment_id: 0,
        }
    }

    pub fn mark_root(&mut self, node_id: NodeId) {
        self.roots.insert(node_id);
    }

    /// Ingests a fragment: `tree_edges` establish parent pointers (edge
    /// source is the parent of edge target), `broken_edges` are recorded
    /// as-is. Returns the assigned fragment id.
    pub fn ingest_fragment(
        &mut self,
        bounds: crate::model::Bounds,
        lod_level: usize,
        node_ids: Vec<NodeId>,
        tree_edges: Vec<(NodeId, NodeId)>,
        broken_edges: Vec<BrokenEdge>,
        created_at_ms: i64,
    ) -> u64 {
        let id = self.next_fragment_id;
        self.next_fragment_id += 1;

        for node_id in &node_ids {
            self.node_fragment.insert(node_id.clone(), id);
        }
        let mut tree_edge_ids = Vec::with_capacity(tree_edges.len());
        for (source, target) in tree_edges {
            self.parent.insert(target.clone(), source.clone());
            tree_edge_ids.push(EdgeId::new(source, target));
        }
        let broken_edge_map = broken_edges
            .into_iter()
            .map(|b| (EdgeId::new(b.source.clone(), b.target.clone()), b))
            .collect();

        self.fragments.insert(
            id,
            TreeFragment {
                id,
                bounds,
                lod_level,
                node_ids,
                tree_edge_ids,
                broken_edges: broken_edge_map,
                created_at_ms,
            },
        );
        id
    }

    pub fn is_connected(&self, node_id: &NodeId) -> bool {
        self.path_to_root(node_id).is_some()
    }

    /// Walks parent pointers from `node_id` to a root, returning the path
    /// (node_id first, root last) or `None` if no root is reached (cycle
    /// guard: bails after visiting more nodes than exist in the index).
    pub fn path_to_root(&self, node_id: &NodeId) -> Option<Vec<NodeId>> {
        let mut path = vec![node_id.clone()];
        let mut current = node_id.clone();
        let limit = self.parent.len() + self.roots.len() + 1;

        if self.roots.contains(&current) {
            return Some(path);
        }

        for _ in 0..limit {
            match self.parent.get(&current) {
                Some(parent) => {
                    path.push(parent.clone());
                    if self.roots.contains(parent) {
                        return Some(path);
                    }
                    current = parent.clone();
                }
                None => return None,
            }
        }
        None
    }

    /// Every loaded node that is neither a root nor reachable to one.
    pub fn find_disconnected<'a>(&self, loaded: impl Iterator<Item = &'a NodeId>) -> Vec<NodeId> {
        loaded
            .filter(|id| !self.roots.contains(*id) && !self.is_connected(id))
            .cloned()
            .collect()
    }

    pub fn broken_edges_for(&self, node_id: &NodeId) -> Vec<&BrokenEdge> {
        self.fragments
            .values()
            .flat_map(|f| f.broken_edges.values())
            .filter(|b| &b.source == node_id || &b.target == node_id)
            .collect()
    }

    /// Broken edges whose target is now within `priority_bounds` (spec
    /// §4.7: "fetch tree paths for broken edges whose target is now
    /// nearby"), ordered as stored (insertion order within each fragment).
    pub fn enrichment_candidates(&self, priority_bounds: &crate::model::Bounds) -> Vec<&BrokenEdge> {
        self.fragments
            .values()
            .flat_map(|f| f.broken_edges.values())
            .filter(|b| priority_bounds.contains_point(b.target_x, b.target_y))
            .collect()
    }

    pub fn remove_node(&mut self, node_id: &NodeId) {
        if let Some(fragment_id) = self.node_fragment.remove(node_id)
            && let Some(fragment) = self.fragments.get_mut(&fragment_id)
        {
            fragment.node_ids.retain(|id| id != node_id);
        }
        self.parent.remove(node_id);
        self.roots.remove(node_id);
    }

    pub fn clear(&mut self) {
        self.fragments.clear();
        self.node_fragment.clear();
        self.parent.clear();
        self.roots.clear();
    }
}

impl Default for TreeStateManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Bounds;

    #[test]
    fn connected_chain_resolves_to_root() {
        let mut state = TreeStateManager::new();
        let root = NodeId::new("root");
        state.mark_root(root.clone());
        state.ingest_fragment(
            Bounds::new(0.0, 10.0, 0.0, 10.0),
            0,
            vec![root.clone(), NodeId::new("a"), NodeId::new("b")],
            vec![(root.clone(), NodeId::new("a")), (NodeId::new("a"), NodeId::new("b"))],
            vec![],
            0,
        );
        assert!(state.is_connected(&NodeId::new("b")));
        assert_eq!(state.path_to_root(&NodeId::new("b")).unwrap().last(), Some(&root));
    }

    #[test]
    fn unreachable_node_is_reported_disconnected() {
        let mut state = TreeStateManager::new();
        let root = NodeId::new("root");
        state.mark_root(root.clone());
        state.ingest_fragment(
            Bounds::new(0.0, 10.0, 0.0, 10.0),
            0,
            vec![root, NodeId::new("isolated")],
            vec![],
            vec![],
            0,
        );
        let loaded = vec![NodeId::new("isolated")];
        let disconnected = state.find_disconnected(loaded.iter());
        assert_eq!(disconnected, vec![NodeId::new("isolated")]);
    }

    #[test]
    fn broken_edges_are_queryable_by_endpoint() {
        let mut state = TreeStateManager::new();
        state.ingest_fragment(
            Bounds::new(0.0, 10.0, 0.0, 10.0),
            0,
            vec![NodeId::new("a")],
            vec![],
            vec![BrokenEdge {
                source: NodeId::new("a"),
                target: NodeId::new("far"),
                target_x: 500.0,
                target_y: 500.0,
                reason: "out-of-fragment".into(),
            }],
            0,
        );
        assert_eq!(state.broken_edges_for(&NodeId::new("a")).len(), 1);
        assert_eq!(state.broken_edges_for(&NodeId::new("unrelated")).len(), 0);
    }
}
