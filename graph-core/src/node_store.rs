//! In-memory node set (C5) with a coarse grid spatial index backing the
//! `*_in_bounds` queries in expected O(k).

use rustc_hash::{FxHashMap, FxHashSet};

use crate::model::{Bounds, Node, NodeId};

const DEFAULT_CELL_SIZE: f64 = 5.0;

type CellKey = (i64, i64);

pub struct NodeStore {
    nodes: FxHashMap<NodeId, Node>,
    grid: FxHashMap<CellKey, FxHashSet<NodeId>>,
    cell_size: f64,
}

impl NodeStore {
    pub fn new(cell_size: f64) -> Self {
        Self {
            nodes: FxHashMap::default(),
            grid: FxHashMap::default(),
            cell_size: if cell_size > 0.0 { cell_size } else { DEFAULT_CELL_SIZE },
        }
    }

    fn cell_of(&self, x: f64, y: f64) -> CellKey {
        ((x / self.cell_size).floor() as i64, (y / self.cell_size).floor() as i64)
    }

    fn cells_for_bounds(&self, bounds: &Bounds) -> impl Iterator<Item = CellKey> + '_ {
        let (cx0, cy0) = self.cell_of(bounds.min_x, bounds.min_y);
        let (cx1, cy1) = self.cell_of(bounds.max_x, bounds.max_y);
        (cx0..=cx1).flat_map(move |cx| (cy0..=cy1).map(move |cy| (cx, cy)))
    }

    /// Inserts a batch of nodes. Idempotent: re-adding a known id refreshes
    /// `last_seen_ms` (to the max of old/new) rather than duplicating it.
    /// Returns the ids that were newly inserted (as opposed to refreshed).
    pub fn add(&mut self, batch: Vec<Node>) -> Vec<NodeId> {
        let mut inserted = Vec::new();
        for node in batch {
            let cell = self.cell_of(node.x, node.y);
            match self.nodes.get_mut(&node.id) {
                Some(existing) => {
                    existing.last_seen_ms = existing.last_seen_ms.max(node.last_seen_ms);
                }
                None => {
                    self.grid.entry(cell).or_default().insert(node.id.clone());
                    inserted.push(node.id.clone());
                    self.nodes.insert(node.id.clone(), node);
                }
            }
        }
        inserted
    }

    /// Removes the given ids, returning them for the caller to also drop
    /// incident edges (the store itself has no edge awareness).
    pub fn remove(&mut self, ids: &[NodeId]) -> Vec<NodeId> {
        let mut removed = Vec::new();
        for id in ids {
            if let Some(node) = self.nodes.remove(id) {
                let cell = self.cell_of(node.x, node.y);
                if let Some(set) = self.grid.get_mut(&cell) {
                    set.remove(id);
                    if set.is_empty() {
                        self.grid.remove(&cell);
                    }
                }
                removed.push(id.clone());
            }
        }
        removed
    }

    pub fn has(&self, id: &NodeId) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn get(&self, id: &NodeId) -> Option<&Node> {
        self.nodes.get(id)
    }

    pub fn touch(&mut self, id: &NodeId, now_ms: i64) {
        if let Some(node) = self.nodes.get_mut(id) {
            node.touch(now_ms);
        }
    }

    pub fn count(&self) -> usize {
        self.nodes.len()
    }

    pub fn count_in_bounds(&self, bounds: &Bounds) -> usize {
        self.ids_in_bounds(bounds).len()
    }

    pub fn ids_in_bounds(&self, bounds: &Bounds) -> Vec<NodeId> {
        let mut out = Vec::new();
        for cell in self.cells_for_bounds(bounds) {
            let Some(set) = self.grid.get(&cell) else { continue };
            for id in set {
                if let Some(node) = self.nodes.get(id)
                    && bounds.contains_point(node.x, node.y)
                {
                    out.push(id.clone());
                }
            }
        }
        out
    }

    pub fn iter(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(id: &str, x: f64, y: f64) -> Node {
        Node {
            id: NodeId::new(id),
            x,
            y,
            degree: 0,
            cluster_id: 0,
            label: None,
            tree_level: None,
            last_seen_ms: 0,
        }
    }

    #[test]
    fn adding_same_id_twice_yields_one_node() {
        let mut store = NodeStore::new(5.0);
        store.add(vec![node("a", 1.0, 1.0)]);
        let mut second = node("a", 1.0, 1.0);
        second.last_seen_ms = 50;
        store.add(vec![second]);
        assert_eq!(store.count(), 1);
        assert_eq!(store.get(&NodeId::new("a")).unwrap().last_seen_ms, 50);
    }

    #[test]
    fn last_seen_is_monotonically_non_decreasing() {
        let mut store = NodeStore::new(5.0);
        let mut first = node("a", 1.0, 1.0);
        first.last_seen_ms = 100;
        store.add(vec![first]);
        let mut stale = node("a", 1.0, 1.0);
        stale.last_seen_ms = 10;
        store.add(vec![stale]);
        assert_eq!(store.get(&NodeId::new("a")).unwrap().last_seen_ms, 100);
    }

    #[test]
    fn ids_in_bounds_finds_nodes_across_cell_boundaries() {
        let mut store = NodeStore::new(5.0);
        store.add(vec![node("a", 0.0, 0.0), node("b", 12.0, 12.0), node("c", 100.0, 100.0)]);
        let found = store.ids_in_bounds(&Bounds::new(-1.0, 15.0, -1.0, 15.0));
        assert_eq!(found.len(), 2);
    }

    #[test]
    fn remove_drops_from_grid_and_store() {
        let mut store = NodeStore::new(5.0);
        store.add(vec![node("a", 1.0, 1.0)]);
        store.remove(&[NodeId::new("a")]);
        assert!(!store.has(&NodeId::new("a")));
        assert_eq!(store.ids_in_bounds(&Bounds::new(-5.0, 5.0, -5.0, 5.0)).len(), 0);
    }
}
