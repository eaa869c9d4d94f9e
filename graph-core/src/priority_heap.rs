//! Min-heap over node importance (C7), augmented with an `id -> slot` index
//! for O(1) lookup. Extends the teacher's coarse-first `BinaryHeap` pattern
//! (originally ordered by mip level, FIFO within a level) with the index
//! map the spec requires for `touch`/`remove` by id.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use rustc_hash::FxHashMap;

use crate::model::{NodeId, NodeImportanceRecord};

const RECENT_WINDOW_MS: i64 = 5 * 60 * 1000;
const VISIBLE_BONUS: f64 = 1000.0;

/// `importance = 0.4*degreeScore + 0.3*distanceScore + 0.2*recencyScore + 0.1*lodScore`,
/// plus a dominating bonus for nodes inside the current viewport so eviction
/// never removes visible nodes.
pub fn compute_importance(
    degree: u32,
    distance_from_center: f64,
    now_ms: i64,
    last_seen_ms: i64,
    lod_level: usize,
    num_levels: usize,
    in_viewport: bool,
) -> f64 {
    let degree_score = (degree as f64 / 100.0).min(1.0);
    let distance_score = (1.0 - distance_from_center / 100.0).max(0.0);
    let dt = (now_ms - last_seen_ms).max(0) as f64;
    let recency_score = (1.0 - dt / RECENT_WINDOW_MS as f64).max(0.0);
    let lod_score = if num_levels <= 1 {
        1.0
    } else {
        (num_levels as f64 - 1.0 - lod_level as f64) / (num_levels as f64 - 1.0)
    };
    let base = 0.4 * degree_score + 0.3 * distance_score + 0.2 * recency_score + 0.1 * lod_score;
    if in_viewport { base + VISIBLE_BONUS } else { base }
}

/// Min-heap entry; ordered by ascending importance (reversed so
/// `BinaryHeap`, a max-heap, yields the lowest importance first), with a
/// monotonic sequence number breaking ties FIFO.
struct Entry {
    node_id: NodeId,
    importance: f64,
    seq: u64,
}

impl PartialEq for Entry {
    fn eq(&self, other: &Self) -> bool {
        self.importance == other.importance && self.seq == other.seq
    }
}
impl Eq for Entry {}

impl PartialOrd for Entry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Entry {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed: BinaryHeap is a max-heap, we want the lowest importance on top.
        match other
            .importance
            .partial_cmp(&self.importance)
            .unwrap_or(Ordering::Equal)
        {
            Ordering::Equal => other.seq.cmp(&self.seq),
            ord => ord,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct HeapStats {
    pub len: usize,
    pub min_importance: Option<f64>,
}

/// A min-heap over [`NodeImportanceRecord`]s keyed by `importance`, with an
/// `id -> slot` index. Stale heap entries (superseded by a later
/// `addOrUpdate` for the same id) are tombstoned rather than removed
/// in-place, and lazily skipped on pop — cheaper than a full reheapify on
/// every update, at the cost of the heap occasionally overgrowing until a
/// pop sweeps tombstones out.
pub struct PriorityHeap {
    heap: BinaryHeap<Entry>,
    /// node_id -> (current seq, record). Only the entry whose `seq` matches
    /// this map is live; older heap entries for the same id are tombstones.
    index: FxHashMap<NodeId, (u64, NodeImportanceRecord)>,
    next_seq: u64,
}

impl PriorityHeap {
    pub fn new() -> Self {
        Self {
            heap: BinaryHeap::new(),
            index: FxHashMap::default(),
            next_seq: 0,
        }
    }

    pub fn add_or_update(&mut self, record: NodeImportanceRecord) {
        let seq = self.next_seq;
        self.next_seq += 1;
        let entry = Entry { node_id: record.node_id.clone(), importance: record.importance, seq };
        self.index.insert(record.node_id.clone(), (seq, record));
        self.heap.push(entry);
    }

    pub fn touch(&mut self, node_id: &NodeId, now_ms: i64) {
        if let Some((_, record)) = self.index.get(node_id) {
            let mut updated = record.clone();
            updated.last_seen_ms = now_ms;
            self.add_or_update(updated);
        }
    }

    pub fn remove(&mut self, node_id: &NodeId) -> Option<NodeImportanceRecord> {
        self.index.remove(node_id).map(|(_, record)| record)
    }

    pub fn contains(&self, node_id: &NodeId) -> bool {
        self.index.contains_key(node_id)
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    fn is_live(&self, entry: &Entry) -> bool {
        matches!(self.index.get(&entry.node_id), Some((seq, _)) if *seq == entry.seq)
    }

    /// Pops the `n` lowest-importance *live* node ids, removing them from
    /// the index. Used by the graph coordinator to decide eviction
    /// candidates once the node count exceeds the memory cap.
    pub fn pop_lowest_n(&mut self, n: usize) -> Vec<NodeId> {
        let mut popped = Vec::with_capacity(n);
        while popped.len() < n {
            let Some(entry) = self.heap.pop() else { break };
            if !self.is_live(&entry) {
                continue;
            }
            self.index.remove(&entry.node_id);
            popped.push(entry.node_id);
        }
        popped
    }

    pub fn by_lod(&self, level: usize) -> Vec<NodeId> {
        self.index
            .values()
            .filter(|(_, record)| record.lod_level == level)
            .map(|(_, record)| record.node_id.clone())
            .collect()
    }

    pub fn stats(&self) -> HeapStats {
        HeapStats {
            len: self.index.len(),
            min_importance: self
                .index
                .values()
                .map(|(_, record)| record.importance)
                .fold(None, |acc, v| Some(acc.map_or(v, |a: f64| a.min(v)))),
        }
    }

    /// Verifies the heap/index bijection the spec requires (§8). Returns
    /// `Err` describing the violation; callers rebuild from the graph on
    /// failure (spec §7 category 6 self-heal).
    pub fn check_integrity(&self) -> Result<(), String> {
        for (node_id, (seq, _)) in &self.index {
            let live_entry_exists = self
                .heap
                .iter()
                .any(|e| &e.node_id == node_id && e.seq == *seq);
            if !live_entry_exists {
                return Err(format!("node {node_id} has no corresponding heap slot"));
            }
        }
        Ok(())
    }
}

impl Default for PriorityHeap {
    fn default() -> Self {
        Self::new()
    }
}
