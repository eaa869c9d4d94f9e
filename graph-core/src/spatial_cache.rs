//! Spatial Cache (C2): advisory record of viewport tiles already loaded per
//! LOD, with TTL and a size cap. Pruning follows the teacher's
//! `select_nth_unstable`-based soft/hard prune split in `ViewManager`.

use rustc_hash::FxHashMap;

use crate::model::Tile;

#[derive(Clone, Copy, Debug)]
struct TileRecord {
    inserted_at_ms: i64,
    node_count: usize,
}

pub struct SpatialCache {
    tiles: FxHashMap<Tile, TileRecord>,
    ttl_ms: i64,
    max_regions: usize,
}

impl SpatialCache {
    pub fn new(ttl_ms: i64, max_regions: usize) -> Self {
        Self { tiles: FxHashMap::default(), ttl_ms, max_regions }
    }

    /// Reports hit iff an unexpired record exists for `tile` at `now_ms`. A
    /// miss (including an expired record) forces the caller to fetch.
    pub fn is_hit(&self, tile: &Tile, now_ms: i64) -> bool {
        match self.tiles.get(tile) {
            Some(record) => now_ms - record.inserted_at_ms <= self.ttl_ms,
            None => false,
        }
    }

    /// Records a tile as loaded, pruning expired records first and then, if
    /// still over `max_regions`, the oldest records until size is back
    /// within budget.
    pub fn insert(&mut self, tile: Tile, node_count: usize, now_ms: i64) {
        self.tiles.insert(tile, TileRecord { inserted_at_ms: now_ms, node_count });
        self.prune_expired(now_ms);
        self.prune_over_capacity();
    }

    pub fn prune_expired(&mut self, now_ms: i64) -> usize {
        let before = self.tiles.len();
        self.tiles.retain(|_, record| now_ms - record.inserted_at_ms <= self.ttl_ms);
        before - self.tiles.len()
    }

    /// Evicts the oldest records until `len() <= max_regions`, using
    /// `select_nth_unstable` over insertion timestamps the way the teacher's
    /// `maybe_hard_prune_cache` avoids a full sort for a simple
    /// keep-the-N-newest prune.
    pub fn prune_over_capacity(&mut self) -> usize {
        let len = self.tiles.len();
        if len <= self.max_regions {
            return 0;
        }
        let mut timestamps: Vec<i64> = self.tiles.values().map(|r| r.inserted_at_ms).collect();
        let cutoff_index = len - self.max_regions;
        let (_, cutoff, _) = timestamps.select_nth_unstable(cutoff_index.saturating_sub(1).max(0));
        let cutoff_ms = *cutoff;
        let before = self.tiles.len();
        self.tiles.retain(|_, record| record.inserted_at_ms > cutoff_ms);
        before - self.tiles.len()
    }

    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }

    pub fn clear(&mut self) {
        self.tiles.clear();
    }
}
