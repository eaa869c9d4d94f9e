//! Graph Coordinator (C10): the single-writer orchestrator wiring every
//! other component together behind the public operations a host
//! application drives (`initialize`, `updateViewport`, `centerOn`, ...).

use std::sync::Arc;
use std::time::{Duration, Instant};

use graph_common::config::Config;

use crate::backend::{GraphBackend, SearchQuery};
use crate::edge_store::EdgeStore;
use crate::error::GraphError;
use crate::events::{self, EventReceiver, EventSender, GraphEvent};
use crate::lod;
use crate::model::{Bounds, LodLevel, NodeImportanceRecord};
use crate::node_store::NodeStore;
use crate::priority_heap::PriorityHeap;
use crate::request_coordinator::{CoordinatorConfig, RequestCoordinator};
use crate::search::{HighlightResult, SearchHighlighter};
use crate::spatial_cache::SpatialCache;
use crate::stats::{LoadingState, LoadingStatus, Stats, TreeStats};
use crate::strategy::standard::StandardStrategy;
use crate::strategy::tree_first::TreeFirstStrategy;
use crate::strategy::StrategyKind;
use crate::tree_state::TreeStateManager;
use crate::viewport_service::{ScreenCorners, ViewportService};

/// Consecutive no-movement updates tolerated before freezing (spec §4.7).
const STORM_N_MAX: u32 = 3;
const STORM_COOLDOWN: Duration = Duration::from_secs(2);
const HARD_LOADING_TIMEOUT: Duration = Duration::from_secs(15);

pub struct GraphCoordinator {
    config: Config,
    backend: Arc<dyn GraphBackend>,
    requests: RequestCoordinator,
    cache: SpatialCache,
    viewport: ViewportService,
    nodes: NodeStore,
    edges: EdgeStore,
    tree_state: TreeStateManager,
    heap: PriorityHeap,
    highlighter: SearchHighlighter,
    lod_levels: Vec<LodLevel>,
    strategy_kind: StrategyKind,
    standard: StandardStrategy,
    tree_first: TreeFirstStrategy,
    events: EventSender,
    state: LoadingState,
    visible_clusters: Option<Vec<u32>>,
    quality_min_degree: Option<u32>,
    storm_count: u32,
    frozen_until: Option<Instant>,
    last_bounds_hash: Option<u64>,
    last_move_at: Option<Instant>,
    dwell_pending: bool,
    destroyed: bool,
}

impl GraphCoordinator {
    pub fn new(config: Config, backend: Arc<dyn GraphBackend>, strategy_kind: StrategyKind) -> (Self, EventReceiver) {
        let (events, receiver) = events::channel();
        let lod_levels = lod::build_levels(&config.lod);
        let coordinator_config = CoordinatorConfig {
            max_concurrent: config.performance.loading.max_concurrent_batches,
            throttle: Duration::from_millis(100),
            stale_after: HARD_LOADING_TIMEOUT,
            poll_interval: Duration::from_millis(15),
        };
        let viewport = ViewportService::new(&config.viewport, Duration::from_millis(100));
        let cache = SpatialCache::new(config.performance.cache.ttl_ms as i64, config.performance.cache.max_regions);

        let coordinator = Self {
            requests: RequestCoordinator::new(coordinator_config),
            cache,
            viewport,
            nodes: NodeStore::new(5.0),
            edges: EdgeStore::new(),
            tree_state: TreeStateManager::new(),
            heap: PriorityHeap::new(),
            highlighter: SearchHighlighter::new(),
            lod_levels,
            strategy_kind,
            standard: StandardStrategy::new(),
            tree_first: TreeFirstStrategy::new(),
            events,
            state: LoadingState::Idle,
            visible_clusters: None,
            quality_min_degree: None,
            storm_count: 0,
            frozen_until: None,
            last_bounds_hash: None,
            last_move_at: None,
            dwell_pending: false,
            destroyed: false,
            config,
            backend,
        };
        (coordinator, receiver)
    }

    pub fn subscribe(&self) -> EventReceiver {
        self.events.subscribe()
    }

    pub fn current_bounds(&self) -> Bounds {
        self.viewport.current_bounds()
    }

    fn emit(&self, event: GraphEvent) {
        self.log_event(&event);
        self.mirror_metrics(&event);
        // No subscribers is not an error: events are fire-and-forget.
        let _ = self.events.send(event);
    }

    fn log_event(&self, event: &GraphEvent) {
        match event {
            GraphEvent::Initialized => tracing::info!("initialized"),
            GraphEvent::ViewportChanged { lod_level } => tracing::debug!(lod_level, "viewport changed"),
            GraphEvent::LoadingStarted => tracing::debug!("loading started"),
            GraphEvent::LoadingCompleted { node_count, edge_count } => {
                tracing::info!(node_count, edge_count, "loading completed")
            }
            GraphEvent::LoadingFailed { reason } => tracing::warn!(%reason, "loading failed"),
            GraphEvent::NodesAdded(nodes) => tracing::debug!(count = nodes.len(), "nodes added"),
            GraphEvent::NodesRemoved(ids) => tracing::debug!(count = ids.len(), "nodes removed"),
            GraphEvent::EdgesAdded(edges) => tracing::debug!(count = edges.len(), "edges added"),
            GraphEvent::EdgesRemoved(ids) => tracing::debug!(count = ids.len(), "edges removed"),
            GraphEvent::StatsUpdated(_) => {}
            GraphEvent::SearchHighlighted { focus_ids, neighbor_ids } => tracing::info!(
                focus = focus_ids.len(),
                neighbors = neighbor_ids.len(),
                "search highlighted"
            ),
            GraphEvent::SearchCleared => tracing::debug!("search cleared"),
            GraphEvent::SearchFailed { reason } => tracing::warn!(%reason, "search failed"),
            GraphEvent::TreeEnrichmentCompleted { extra_edge_count } => {
                tracing::info!(extra_edge_count, "tree enrichment completed")
            }
            GraphEvent::Destroyed => tracing::info!("destroyed"),
            GraphEvent::Error { error, context } => {
                if error.category() == "fatal-init" {
                    tracing::error!(%error, context, "fatal error");
                } else {
                    tracing::warn!(%error, context, "recoverable error");
                }
            }
        }
    }

    fn mirror_metrics(&self, event: &GraphEvent) {
        match event {
            GraphEvent::NodesAdded(_) | GraphEvent::NodesRemoved(_) => {
                graph_common::metrics::nodes_total(self.nodes.count() as u64);
            }
            GraphEvent::EdgesAdded(_) | GraphEvent::EdgesRemoved(_) => {
                graph_common::metrics::edges_total(self.edges.count() as u64);
            }
            _ => {}
        }
        match event {
            GraphEvent::NodesRemoved(ids) => graph_common::metrics::nodes_evicted(ids.len() as u64),
            GraphEvent::SearchHighlighted { focus_ids, neighbor_ids } => {
                graph_common::metrics::search_completed((focus_ids.len() + neighbor_ids.len()) as u64)
            }
            GraphEvent::Error { error, .. } => graph_common::metrics::loading_failed(error.category()),
            _ => {}
        }
    }

    fn now_ms() -> i64 {
        chrono::Utc::now().timestamp_millis()
    }

    /// Fetches world bounds, centers the camera, and issues the first
    /// viewport load at the resolved LOD.
    pub async fn initialize(&mut self) -> Result<(), GraphError> {
        let bounds = self
            .backend
            .bounds()
            .await
            .map_err(|err| GraphError::FatalInit { detail: err.to_string() })?;
        let (cx, cy) = bounds.bounds.center();
        let scale = self.config.viewport.coordinate_scale;
        self.viewport.center_on(cx * scale, cy * scale, Some(self.config.viewport.initial_ratio));

        self.emit(GraphEvent::Initialized);
        self.load_current_viewport(true).await
    }

    /// Cancels everything in flight, clears all owned state, and marks the
    /// coordinator unusable. A process should drop it after this.
    pub fn destroy(&mut self) {
        self.requests.emergency_reset();
        self.highlighter.clear();
        self.tree_state.clear();
        self.destroyed = true;
        self.emit(GraphEvent::Destroyed);
    }

    pub fn get_stats(&self) -> Stats {
        let connectivity = match self.strategy_kind {
            StrategyKind::TreeFirst => {
                let total = self.nodes.count();
                if total == 0 {
                    Some(1.0)
                } else {
                    let disconnected = self.tree_state.find_disconnected(self.nodes.iter().map(|n| &n.id)).len();
                    Some(1.0 - disconnected as f64 / total as f64)
                }
            }
            StrategyKind::Standard => None,
        };
        let tree = matches!(self.strategy_kind, StrategyKind::TreeFirst).then(|| TreeStats {
            tree_edges: self.edges.iter().filter(|e| matches!(e.kind, crate::model::EdgeKind::Tree)).count(),
            extra_edges: self.edges.iter().filter(|e| matches!(e.kind, crate::model::EdgeKind::Extra)).count(),
            disconnected_nodes: self.tree_state.find_disconnected(self.nodes.iter().map(|n| &n.id)).len(),
            connectivity_ratio: connectivity.unwrap_or(1.0),
            enrichment_progress: if self.dwell_pending { 0.0 } else { 1.0 },
        });

        Stats {
            node_count: self.nodes.count(),
            edge_count: self.edges.count(),
            is_loading: matches!(self.state, LoadingState::Loading),
            has_more: false,
            lod_level: self.current_level_index(),
            connectivity,
            loading_status: LoadingStatus {
                state: self.state,
                message: None,
                progress: None,
            },
            tree,
        }
    }

    fn current_level_index(&self) -> usize {
        lod::resolve_level(&self.lod_levels, self.viewport.current_viewport().camera_ratio)
    }

    /// Projects screen corners to world bounds and, subject to the
    /// duplicate-viewport guard and update-storm freeze, reloads the
    /// viewport at the resolved LOD.
    pub async fn update_viewport(
        &mut self,
        corners: ScreenCorners,
        camera_ratio: f64,
        user_initiated: bool,
    ) -> Result<(), GraphError> {
        if self.destroyed {
            return Ok(());
        }
        if matches!(self.state, LoadingState::Loading) && !user_initiated {
            return Ok(());
        }
        if let Some(until) = self.frozen_until
            && Instant::now() < until
        {
            return Ok(());
        }

        let bounds = self.viewport.project_screen_to_world(corners, camera_ratio);
        let hash = hash_bounds_6dp(&bounds);
        let moved = self.last_bounds_hash != Some(hash);
        self.last_bounds_hash = Some(hash);
        self.last_move_at = Some(Instant::now());

        if moved {
            self.storm_count = 0;
        } else {
            self.storm_count += 1;
            if self.storm_count > STORM_N_MAX {
                self.frozen_until = Some(Instant::now() + STORM_COOLDOWN);
                return Ok(());
            }
        }

        self.load_current_viewport(user_initiated).await
    }

    /// Re-runs the load for the current viewport regardless of the
    /// duplicate-viewport guard (used by `refresh` and cluster/quality
    /// filter changes).
    pub async fn refresh(&mut self) -> Result<(), GraphError> {
        self.last_bounds_hash = None;
        self.load_current_viewport(true).await
    }

    pub async fn center_on(&mut self, x: f64, y: f64, ratio: Option<f64>) -> Result<(), GraphError> {
        if self.destroyed {
            return Ok(());
        }
        self.viewport.center_on(x, y, ratio);
        self.last_bounds_hash = None;
        self.load_current_viewport(true).await
    }

    /// Seeds cluster-visibility/quality filters before the first load.
    /// Unlike `set_visible_clusters`/`set_min_degree` this does no eviction
    /// or refresh, since nothing is loaded yet; call before `initialize`.
    pub fn apply_initial_filters(&mut self, visible_clusters: Option<Vec<u32>>, min_degree: Option<u32>) {
        self.visible_clusters = visible_clusters;
        self.quality_min_degree = min_degree;
    }

    /// Changes which clusters are visible, evicting any already-loaded node
    /// whose cluster is no longer in the set, then re-runs the viewport
    /// load so the backend stops returning hidden-cluster nodes too.
    pub async fn set_visible_clusters(&mut self, clusters: Option<Vec<u32>>) -> Result<(), GraphError> {
        if self.destroyed {
            return Ok(());
        }
        self.visible_clusters = clusters;
        self.evict_filtered();
        self.refresh().await
    }

    /// Raises (or clears) the runtime quality floor, evicting any
    /// already-loaded node now below it, then re-runs the viewport load.
    pub async fn set_min_degree(&mut self, min_degree: Option<u32>) -> Result<(), GraphError> {
        if self.destroyed {
            return Ok(());
        }
        self.quality_min_degree = min_degree;
        self.evict_filtered();
        self.refresh().await
    }

    fn passes_filters(&self, node: &crate::model::Node) -> bool {
        if let Some(clusters) = &self.visible_clusters
            && !clusters.contains(&node.cluster_id)
        {
            return false;
        }
        if let Some(min_degree) = self.quality_min_degree
            && node.degree < min_degree
        {
            return false;
        }
        true
    }

    /// Evicts every loaded node that fails the current cluster-visibility
    /// or quality filter, cascading into edges/heap/tree state the same
    /// way capacity eviction does, and clears the tile cache so the next
    /// load re-fetches rather than trusting stale tile hits.
    fn evict_filtered(&mut self) {
        let failing: Vec<crate::model::NodeId> =
            self.nodes.iter().filter(|node| !self.passes_filters(node)).map(|node| node.id.clone()).collect();
        self.cache.clear();
        if failing.is_empty() {
            return;
        }
        self.nodes.remove(&failing);
        for id in &failing {
            self.edges.remove_incident_to(id);
            self.tree_state.remove_node(id);
            self.heap.remove(id);
        }
        self.emit(GraphEvent::NodesRemoved(failing.iter().map(|id| id.to_string()).collect()));
    }

    async fn load_current_viewport(&mut self, user_initiated: bool) -> Result<(), GraphError> {
        let bounds = self.viewport.current_bounds();
        let level_index = self.current_level_index();
        let mut level = self.lod_levels[level_index].clone();
        if let Some(min_degree) = self.quality_min_degree {
            level.min_degree = level.min_degree.max(min_degree);
        }
        let num_levels = self.lod_levels.len();
        let now_ms = Self::now_ms();

        self.last_move_at = Some(Instant::now());
        self.state = LoadingState::Loading;
        self.emit(GraphEvent::LoadingStarted);

        let outcome = tokio::time::timeout(HARD_LOADING_TIMEOUT, self.run_strategy(&level, num_levels, bounds, user_initiated, now_ms)).await;

        let outcome = match outcome {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(err)) => {
                self.state = LoadingState::Idle;
                let graph_err = GraphError::Transient { key: format!("viewport:{level_index}") };
                self.emit(GraphEvent::LoadingFailed { reason: err.to_string() });
                self.emit(GraphEvent::Error { error: graph_err.clone(), context: "load_current_viewport" });
                return Err(graph_err);
            }
            Err(_) => {
                self.state = LoadingState::Idle;
                let graph_err = GraphError::Transient { key: format!("viewport:{level_index}") };
                self.emit(GraphEvent::LoadingFailed { reason: "hard loading timeout".into() });
                self.emit(GraphEvent::Error { error: graph_err.clone(), context: "load_current_viewport" });
                return Err(graph_err);
            }
        };

        let inserted_ids = self.nodes.add(outcome.nodes.clone());
        self.edges.add(outcome.edges.clone(), &self.nodes);

        // Recompute over the whole loaded set, not just this batch: a node
        // fetched on an earlier pan that the camera has now moved back over
        // needs its in-viewport bonus restored, and one panned away from
        // needs it withdrawn so eviction can reclaim it again.
        self.refresh_importance(bounds, level_index, num_levels, now_ms);

        if !inserted_ids.is_empty() {
            self.emit(GraphEvent::NodesAdded(outcome.nodes.clone()));
        }
        if !outcome.edges.is_empty() {
            self.emit(GraphEvent::EdgesAdded(outcome.edges.clone()));
        }

        self.state = LoadingState::Evicting;
        let evicted = self.evict_over_capacity();
        if !evicted.is_empty() {
            self.emit(GraphEvent::NodesRemoved(evicted.iter().map(|id| id.to_string()).collect()));
        }

        self.state = LoadingState::Idle;
        self.emit(GraphEvent::LoadingCompleted { node_count: self.nodes.count(), edge_count: self.edges.count() });
        let stats = self.get_stats();
        self.emit(GraphEvent::StatsUpdated(stats));

        if self.viewport.should_emit_change() {
            self.viewport.mark_emitted();
            self.emit(GraphEvent::ViewportChanged { lod_level: level_index });
        }
        self.dwell_pending = matches!(self.strategy_kind, StrategyKind::TreeFirst);

        Ok(())
    }

    async fn run_strategy(
        &mut self,
        level: &LodLevel,
        num_levels: usize,
        bounds: Bounds,
        user_initiated: bool,
        now_ms: i64,
    ) -> anyhow::Result<crate::strategy::LoadOutcome> {
        match self.strategy_kind {
            StrategyKind::Standard => {
                self.standard
                    .load_viewport(
                        self.backend.as_ref(),
                        &self.requests,
                        &mut self.cache,
                        level,
                        num_levels,
                        bounds,
                        self.visible_clusters.as_deref(),
                        &self.config.performance.loading,
                        &self.config.performance.api,
                        user_initiated,
                        now_ms,
                    )
                    .await
            }
            StrategyKind::TreeFirst => {
                self.tree_first
                    .load_viewport(
                        self.backend.as_ref(),
                        &self.requests,
                        &mut self.cache,
                        &mut self.tree_state,
                        level,
                        num_levels,
                        bounds,
                        self.visible_clusters.as_deref(),
                        &self.config.performance.loading,
                        &self.config.performance.api,
                        user_initiated,
                        now_ms,
                    )
                    .await
            }
        }
    }

    /// Recomputes `in_viewport` and importance for every currently loaded
    /// node against `bounds`, and writes the result back into the heap.
    fn refresh_importance(&mut self, bounds: Bounds, level_index: usize, num_levels: usize, now_ms: i64) {
        let center = bounds.center();
        let records: Vec<NodeImportanceRecord> = self
            .nodes
            .iter()
            .map(|node| {
                let distance = ((node.x - center.0).powi(2) + (node.y - center.1).powi(2)).sqrt();
                let in_viewport = bounds.contains_point(node.x, node.y);
                let importance = crate::priority_heap::compute_importance(
                    node.degree,
                    distance,
                    now_ms,
                    node.last_seen_ms,
                    level_index,
                    num_levels,
                    in_viewport,
                );
                NodeImportanceRecord {
                    node_id: node.id.clone(),
                    degree: node.degree,
                    distance_from_center: distance,
                    last_seen_ms: node.last_seen_ms,
                    lod_level: level_index,
                    importance,
                    in_viewport,
                }
            })
            .collect();
        for record in records {
            self.heap.add_or_update(record);
        }
    }

    /// Evicts the lowest-importance nodes until the total is back at or
    /// below `memory.max_total_nodes`.
    fn evict_over_capacity(&mut self) -> Vec<crate::model::NodeId> {
        let cap = self.config.memory.max_total_nodes;
        let total = self.nodes.count();
        if total <= cap {
            return Vec::new();
        }
        let excess = total - cap;
        let victims = self.heap.pop_lowest_n(excess);
        self.nodes.remove(&victims);
        for id in &victims {
            self.edges.remove_incident_to(id);
            self.tree_state.remove_node(id);
        }
        victims
    }

    /// Called periodically by the host loop; triggers tree-first
    /// enrichment once the camera has dwelled (no movement) for the
    /// configured delay.
    pub async fn maybe_enrich(&mut self) -> Result<(), GraphError> {
        if self.destroyed || !self.dwell_pending || !matches!(self.strategy_kind, StrategyKind::TreeFirst) {
            return Ok(());
        }
        let Some(last_move) = self.last_move_at else { return Ok(()) };
        if last_move.elapsed() < Duration::from_millis(self.config.tree.dwell_delay_ms) {
            return Ok(());
        }
        if !matches!(self.state, LoadingState::Idle) {
            return Ok(());
        }
        self.dwell_pending = false;

        let bounds = self.viewport.current_bounds();
        let loaded_ids: Vec<_> = self.nodes.ids_in_bounds(&bounds);
        let extra = self
            .tree_first
            .enrich(
                self.backend.as_ref(),
                &self.requests,
                &self.tree_state,
                &loaded_ids,
                &bounds,
                &self.config.performance.loading,
            )
            .await
            .map_err(|err| GraphError::Internal { detail: err.to_string() })?;

        let before = self.edges.count();
        self.edges.add(extra, &self.nodes);
        let added = self.edges.count() - before;
        self.emit(GraphEvent::TreeEnrichmentCompleted { extra_edge_count: added });
        Ok(())
    }

    pub async fn search_and_highlight(&mut self, query: SearchQuery) -> Result<HighlightResult, GraphError> {
        let now_ms = Self::now_ms();
        let result = self
            .highlighter
            .search_and_highlight(
                self.backend.as_ref(),
                &mut self.nodes,
                &mut self.edges,
                &mut self.viewport,
                &self.config.visual.search,
                query,
                10,
                crate::search::DEFAULT_K_FOCUS,
                now_ms,
            )
            .await;
        match &result {
            Ok(highlight) => self.emit(GraphEvent::SearchHighlighted {
                focus_ids: highlight.focus_ids.iter().map(|id| id.to_string()).collect(),
                neighbor_ids: highlight.neighbor_ids.iter().map(|id| id.to_string()).collect(),
            }),
            Err(err) => self.emit(GraphEvent::SearchFailed { reason: err.to_string() }),
        }
        result
    }

    pub fn clear_search_highlight(&mut self) {
        if self.highlighter.clear().is_some() {
            self.emit(GraphEvent::SearchCleared);
        }
    }
}

fn hash_bounds_6dp(bounds: &Bounds) -> u64 {
    const FNV_OFFSET: u64 = 0xcbf29ce484222325;
    const FNV_PRIME: u64 = 0x100000001b3;
    let round = |v: f64| -> i64 { (v * 1_000_000.0).round() as i64 };
    let coords = [round(bounds.min_x), round(bounds.max_x), round(bounds.min_y), round(bounds.max_y)];
    let mut hash = FNV_OFFSET;
    for coord in coords {
        for byte in coord.to_le_bytes() {
            hash ^= byte as u64;
            hash = hash.wrapping_mul(FNV_PRIME);
        }
    }
    hash
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::backend::{
        EdgePriority, GraphBounds, NodesBoxQuery, NodesPage, SearchHit, TreeInBoxQuery, TreeInBoxResult,
    };
    use crate::model::{Edge, Node, NodeId};

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
            Ok(NodesPage { nodes: vec![node("a", 0.0, 0.0), node("b", 1.0, 1.0)], has_more: false })
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
            Ok(GraphBounds { bounds: Bounds::new(-269.1, 273.1, -299.4, 272.5), total_nodes: 72_493 })
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

    #[tokio::test]
    async fn initialize_centers_camera_on_backend_bounds() {
        let (mut coordinator, _rx) =
            GraphCoordinator::new(Config::default(), Arc::new(StubBackend), StrategyKind::Standard);
        coordinator.initialize().await.unwrap();
        let center = coordinator.viewport.current_bounds().center();
        let scale = coordinator.config.viewport.coordinate_scale;
        assert!((center.0 - (2.0 * scale)).abs() < 5.0);
        assert_eq!(coordinator.nodes.count(), 2);
    }

    #[tokio::test]
    async fn duplicate_viewport_is_a_no_op() {
        let (mut coordinator, _rx) =
            GraphCoordinator::new(Config::default(), Arc::new(StubBackend), StrategyKind::Standard);
        coordinator.initialize().await.unwrap();
        let before = coordinator.nodes.count();
        let corners = ScreenCorners {
            top_left: (coordinator.viewport.current_bounds().min_x, coordinator.viewport.current_bounds().min_y),
            top_right: (coordinator.viewport.current_bounds().max_x, coordinator.viewport.current_bounds().min_y),
            bottom_left: (coordinator.viewport.current_bounds().min_x, coordinator.viewport.current_bounds().max_y),
            bottom_right: (coordinator.viewport.current_bounds().max_x, coordinator.viewport.current_bounds().max_y),
        };
        coordinator.update_viewport(corners, 1.0, true).await.unwrap();
        assert_eq!(coordinator.nodes.count(), before);
    }

    #[tokio::test]
    async fn destroy_cancels_and_clears() {
        let (mut coordinator, _rx) =
            GraphCoordinator::new(Config::default(), Arc::new(StubBackend), StrategyKind::Standard);
        coordinator.initialize().await.unwrap();
        coordinator.destroy();
        assert!(coordinator.destroyed);
        assert_eq!(coordinator.requests.active_count(), 0);
    }
}
