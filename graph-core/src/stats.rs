//! Stats surface returned by `GraphCoordinator::get_stats` (spec §6).

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum LoadingState {
    Idle,
    Loading,
    Evicting,
    Error,
}

#[derive(Clone, Debug, PartialEq)]
pub struct LoadingStatus {
    pub state: LoadingState,
    pub message: Option<String>,
    pub progress: Option<f64>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Stats {
    pub node_count: usize,
    pub edge_count: usize,
    pub is_loading: bool,
    pub has_more: bool,
    pub lod_level: usize,
    pub connectivity: Option<f64>,
    pub loading_status: LoadingStatus,
    pub tree: Option<TreeStats>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct TreeStats {
    pub tree_edges: usize,
    pub extra_edges: usize,
    pub disconnected_nodes: usize,
    pub connectivity_ratio: f64,
    pub enrichment_progress: f64,
}
