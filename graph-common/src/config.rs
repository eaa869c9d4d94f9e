use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::CommonError;

/// Top-level configuration for the streaming graph engine.
///
/// Every field has a default matching the values named in the spec this
/// engine implements; all of it can be overridden by a TOML file and/or
/// environment variables layered on top (see [`Config::load`]).
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub lod: LodConfig,
    pub performance: PerformanceConfig,
    pub memory: MemoryConfig,
    pub viewport: ViewportConfig,
    pub tree: TreeConfig,
    pub visual: VisualConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            lod: LodConfig::default(),
            performance: PerformanceConfig::default(),
            memory: MemoryConfig::default(),
            viewport: ViewportConfig::default(),
            tree: TreeConfig::default(),
            visual: VisualConfig::default(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LodConfig {
    /// Ascending camera-ratio thresholds, one per named level.
    pub thresholds: LodThresholds,
    /// Per-level `max_nodes`, `min_degree`, `load_edges`, indexed by level.
    pub levels: Vec<LodLevelConfig>,
}

impl Default for LodConfig {
    fn default() -> Self {
        Self {
            thresholds: LodThresholds::default(),
            levels: vec![
                LodLevelConfig {
                    name: "paper".into(),
                    max_nodes: 2_000,
                    min_degree: 0,
                    load_edges: true,
                },
                LodLevelConfig {
                    name: "topic".into(),
                    max_nodes: 1_200,
                    min_degree: 2,
                    load_edges: true,
                },
                LodLevelConfig {
                    name: "field".into(),
                    max_nodes: 600,
                    min_degree: 5,
                    load_edges: false,
                },
                LodLevelConfig {
                    name: "universe".into(),
                    max_nodes: 300,
                    min_degree: 10,
                    load_edges: false,
                },
            ],
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LodThresholds {
    pub paper: f64,
    pub topic: f64,
    pub field: f64,
    pub universe: f64,
}

impl Default for LodThresholds {
    fn default() -> Self {
        Self {
            paper: 2.0,
            topic: 8.0,
            field: 32.0,
            universe: f64::INFINITY,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct LodLevelConfig {
    pub name: String,
    pub max_nodes: usize,
    pub min_degree: u32,
    pub load_edges: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PerformanceConfig {
    pub cache: CacheConfig,
    pub loading: LoadingConfig,
    pub api: ApiConfig,
}

impl Default for PerformanceConfig {
    fn default() -> Self {
        Self {
            cache: CacheConfig::default(),
            loading: LoadingConfig::default(),
            api: ApiConfig::default(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CacheConfig {
    pub ttl_ms: u64,
    pub max_regions: usize,
    pub overlap_threshold: f64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_ms: 10_000,
            max_regions: 100,
            overlap_threshold: 0.9,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoadingConfig {
    pub batch_size: usize,
    pub min_batch_size: usize,
    pub max_batch_size: usize,
    pub max_concurrent_batches: usize,
    pub max_empty_batches: usize,
    pub early_termination: bool,
    pub smart_termination: bool,
    pub adaptive_batching: bool,
}

impl Default for LoadingConfig {
    fn default() -> Self {
        Self {
            batch_size: 200,
            min_batch_size: 100,
            max_batch_size: 500,
            max_concurrent_batches: 3,
            max_empty_batches: 2,
            early_termination: true,
            smart_termination: true,
            adaptive_batching: true,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ApiConfig {
    pub timeout_ms: u64,
    pub max_retries: u32,
    pub retry_delay_ms: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 15_000,
            max_retries: 2,
            retry_delay_ms: 250,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct MemoryConfig {
    pub max_total_nodes: usize,
    pub cleanup_threshold: f64,
    pub aggressive_cleanup: bool,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            max_total_nodes: 10_000,
            cleanup_threshold: 0.9,
            aggressive_cleanup: false,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ViewportConfig {
    pub coordinate_scale: f64,
    pub initial_ratio: f64,
    pub initial_bounds: InitialBounds,
}

impl Default for ViewportConfig {
    fn default() -> Self {
        Self {
            coordinate_scale: 1.0,
            initial_ratio: 1.0,
            initial_bounds: InitialBounds::default(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct InitialBounds {
    pub x_min: f64,
    pub x_max: f64,
    pub y_min: f64,
    pub y_max: f64,
}

impl Default for InitialBounds {
    fn default() -> Self {
        Self {
            x_min: -300.0,
            x_max: 300.0,
            y_min: -300.0,
            y_max: 300.0,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TreeConfig {
    pub dwell_delay_ms: u64,
    pub enrichment_priority: i64,
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            dwell_delay_ms: 1_000,
            enrichment_priority: -10,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct VisualConfig {
    pub nodes: NodeVisualConfig,
    pub edges: EdgeVisualConfig,
    pub search: SearchVisualConfig,
}

impl Default for VisualConfig {
    fn default() -> Self {
        Self {
            nodes: NodeVisualConfig::default(),
            edges: EdgeVisualConfig::default(),
            search: SearchVisualConfig::default(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct NodeVisualConfig {
    pub default_size: f64,
    pub default_color: String,
}

impl Default for NodeVisualConfig {
    fn default() -> Self {
        Self {
            default_size: 4.0,
            default_color: "#7f8c8d".into(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EdgeVisualConfig {
    pub default_color: String,
    pub default_size: f64,
}

impl Default for EdgeVisualConfig {
    fn default() -> Self {
        Self {
            default_color: "#bdc3c7".into(),
            default_size: 1.0,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SearchVisualConfig {
    pub focus_node_color: String,
    pub neighbor_node_color: String,
    pub focus_edge_color: String,
    pub focus_edge_size: f64,
    pub fade_opacity: f64,
}

impl Default for SearchVisualConfig {
    fn default() -> Self {
        Self {
            focus_node_color: "#e74c3c".into(),
            neighbor_node_color: "#f39c12".into(),
            focus_edge_color: "#e74c3c".into(),
            focus_edge_size: 2.0,
            fade_opacity: 0.25,
        }
    }
}

impl Config {
    /// Loads config from a TOML file, falling back to defaults if the file
    /// doesn't exist. Environment variables prefixed `GRAPH_` are not parsed
    /// here; `graph-cli`'s `clap` arg struct applies those on top.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, CommonError> {
        let path = path.as_ref();
        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(source) if source.kind() == std::io::ErrorKind::NotFound => {
                return Ok(Config::default());
            }
            Err(source) => {
                return Err(CommonError::ConfigRead {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };
        toml::from_str(&contents).map_err(|source| CommonError::ConfigParse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("graph-engine").join("config.toml"))
    }
}
