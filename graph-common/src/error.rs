use std::path::PathBuf;

/// Errors raised by the ambient stack itself (config/preferences loading,
/// logging setup). The engine's own operational errors are `graph_core::GraphError`,
/// a separate typed surface at the engine's public boundary.
#[derive(thiserror::Error, Debug)]
pub enum CommonError {
    #[error("failed to read config file {path}")]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path} as TOML")]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("could not determine a home directory to resolve a default config/preferences path")]
    NoHomeDir,

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
