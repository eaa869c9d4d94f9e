//! The engine's public error surface. Internal plumbing uses
//! `anyhow::Result` with `.context(...)`; `GraphError` is only constructed
//! at the boundary an operation ultimately reports through (an emitted
//! event, or `searchAndHighlight`'s returned error).

/// The eight error categories from the spec's error-handling design.
/// Categories 1–4 and 6–7 are swallowed internally and surfaced only as
/// events; `searchAndHighlight` additionally rejects its caller with the
/// relevant variant.
#[derive(thiserror::Error, Debug, Clone)]
pub enum GraphError {
    #[error("request for {key} timed out")]
    Transient { key: String },

    #[error("request for {key} was cancelled")]
    Cancelled { key: String },

    #[error("request for {key} went stale before it could run")]
    Stale { key: String },

    #[error("backend returned an invalid response for {endpoint}: {detail}")]
    BackendInvalid { endpoint: String, detail: String },

    #[error("camera pathology detected: {detail}")]
    CameraPathology { detail: String },

    #[error("priority heap integrity violation: {detail}")]
    HeapIntegrity { detail: String },

    #[error("node {node_id} could not be connected to any loaded root")]
    Disconnected { node_id: String },

    #[error("fatal initialization failure: {detail}")]
    FatalInit { detail: String },

    #[error("no node matched query {query:?}")]
    SearchNotFound { query: String },

    #[error("internal error: {detail}")]
    Internal { detail: String },
}

impl GraphError {
    pub fn category(&self) -> &'static str {
        match self {
            GraphError::Transient { .. } => "transient",
            GraphError::Cancelled { .. } => "cancelled",
            GraphError::Stale { .. } => "stale",
            GraphError::BackendInvalid { .. } => "backend-invalid",
            GraphError::CameraPathology { .. } => "camera-pathology",
            GraphError::HeapIntegrity { .. } => "heap-integrity",
            GraphError::Disconnected { .. } => "disconnected",
            GraphError::FatalInit { .. } => "fatal-init",
            GraphError::SearchNotFound { .. } => "not-found",
            GraphError::Internal { .. } => "internal",
        }
    }
}
