//! Typed event surface the Graph Coordinator emits (spec §4.9). Consumers
//! subscribe via a `tokio::sync::broadcast` receiver rather than a
//! JS-style `on`/`off` callback registry.

use crate::error::GraphError;
use crate::model::{Edge, Node};
use crate::stats::Stats;

#[derive(Clone, Debug)]
pub enum GraphEvent {
    Initialized,
    ViewportChanged { lod_level: usize },
    LoadingStarted,
    LoadingCompleted { node_count: usize, edge_count: usize },
    LoadingFailed { reason: String },
    NodesAdded(Vec<Node>),
    NodesRemoved(Vec<String>),
    EdgesAdded(Vec<Edge>),
    EdgesRemoved(Vec<String>),
    StatsUpdated(Stats),
    SearchHighlighted { focus_ids: Vec<String>, neighbor_ids: Vec<String> },
    SearchCleared,
    SearchFailed { reason: String },
    TreeEnrichmentCompleted { extra_edge_count: usize },
    Destroyed,
    Error { error: GraphError, context: &'static str },
}

pub const EVENT_CHANNEL_CAPACITY: usize = 256;

pub type EventSender = tokio::sync::broadcast::Sender<GraphEvent>;
pub type EventReceiver = tokio::sync::broadcast::Receiver<GraphEvent>;

pub fn channel() -> (EventSender, EventReceiver) {
    tokio::sync::broadcast::channel(EVENT_CHANNEL_CAPACITY)
}
