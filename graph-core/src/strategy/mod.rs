//! Loading Strategy (C8), pluggable variants. Per the design notes,
//! variants are tagged and dispatch is explicit (a `match` on
//! [`StrategyKind`]), not a dynamic class lookup.

pub mod standard;
pub mod tree_first;

use crate::model::{BrokenEdge, Edge, Node};

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum StrategyKind {
    Standard,
    TreeFirst,
}

#[derive(Clone, Debug, Default)]
pub struct LoadStats {
    pub batches_fetched: usize,
    pub empty_batches: usize,
    pub connectivity: Option<f64>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOutcome {
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
    pub broken_edges: Vec<BrokenEdge>,
    pub has_more: bool,
    pub stats: LoadStats,
}
