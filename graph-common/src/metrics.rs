use std::sync::OnceLock;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

static PROM_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Installs the global Prometheus recorder exactly once, process-wide.
/// Safe to call from multiple places; only the first call takes effect.
fn install_recorder_once() -> &'static PrometheusHandle {
    PROM_HANDLE.get_or_init(|| {
        PrometheusBuilder::new()
            .install_recorder()
            .expect("install global metrics recorder")
    })
}

/// Installs the metrics recorder if `GRAPH_METRICS` is set, returning a
/// handle whose `render()` produces the Prometheus text exposition format.
/// Opt-in, mirroring how the engine never assumes a metrics backend exists.
pub fn maybe_install_metrics_recorder() -> Option<PrometheusHandle> {
    let enabled = std::env::var("GRAPH_METRICS")
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(false);
    if !enabled {
        return None;
    }
    Some(install_recorder_once().clone())
}

pub fn request_queued(kind: &'static str) {
    counter!("graph_request_queued_total", "kind" => kind).increment(1);
}

pub fn request_dropped(kind: &'static str, reason: &'static str) {
    counter!("graph_request_dropped_total", "kind" => kind, "reason" => reason).increment(1);
}

pub fn request_completed(kind: &'static str, elapsed_secs: f64) {
    counter!("graph_request_completed_total", "kind" => kind).increment(1);
    histogram!("graph_request_duration_seconds", "kind" => kind).record(elapsed_secs);
}

pub fn cache_hit(lod_level: usize) {
    counter!("graph_cache_hit_total", "lod_level" => lod_level.to_string()).increment(1);
}

pub fn cache_miss(lod_level: usize) {
    counter!("graph_cache_miss_total", "lod_level" => lod_level.to_string()).increment(1);
}

pub fn cache_pruned(count: u64) {
    counter!("graph_cache_pruned_total").increment(count);
}

pub fn nodes_total(count: u64) {
    gauge!("graph_nodes_total").set(count as f64);
}

pub fn edges_total(count: u64) {
    gauge!("graph_edges_total").set(count as f64);
}

pub fn nodes_evicted(count: u64) {
    counter!("graph_nodes_evicted_total").increment(count);
}

pub fn loading_failed(reason: &'static str) {
    counter!("graph_loading_failed_total", "reason" => reason).increment(1);
}

pub fn search_completed(result_count: u64) {
    counter!("graph_search_completed_total").increment(1);
    histogram!("graph_search_result_count").record(result_count as f64);
}
