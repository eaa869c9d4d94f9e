use std::time::Duration;

use anyhow::Result;
use graph_common::preferences::Preferences;
use graph_core::backend::SearchQuery;
use graph_core::coordinator::GraphCoordinator;
use graph_core::events::{EventReceiver, GraphEvent};
use tokio::io::{AsyncBufReadExt, BufReader};

const ENRICH_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// The allow-list a coordinator filter expects: clusters this session has
/// explicitly marked visible. An empty map means no preference was ever
/// recorded, so nothing is filtered; clusters never mentioned after that
/// are treated as hidden, not shown-by-default.
pub fn visible_clusters_from(preferences: &Preferences) -> Option<Vec<u32>> {
    if preferences.cluster_visibility.is_empty() {
        return None;
    }
    Some(
        preferences
            .cluster_visibility
            .iter()
            .filter(|(_, visible)| **visible)
            .map(|(id, _)| *id)
            .collect(),
    )
}

fn print_event(event: GraphEvent) {
    match event {
        GraphEvent::NodesAdded(nodes) => tracing::info!(count = nodes.len(), "nodes added"),
        GraphEvent::NodesRemoved(ids) => tracing::info!(count = ids.len(), "nodes removed"),
        GraphEvent::LoadingFailed { reason } => tracing::warn!(reason, "loading failed"),
        GraphEvent::SearchFailed { reason } => tracing::warn!(reason, "search failed"),
        GraphEvent::Error { error, context } => tracing::error!(%error, context, "engine error"),
        GraphEvent::TreeEnrichmentCompleted { extra_edge_count } => {
            tracing::info!(extra_edge_count, "tree enrichment completed")
        }
        other => tracing::debug!(?other, "event"),
    }
}

fn spawn_event_printer(mut events: EventReceiver) {
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => print_event(event),
                Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!(skipped = n, "event receiver lagged");
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            }
        }
    });
}

fn print_stats(coordinator: &GraphCoordinator) {
    let stats = coordinator.get_stats();
    println!(
        "nodes={} edges={} lod={} loading={} connectivity={}",
        stats.node_count,
        stats.edge_count,
        stats.lod_level,
        stats.is_loading,
        stats
            .connectivity
            .map(|c| format!("{c:.3}"))
            .unwrap_or_else(|| "n/a".into()),
    );
    if let Some(tree) = stats.tree {
        println!(
            "  tree: tree_edges={} extra_edges={} disconnected={} enrichment={:.2}",
            tree.tree_edges, tree.extra_edges, tree.disconnected_nodes, tree.enrichment_progress,
        );
    }
}

fn print_help() {
    println!("commands:");
    println!("  center <x> <y> [ratio]   recenter the camera");
    println!("  pan <dx> <dy>            move the camera relative to its current center");
    println!("  zoom <ratio>             change the camera ratio in place");
    println!("  refresh                  reload the current viewport, bypassing the cache");
    println!("  search <query>           search and highlight a match");
    println!("  clear                    clear the active search highlight");
    println!("  clusters <id...|clear>   show only the given clusters, or clear the filter");
    println!("  mindegree <n|clear>      hide nodes under degree n, or clear the floor");
    println!("  stats                    print current engine stats");
    println!("  help                     print this message");
    println!("  quit | exit              save preferences and exit");
}

/// Drives the coordinator from stdin commands until `quit`/`exit`/EOF,
/// polling `maybe_enrich` between lines so tree-first dwell enrichment
/// still fires while the prompt sits idle.
pub async fn run(
    mut coordinator: GraphCoordinator,
    events: EventReceiver,
    mut preferences: Preferences,
    preferences_path: Option<String>,
) -> Result<()> {
    spawn_event_printer(events);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut ticker = tokio::time::interval(ENRICH_POLL_INTERVAL);

    let shutdown = std::sync::Arc::new(tokio::sync::Notify::new());
    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            graph_common::shutdown::shutdown_signal().await;
            shutdown.notify_one();
        }
    });

    print_stats(&coordinator);
    print_help();

    loop {
        print!("> ");
        use std::io::Write;
        std::io::stdout().flush().ok();

        let line = tokio::select! {
            biased;
            _ = shutdown.notified() => break,
            line = lines.next_line() => line?,
            _ = ticker.tick() => {
                if let Err(err) = coordinator.maybe_enrich().await {
                    tracing::warn!(%err, "enrichment failed");
                }
                continue;
            }
        };

        let Some(line) = line else { break };
        let mut parts = line.split_whitespace();
        let Some(cmd) = parts.next() else { continue };

        let result = match cmd {
            "center" => {
                let x: f64 = parts.next().unwrap_or("0").parse().unwrap_or(0.0);
                let y: f64 = parts.next().unwrap_or("0").parse().unwrap_or(0.0);
                let ratio = parts.next().and_then(|s| s.parse().ok());
                coordinator.center_on(x, y, ratio).await
            }
            "pan" => {
                let dx: f64 = parts.next().unwrap_or("0").parse().unwrap_or(0.0);
                let dy: f64 = parts.next().unwrap_or("0").parse().unwrap_or(0.0);
                let (cx, cy) = coordinator.current_bounds().center();
                coordinator.center_on(cx + dx, cy + dy, None).await
            }
            "zoom" => {
                let ratio: f64 = match parts.next().and_then(|s| s.parse().ok()) {
                    Some(r) => r,
                    None => {
                        println!("usage: zoom <ratio>");
                        continue;
                    }
                };
                let (cx, cy) = coordinator.current_bounds().center();
                coordinator.center_on(cx, cy, Some(ratio)).await
            }
            "refresh" => coordinator.refresh().await,
            "search" => {
                let q = parts.collect::<Vec<_>>().join(" ");
                if q.is_empty() {
                    println!("usage: search <query>");
                    continue;
                }
                match coordinator
                    .search_and_highlight(SearchQuery { q, limit: 10, ..Default::default() })
                    .await
                {
                    Ok(result) => {
                        println!(
                            "focus={:?} neighbors={:?}",
                            result.focus_ids, result.neighbor_ids
                        );
                        Ok(())
                    }
                    Err(err) => {
                        println!("search failed: {err}");
                        Ok(())
                    }
                }
            }
            "clear" => {
                coordinator.clear_search_highlight();
                Ok(())
            }
            "clusters" => {
                let ids: Vec<&str> = parts.collect();
                if ids.first() == Some(&"clear") {
                    preferences.cluster_visibility.clear();
                    coordinator.set_visible_clusters(None).await
                } else {
                    let parsed: Result<Vec<u32>, _> = ids.iter().map(|s| s.parse()).collect();
                    match parsed {
                        Ok(clusters) => {
                            preferences.cluster_visibility.clear();
                            for id in &clusters {
                                preferences.cluster_visibility.insert(*id, true);
                            }
                            coordinator.set_visible_clusters(Some(clusters)).await
                        }
                        Err(_) => {
                            println!("usage: clusters <id...> | clusters clear");
                            continue;
                        }
                    }
                }
            }
            "mindegree" => match parts.next() {
                Some("clear") => {
                    preferences.min_degree = None;
                    coordinator.set_min_degree(None).await
                }
                Some(value) => match value.parse() {
                    Ok(n) => {
                        preferences.min_degree = Some(n);
                        coordinator.set_min_degree(Some(n)).await
                    }
                    Err(_) => {
                        println!("usage: mindegree <n> | mindegree clear");
                        continue;
                    }
                },
                None => {
                    println!("usage: mindegree <n> | mindegree clear");
                    continue;
                }
            },
            "stats" => {
                print_stats(&coordinator);
                Ok(())
            }
            "help" => {
                print_help();
                Ok(())
            }
            "quit" | "exit" => break,
            other => {
                println!("unknown command: {other} (try `help`)");
                continue;
            }
        };

        if let Err(err) = result {
            println!("error: {err}");
        }
    }

    coordinator.destroy();

    if let Err(err) =
        graph_common::preferences::write_preferences(preferences_path.as_deref(), &preferences)
            .await
    {
        tracing::warn!(%err, "failed to persist preferences on exit");
    }

    Ok(())
}
