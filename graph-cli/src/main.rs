use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use graph_common::config::Config;
use graph_common::metrics;
use graph_core::backend::http::HttpBackend;
use graph_core::backend::GraphBackend;
use graph_core::coordinator::GraphCoordinator;
use graph_core::strategy::StrategyKind;

mod args;
mod repl;

use args::{Cli, Commands, HealthArgs, RunArgs, Strategy};

async fn run(args: RunArgs) -> Result<()> {
    let config_path = match &args.config {
        Some(path) => std::path::PathBuf::from(path),
        None => Config::default_path().context("could not resolve a default config path")?,
    };
    let config = Config::load(&config_path).context("failed to load config")?;
    tracing::info!(path = %config_path.display(), "loaded config");

    metrics::maybe_install_metrics_recorder();

    let backend: Arc<dyn GraphBackend> =
        Arc::new(HttpBackend::new(&args.backend_url).context("failed to build backend client")?);

    let strategy_kind = match args.strategy {
        Strategy::Standard => StrategyKind::Standard,
        Strategy::TreeFirst => StrategyKind::TreeFirst,
    };

    let (mut coordinator, events) = GraphCoordinator::new(config, backend, strategy_kind);

    let preferences = graph_common::preferences::load_preferences(args.preferences.as_deref())
        .await
        .context("failed to load preferences")?
        .unwrap_or_default();
    tracing::info!(?preferences, "loaded preferences");

    coordinator.apply_initial_filters(repl::visible_clusters_from(&preferences), preferences.min_degree);
    coordinator.initialize().await?;

    repl::run(coordinator, events, preferences, args.preferences).await
}

async fn health(args: HealthArgs) -> Result<()> {
    let backend = HttpBackend::new(&args.backend_url).context("failed to build backend client")?;
    let bounds = backend
        .bounds()
        .await
        .context("backend health check failed")?;
    println!(
        "backend reachable: {} total nodes, bounds ({}, {}) - ({}, {})",
        bounds.total_nodes,
        bounds.bounds.min_x,
        bounds.bounds.min_y,
        bounds.bounds.max_x,
        bounds.bounds.max_y,
    );
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    graph_common::logging::init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run(args) => run(args).await,
        Commands::Health(args) => health(args).await,
    }
}
