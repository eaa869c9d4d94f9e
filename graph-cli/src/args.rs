use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Start an interactive session against a running backend
    Run(RunArgs),

    /// Check that the backend is reachable and report its bounds
    Health(HealthArgs),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum, Default)]
pub enum Strategy {
    #[default]
    Standard,
    TreeFirst,
}

#[derive(Parser, Debug, Clone)]
pub struct RunArgs {
    /// Base URL of the graph backend
    #[arg(long, env = "GRAPH_BACKEND_URL")]
    pub backend_url: String,

    /// Path to a TOML config file (defaults to the platform config dir)
    #[arg(long, env = "GRAPH_CONFIG")]
    pub config: Option<String>,

    /// Path to the persisted preferences file
    #[arg(long, env = "GRAPH_PREFERENCES")]
    pub preferences: Option<String>,

    /// Loading strategy to drive the viewport with
    #[arg(long, env = "GRAPH_STRATEGY", value_enum, default_value_t = Strategy::Standard)]
    pub strategy: Strategy,
}

#[derive(Parser, Debug, Clone)]
pub struct HealthArgs {
    /// Base URL of the graph backend
    #[arg(long, env = "GRAPH_BACKEND_URL")]
    pub backend_url: String,
}
