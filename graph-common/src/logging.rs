use tracing_subscriber::EnvFilter;

/// Installs the process-wide `tracing` subscriber. Call once, from a binary's
/// `main`, never from library code.
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();
}
