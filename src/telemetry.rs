//! Logging setup for worker processes.

use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str = "mcmc_chains=info";

/// Install a global `fmt` subscriber filtered by `RUST_LOG`, falling back to
/// `mcmc_chains=info`.
///
/// Returns `false` if a subscriber was already installed.
pub fn init_tracing() -> bool {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init()
        .is_ok()
}
