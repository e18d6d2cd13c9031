//! Diagnostic logging to stderr.

use tracing_subscriber::EnvFilter;

/// Env var holding a `tracing` filter directive, e.g. `neuroscout_client=debug`.
pub const LOG_ENV: &str = "NEUROSCOUT_LOG";

/// Filter for `-v` repetitions when no explicit one is given.
fn level_for(verbose: u8) -> &'static str {
    match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    }
}

/// Install the global subscriber, once, from `main`. `-v` flags take
/// precedence over `NEUROSCOUT_LOG`; without either only warnings are shown.
pub fn init(verbose: u8) {
    let filter = if verbose > 0 {
        EnvFilter::new(level_for(verbose))
    } else {
        EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(level_for(0)))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
