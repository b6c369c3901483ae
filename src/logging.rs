//! Log output for the `orgi` binary.

use tracing_subscriber::EnvFilter;

/// Environment variable holding the log filter (e.g. `orgi=debug`).
pub const LOG_ENV: &str = "ORGI_LOG";

/// Default filter directive: `debug` when verbose, `warn` otherwise.
pub fn default_level(verbose: bool) -> &'static str {
    if verbose { "debug" } else { "warn" }
}

/// Install a stderr subscriber filtered by `ORGI_LOG`, falling back to [`default_level`].
///
/// Calling this more than once is harmless; later calls are ignored.
pub fn init(verbose: bool) {
    let level = default_level(verbose);
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env(LOG_ENV)
                .or_else(|_| EnvFilter::try_new(level))
                .unwrap_or_else(|_| EnvFilter::new(level)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
