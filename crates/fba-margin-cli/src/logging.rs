//! Tracing subscriber setup.

use tracing_subscriber::EnvFilter;

/// Install the global subscriber. `RUST_LOG` wins over `level`; output goes
/// to stderr so stdout stays clean for `--json` results.
pub fn init(level: &str, json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);

    // A subscriber may already be installed (tests).
    let _ = if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
}

/// Effective level for `--quiet` / `--log-level`.
pub fn level_for(log_level: &str, quiet: bool) -> &str {
    if quiet {
        "warn"
    } else {
        log_level
    }
}
