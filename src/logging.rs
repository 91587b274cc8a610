//! Logging initialization for the binary.
//!
//! Logs go to stderr so stdout only carries results. `RUST_LOG` overrides
//! the verbosity-derived default.

use tracing::Level;
use tracing_subscriber::EnvFilter;

/// `verbosity`: 0 = errors only, 1 = warnings, 2 = info, 3 = debug, 4+ = trace.
pub fn init(verbosity: u8) {
    let level = match verbosity {
        0 => Level::ERROR,
        1 => Level::WARN,
        2 => Level::INFO,
        3 => Level::DEBUG,
        _ => Level::TRACE,
    };

    let filter = EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy();

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}
