//! Console logging setup.

use tracing::Level;
use tracing_subscriber::prelude::*;
use tracing_subscriber::util::TryInitError;
use tracing_subscriber::EnvFilter;

/// Map a level name to a tracing level, `info` when unrecognised.
pub fn parse_level(level: &str) -> Level {
    match level.trim().to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" | "warning" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    }
}

/// Install a stderr subscriber at `level`. `RUST_LOG` directives are merged in.
///
/// Output goes to stderr so command results on stdout stay clean. Fails if a
/// global subscriber is already set.
pub fn init(level: &str) -> Result<(), TryInitError> {
    let filter = EnvFilter::from_default_env().add_directive(parse_level(level).into());

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_line_number(false),
        )
        .with(filter)
        .try_init()
}
