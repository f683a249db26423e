use std::io::IsTerminal as _;

use tracing_subscriber::{EnvFilter, filter::LevelFilter};

/// Registers the process-wide tracing subscriber.
///
/// Defaults to `INFO` and honors `RUST_LOG` overrides. ANSI colors are only
/// enabled when stderr is a terminal.
pub fn register_logger() {
    let log_filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy();
    tracing_subscriber::fmt()
        .with_env_filter(log_filter)
        .with_ansi(std::io::stderr().is_terminal())
        .init();
}
