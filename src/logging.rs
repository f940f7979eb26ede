//! stderr logging for the CLI.
use tracing_subscriber::{fmt, EnvFilter};

/// Filter from `JSON_LOADER_LOG`, then `RUST_LOG`, else a level picked by `-v`.
pub fn init_logging(verbose: u8) {
    let fallback = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = std::env::var("JSON_LOADER_LOG")
        .or_else(|_| std::env::var("RUST_LOG"))
        .map(EnvFilter::new)
        .unwrap_or_else(|_| EnvFilter::new(fallback));

    // a subscriber may already be installed by an embedding program
    let _ = fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .try_init();
}
