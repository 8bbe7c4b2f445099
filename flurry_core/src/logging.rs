//! Logging for the flurry crates.
//!
//! Logs go to stderr so that generated config and planned SQL can be piped
//! from stdout.

// Re-exports for convenience
pub use tracing::metadata::LevelFilter;
pub use tracing::{debug, error, info, warn};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{util::SubscriberInitExt, EnvFilter};

/// The crates whose logs follow the requested level.
const FLURRY_CRATES: [&str; 3] = ["flurry_core", "flurry_snowflake", "flurry_lib"];

/// Set up basic logging
pub fn setup(level: Option<LevelFilter>) {
    // RUST_LOG wins unless a level was asked for explicitly.
    let directives = match (level, std::env::var("RUST_LOG")) {
        (None, Ok(env)) => env,
        (level, _) => filter_directives(level.unwrap_or(LevelFilter::INFO)),
    };

    tracing_subscriber::registry()
        .with(EnvFilter::new(directives))
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false),
        )
        .init();

    debug!("logging set up");
}

/// `level` for the flurry crates; everything else only warns.
fn filter_directives(level: LevelFilter) -> String {
    std::iter::once("warn".to_owned())
        .chain(
            FLURRY_CRATES
                .iter()
                .map(|krate| format!("{krate}={}", level.to_string().to_lowercase())),
        )
        .collect::<Vec<_>>()
        .join(",")
}
