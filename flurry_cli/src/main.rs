//! flurry CLI
//!

#![deny(missing_docs)]

use anyhow::Result;

#[tokio::main]
async fn main() -> Result<()> {
    flurry_lib::cli().await
}
