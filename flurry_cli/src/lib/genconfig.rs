//! Generate functional role config from live grants

use std::path::PathBuf;

use anyhow::{Context, Result};

use flurry_core::{
    genconfig::{generate_config, render, target_roles, OutputFormat},
    logging::info,
    CatalogSnapshot,
};

use crate::RunContext;

pub(super) async fn genconfig(
    ctx: &RunContext,
    roles: &[String],
    format: OutputFormat,
    output: Option<PathBuf>,
) -> Result<()> {
    let hierarchies = ctx.hierarchies()?;
    let snow = ctx.connect()?;
    let snapshot = CatalogSnapshot::fetch(&snow, &hierarchies).await?;
    let targets = target_roles(roles, &snapshot)?;

    let config = generate_config(&snow, &snapshot, &targets).await?;
    let text = render(&config, format)?;
    match output {
        Some(path) => {
            tokio::fs::write(&path, text)
                .await
                .with_context(|| format!("writing {}", path.display()))?;
            info!("wrote {}", path.display());
        }
        None => println!("{text}"),
    }
    Ok(())
}
