//! Reconcile functional roles

use anyhow::Result;

use flurry_core::{
    config::load_functional_config,
    logging::info,
    reconcile::plan_role,
    write::Statement,
    CatalogSnapshot,
};

use crate::{print_or_apply, RunContext};

pub(super) async fn funcrole(ctx: &RunContext, roles: &[String], execute: bool) -> Result<()> {
    let hierarchies = ctx.hierarchies()?;
    let rule_sets = load_functional_config(&ctx.search_path)?.select(&hierarchies, roles)?;
    if rule_sets.is_empty() {
        println!("No functional roles configured");
        return Ok(());
    }

    let snow = ctx.connect()?;
    let snapshot = CatalogSnapshot::fetch(&snow, &hierarchies).await?;
    info!(
        "catalog has {} roles, {} bound access roles",
        snapshot.roles.len(),
        snapshot.access_roles.len()
    );

    println!("\nFUNCTIONAL ROLES\n──────────────────");
    let mut statements: Vec<Statement> = vec![];
    for rule_set in &rule_sets {
        let delta = plan_role(&snow, &snapshot, rule_set).await?;
        delta.warn_unmanaged();
        print!("{delta}");
        statements.extend(delta.statements());
    }

    print_or_apply(ctx, "STATEMENTS", &statements, execute).await
}
