//! Full CLI library for flurry
//!

#![deny(missing_docs)]

mod cmd;
mod funcrole;
mod genconfig;
mod provision;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use human_panic::setup_panic;

use flurry_core::{
    config::{load_functional_config, ProvisionConfig},
    fetch_credentials,
    logging::{self, debug, info},
    naming::ObjectType,
    project,
    write::{apply, Statement},
};
use flurry_snowflake::SnowflakeConnector;

use crate::cmd::{FlurryArgs, FlurryCommand};

/// Main CLI entrypoint.
pub async fn cli() -> Result<()> {
    setup_panic!(Metadata {
        name: env!("CARGO_PKG_NAME").into(),
        version: env!("CARGO_PKG_VERSION").into(),
        authors: env!("CARGO_PKG_AUTHORS").into(),
        homepage: env!("CARGO_PKG_HOMEPAGE").into(),
    });
    let args = FlurryArgs::parse();
    logging::setup(args.log_level);

    let ctx = RunContext::new(&args);
    match args.command {
        FlurryCommand::Validate => validate(&ctx)?,
        FlurryCommand::Create {
            object_type,
            name,
            params,
            apply,
        } => provision::create(&ctx, object_type.into(), &name, params, apply).await?,
        FlurryCommand::Drop {
            object_type,
            name,
            apply,
        } => provision::teardown(&ctx, object_type.into(), &name, apply).await?,
        FlurryCommand::Funcrole { roles, apply } => funcrole::funcrole(&ctx, &roles, apply).await?,
        FlurryCommand::Genconfig {
            roles,
            format,
            output,
        } => genconfig::genconfig(&ctx, &roles, format.into(), output).await?,
    }

    Ok(())
}

/// Where configuration comes from for this run.
pub(crate) struct RunContext {
    search_path: Vec<PathBuf>,
    connection: Option<PathBuf>,
}

impl RunContext {
    fn new(args: &FlurryArgs) -> Self {
        let search_path = project::config_search_path(args.config_dir.as_deref());
        debug!("config search path: {:?}", search_path);
        Self {
            search_path,
            connection: args.connection.to_owned(),
        }
    }

    pub(crate) fn hierarchies(&self) -> Result<ProvisionConfig> {
        ProvisionConfig::load(&self.search_path)
    }

    pub(crate) fn connect(&self) -> Result<SnowflakeConnector> {
        let creds = fetch_credentials(self.connection.as_deref())?;
        SnowflakeConnector::new(&creds)
            .context("setting up the Snowflake connection")
    }
}

fn validate(ctx: &RunContext) -> Result<()> {
    let hierarchies = ctx.hierarchies()?;
    let rule_sets = load_functional_config(&ctx.search_path)?.validate(&hierarchies)?;
    for object_type in [ObjectType::Database, ObjectType::Schema, ObjectType::Warehouse] {
        let hierarchy = hierarchies.hierarchy(object_type);
        println!(
            "{} {}: {}",
            "✓".green(),
            object_type,
            hierarchy
                .tiers
                .iter()
                .map(|t| t.to_string())
                .collect::<Vec<_>>()
                .join(" -> ")
        );
    }
    println!("{} {} functional roles", "✓".green(), rule_sets.len());
    Ok(())
}

/// Print the statements, or run them when `execute` is set.
pub(crate) async fn print_or_apply(
    ctx: &RunContext,
    title: &str,
    statements: &[Statement],
    execute: bool,
) -> Result<()> {
    println!("\n{title}\n──────────────────");
    if statements.is_empty() {
        println!("No changes needed");
        return Ok(());
    }
    for statement in statements {
        println!("{}", textwrap::indent(&statement.to_string(), "  "));
    }
    if execute {
        let snow = ctx.connect()?;
        let count = apply(&snow, statements).await?;
        info!("{title}: {count} statements applied");
    } else {
        println!(
            "\n{}",
            "Dry run: nothing was executed. Re-run with --apply to make these changes.".yellow()
        );
    }
    Ok(())
}
