//! Commands for the flurry CLI
//!

use std::path::PathBuf;

use clap::{self, Parser, Subcommand, ValueEnum};

use flurry_core::genconfig::OutputFormat;
use flurry_core::logging::LevelFilter;
use flurry_core::naming::ObjectType;

/// flurry: access role hierarchies and functional roles for Snowflake
#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None, arg_required_else_help = true)]
pub(crate) struct FlurryArgs {
    #[clap(subcommand)]
    pub(crate) command: FlurryCommand,
    #[clap(global = true, short = 'v', long)]
    pub(crate) log_level: Option<LevelFilter>,
    /// Read config files from this directory only
    #[clap(global = true, long)]
    pub(crate) config_dir: Option<PathBuf>,
    /// Path to the connection file (defaults to ~/.snowflake/connection.yaml)
    #[clap(global = true, long)]
    pub(crate) connection: Option<PathBuf>,
}

#[derive(Subcommand, Debug, Clone)]
pub(crate) enum FlurryCommand {
    /// Load and validate every config file
    Validate,
    /// Create an object with its access role hierarchy
    Create {
        /// The type of object
        #[arg(value_enum)]
        object_type: ObjectTypeArg,
        /// Object name; schemas are written as DATABASE.SCHEMA
        name: String,
        /// Object parameter as KEY=VALUE, overriding the configured defaults
        #[clap(short, long = "param", value_parser = parse_param)]
        params: Vec<(String, String)>,
        /// Run the statements instead of printing them
        #[clap(long, value_parser, default_value = "false")]
        apply: bool,
    },
    /// Drop an object and its access role hierarchy
    Drop {
        /// The type of object
        #[arg(value_enum)]
        object_type: ObjectTypeArg,
        /// Object name; schemas are written as DATABASE.SCHEMA
        name: String,
        /// Run the statements instead of printing them
        #[clap(long, value_parser, default_value = "false")]
        apply: bool,
    },
    /// Reconcile functional roles with their configured rules
    Funcrole {
        /// Roles to reconcile (default: every configured role)
        roles: Vec<String>,
        /// Run the statements instead of printing them
        #[clap(long, value_parser, default_value = "false")]
        apply: bool,
    },
    /// Generate functional role config from the current grants
    Genconfig {
        /// Roles to describe, or ALL for every functional role
        #[clap(required = true)]
        roles: Vec<String>,
        /// Output format
        #[clap(short, long, value_enum, default_value = "json")]
        format: FormatArg,
        /// Write to a file instead of stdout
        #[clap(short, long)]
        output: Option<PathBuf>,
    },
}

/// Object types on the command line
#[derive(Copy, Clone, PartialEq, Eq, Debug, ValueEnum)]
pub(crate) enum ObjectTypeArg {
    /// A database
    Database,
    /// A schema, as DATABASE.SCHEMA
    Schema,
    /// A warehouse
    Warehouse,
}

impl From<ObjectTypeArg> for ObjectType {
    fn from(arg: ObjectTypeArg) -> Self {
        match arg {
            ObjectTypeArg::Database => ObjectType::Database,
            ObjectTypeArg::Schema => ObjectType::Schema,
            ObjectTypeArg::Warehouse => ObjectType::Warehouse,
        }
    }
}

/// Output formats on the command line
#[derive(Copy, Clone, PartialEq, Eq, Debug, ValueEnum)]
pub(crate) enum FormatArg {
    /// JSON, as the config files are read
    Json,
    /// YAML
    Yaml,
}

impl From<FormatArg> for OutputFormat {
    fn from(arg: FormatArg) -> Self {
        match arg {
            FormatArg::Json => OutputFormat::Json,
            FormatArg::Yaml => OutputFormat::Yaml,
        }
    }
}

fn parse_param(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_owned(), value.trim().to_owned()))
        }
        _ => Err(format!("expected KEY=VALUE, got {raw:?}")),
    }
}
