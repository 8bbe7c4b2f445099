//! Configuration files.
//!
//! Each file is read from every directory on the search path (see
//! [`crate::project`]) and merged key by key, so a copy in the working
//! directory can override a handful of keys of the profile copy.

pub mod functional;
pub mod hierarchy;

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::logging::debug;
use crate::naming::ObjectType;
use crate::project;

pub use functional::{FunctionalConfig, FunctionalRoleConfig, RuleEntry, RuleOrder};
pub use hierarchy::{Hierarchy, HierarchyConfig, HierarchyOrder, ParamValue, Params, Permission};

/// Render a list of errors one per line.
pub(crate) fn error_vec_to_string(errors: &[String]) -> String {
    errors
        .iter()
        .map(|e| format!(" - {e}"))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Read `filename` from each directory of `search_path` and merge the
/// top-level keys, later directories winning.
pub fn read_merged(search_path: &[PathBuf], filename: &Path) -> Result<Value> {
    let mut merged: Option<Map<String, Value>> = None;
    for dir in search_path {
        let path = dir.join(filename);
        if !path.is_file() {
            continue;
        }
        debug!("reading configuration from {:?}", path);
        let raw = fs::read_to_string(&path).with_context(|| format!("reading {path:?}"))?;
        let value: Value =
            serde_json::from_str(&raw).with_context(|| format!("parsing {path:?}"))?;
        let Value::Object(map) = value else {
            bail!("{path:?} must contain a JSON object");
        };
        merged.get_or_insert_with(Map::new).extend(map);
    }

    match merged {
        Some(map) => Ok(Value::Object(map)),
        None => bail!(
            "couldn't find {:?} in any of {:?}",
            filename,
            search_path
        ),
    }
}

fn read_typed<T: DeserializeOwned>(search_path: &[PathBuf], filename: &Path) -> Result<T> {
    let value = read_merged(search_path, filename)?;
    serde_json::from_value(value).with_context(|| format!("invalid {filename:?}"))
}

/// The three validated hierarchies provisioning works from.
#[derive(Clone, Debug, PartialEq)]
pub struct ProvisionConfig {
    /// Database hierarchy
    pub database: Hierarchy,
    /// Schema hierarchy
    pub schema: Hierarchy,
    /// Warehouse hierarchy
    pub warehouse: Hierarchy,
}

impl ProvisionConfig {
    /// Validate the three hierarchy configs against each other.
    ///
    /// Schema access roles are granted to the database access role of the
    /// same tier, so the two hierarchies must be identical.
    pub fn new(
        database: &HierarchyConfig,
        schema: &HierarchyConfig,
        warehouse: &HierarchyConfig,
    ) -> Result<Self> {
        let database = database.validate(ObjectType::Database)?;
        let schema = schema.validate(ObjectType::Schema)?;
        let warehouse = warehouse.validate(ObjectType::Warehouse)?;

        if database.tiers != schema.tiers {
            bail!(
                "DATABASE and SCHEMA hierarchies must match (least privileged first):\n - DATABASE: {}\n - SCHEMA: {}",
                tier_list(&database),
                tier_list(&schema)
            );
        }
        Ok(Self {
            database,
            schema,
            warehouse,
        })
    }

    /// Load and validate the hierarchy configs from the search path.
    pub fn load(search_path: &[PathBuf]) -> Result<Self> {
        let read = |object_type| -> Result<HierarchyConfig> {
            read_typed(search_path, &project::hierarchy_cfg_filename(object_type))
        };
        Self::new(
            &read(ObjectType::Database)?,
            &read(ObjectType::Schema)?,
            &read(ObjectType::Warehouse)?,
        )
    }

    /// The hierarchy for an object type.
    pub fn hierarchy(&self, object_type: ObjectType) -> &Hierarchy {
        match object_type {
            ObjectType::Database => &self.database,
            ObjectType::Schema => &self.schema,
            ObjectType::Warehouse => &self.warehouse,
        }
    }
}

fn tier_list(hierarchy: &Hierarchy) -> String {
    hierarchy
        .tiers
        .iter()
        .map(|t| t.to_string())
        .collect::<Vec<_>>()
        .join(" -> ")
}

/// Load the functional role config from the search path.
pub fn load_functional_config(search_path: &[PathBuf]) -> Result<FunctionalConfig> {
    read_typed(search_path, &project::functional_cfg_filename())
}
