//! The connection file (`connection.yaml`).

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use yaml_peg::serde as yaml;

use crate::logging::debug;
use crate::project;

/// Alias for HashMap to hold credentials information.
pub type CredentialsMap = HashMap<String, String>;

/// Read the connection settings from `path`, or from the default location
/// when no path is given.
pub fn fetch_credentials(path: Option<&Path>) -> Result<CredentialsMap> {
    let path = match path {
        Some(path) => path.to_owned(),
        None => project::connection_cfg_path()?,
    };
    debug!("Trying to read credentials from {:?}", path);
    let credentials_raw =
        fs::read_to_string(&path).with_context(|| format!("reading {}", path.display()))?;
    parse_credentials(&credentials_raw).with_context(|| format!("parsing {}", path.display()))
}

fn parse_credentials(raw: &str) -> Result<CredentialsMap> {
    let mut docs = yaml::from_str::<CredentialsMap>(raw)?;
    docs.pop()
        .ok_or_else(|| anyhow!["the connection file is empty"])
}
