//! Path utilities for locating configuration.
//!
//! Configuration is looked up in two places, later ones winning:
//!
//! ```text
//! ~/.snowflake
//!  ├── connection.yaml
//!  ├── db-config.json
//!  ├── sc-config.json
//!  ├── wh-config.json
//!  └── fr-config.json
//! ./
//!  └── (any of the config files above)
//! ```

use std::path::{Path, PathBuf};

use anyhow::{anyhow, Result};
use dirs::home_dir;
use lazy_static::lazy_static;

use crate::naming::ObjectType;

lazy_static! {
    static ref PROFILE_CFG_DIR: PathBuf = PathBuf::from(".snowflake");
    static ref CONNECTION_CFG: PathBuf = PathBuf::from("connection.yaml");
    static ref DB_CFG: PathBuf = PathBuf::from("db-config.json");
    static ref SC_CFG: PathBuf = PathBuf::from("sc-config.json");
    static ref WH_CFG: PathBuf = PathBuf::from("wh-config.json");
    static ref FR_CFG: PathBuf = PathBuf::from("fr-config.json");
}

/// Filename of the hierarchy config for an object type.
pub fn hierarchy_cfg_filename(object_type: ObjectType) -> PathBuf {
    match object_type {
        ObjectType::Database => DB_CFG.clone(),
        ObjectType::Schema => SC_CFG.clone(),
        ObjectType::Warehouse => WH_CFG.clone(),
    }
}

/// Filename of the functional role config.
pub fn functional_cfg_filename() -> PathBuf {
    FR_CFG.clone()
}

/// The per-user config directory, if there is a home directory.
pub fn profile_dir() -> Option<PathBuf> {
    home_dir().map(|home| home.join(PROFILE_CFG_DIR.as_path()))
}

/// Directories to read config files from, lowest precedence first.
///
/// An explicit directory replaces the default search path.
pub fn config_search_path(config_dir: Option<&Path>) -> Vec<PathBuf> {
    match config_dir {
        Some(dir) => vec![dir.to_owned()],
        None => profile_dir()
            .into_iter()
            .chain([PathBuf::from(".")])
            .collect(),
    }
}

/// Path to the connection file.
pub fn connection_cfg_path() -> Result<PathBuf> {
    profile_dir()
        .map(|dir| dir.join(CONNECTION_CFG.as_path()))
        .ok_or_else(|| anyhow!("couldn't find a home directory for {:?}", *CONNECTION_CFG))
}
