//! Access role hierarchy configuration (`db-config.json`, `sc-config.json`,
//! `wh-config.json`).

use std::collections::HashSet;
use std::fmt::Display;

use anyhow::{bail, Result};
use indexmap::IndexMap;
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::identifier::{is_unquoted, Identifier};
use crate::naming::ObjectType;

use super::error_vec_to_string;

lazy_static! {
    /// Privilege and object type keywords: words separated by single spaces.
    static ref KEYWORD: Regex = Regex::new(r"^[A-Za-z_]+( [A-Za-z_]+)*$").unwrap();
    static ref ROLE_PREFIX: Regex = Regex::new(r"^[A-Za-z_][A-Za-z0-9_$]*$").unwrap();
}

/// Creation parameters that get special rendering rather than `KEY = value`.
pub const TRANSIENT: &str = "TRANSIENT";
/// See [`TRANSIENT`].
pub const MANAGED_ACCESS: &str = "MANAGED_ACCESS";
/// See [`TRANSIENT`].
pub const TAG: &str = "TAG";

/// Which end of `ROLE_HIERARCHY` is least privileged.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HierarchyOrder {
    /// The first tier is the least privileged.
    #[default]
    Ascending,
    /// The first tier is the most privileged.
    Descending,
}

/// A creation parameter value.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    /// TRUE or FALSE
    Bool(bool),
    /// A bare number
    Int(i64),
    /// Anything else
    Str(String),
}

impl ParamValue {
    /// Read a value given on the command line. `True`/`False` become booleans
    /// and integers stay integers.
    pub fn from_cli(raw: &str) -> Self {
        match ParamValue::Str(raw.to_owned()).normalized() {
            ParamValue::Str(s) => match s.parse::<i64>() {
                Ok(i) => ParamValue::Int(i),
                Err(_) => ParamValue::Str(s),
            },
            other => other,
        }
    }

    /// Coerce the stringly-typed booleans older configs carry. Other strings
    /// stay quoted.
    pub fn normalized(self) -> Self {
        match self {
            ParamValue::Str(s) if s.eq_ignore_ascii_case("true") => ParamValue::Bool(true),
            ParamValue::Str(s) if s.eq_ignore_ascii_case("false") => ParamValue::Bool(false),
            other => other,
        }
    }
}

impl Display for ParamValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParamValue::Bool(true) => write!(f, "TRUE"),
            ParamValue::Bool(false) => write!(f, "FALSE"),
            ParamValue::Int(i) => write!(f, "{i}"),
            ParamValue::Str(s) => write!(f, "'{}'", s.replace('\'', "''")),
        }
    }
}

/// Ordered creation parameters.
pub type Params = IndexMap<String, ParamValue>;

/// A hierarchy config file, as written.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE", deny_unknown_fields)]
pub struct HierarchyConfig {
    /// Which object type this file describes.
    #[serde(rename = "TYPE")]
    pub object_type: ObjectType,
    /// Tier names.
    pub role_hierarchy: Vec<String>,
    /// Direction of `role_hierarchy`.
    #[serde(default)]
    pub role_hierarchy_order: HierarchyOrder,
    /// tier -> privilege -> object types the privilege is granted on.
    pub role_permissions: IndexMap<String, IndexMap<String, Vec<String>>>,
    /// The role that owns the object and every access role.
    pub role_owner: String,
    /// Prepended to every access role name.
    #[serde(default)]
    pub ar_prefix: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    default_db_params: Option<Params>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    default_sc_params: Option<Params>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    default_wh_params: Option<Params>,
}

/// One privilege a tier holds, on the listed object types.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Permission {
    /// e.g. `SELECT` or `CREATE SCHEMA`
    pub privilege: String,
    /// e.g. `TABLE` or `DATABASE`
    pub object_types: Vec<String>,
}

/// A validated hierarchy for one object type.
#[derive(Clone, Debug, PartialEq)]
pub struct Hierarchy {
    /// The object type.
    pub object_type: ObjectType,
    /// Tiers, least privileged first.
    pub tiers: Vec<Identifier>,
    /// Permissions per tier, in the order of `tiers`.
    pub permissions: Vec<Vec<Permission>>,
    /// The owner role.
    pub owner: Identifier,
    /// Access role prefix, upper-cased.
    pub prefix: String,
    /// Default creation parameters.
    pub defaults: Params,
}

impl Hierarchy {
    /// Permissions of a tier.
    pub fn permissions_for(&self, tier: &Identifier) -> Option<&[Permission]> {
        self.tiers
            .iter()
            .position(|t| t == tier)
            .map(|i| self.permissions[i].as_slice())
    }

    /// Whether `tier` is declared in this hierarchy.
    pub fn has_tier(&self, tier: &Identifier) -> bool {
        self.tiers.contains(tier)
    }
}

impl HierarchyConfig {
    fn params(&self) -> [(ObjectType, &Option<Params>); 3] {
        [
            (ObjectType::Database, &self.default_db_params),
            (ObjectType::Schema, &self.default_sc_params),
            (ObjectType::Warehouse, &self.default_wh_params),
        ]
    }

    /// Check everything and produce the typed hierarchy. All problems are
    /// reported together.
    pub fn validate(&self, expected: ObjectType) -> Result<Hierarchy> {
        let mut errors = vec![];

        if self.object_type != expected {
            errors.push(format!(
                "TYPE is {}, expected {}",
                self.object_type, expected
            ));
        }

        let mut tiers = vec![];
        let mut seen = HashSet::new();
        if self.role_hierarchy.is_empty() {
            errors.push("ROLE_HIERARCHY is empty".to_owned());
        }
        for tier in &self.role_hierarchy {
            if !is_unquoted(tier) {
                errors.push(format!(
                    "ROLE_HIERARCHY: {tier:?} must be an unquoted identifier"
                ));
                continue;
            }
            match Identifier::parse(tier) {
                Ok(id) if seen.insert(id.clone()) => tiers.push(id),
                Ok(_) => errors.push(format!("ROLE_HIERARCHY: {tier:?} is listed twice")),
                Err(e) => errors.push(format!("ROLE_HIERARCHY: {e}")),
            }
        }
        if self.role_hierarchy_order == HierarchyOrder::Descending {
            tiers.reverse();
        }

        let mut declared = HashSet::new();
        for tier in self.role_permissions.keys() {
            match Identifier::parse(tier) {
                Ok(id) if seen.contains(&id) => {
                    declared.insert(id);
                }
                _ => errors.push(format!(
                    "ROLE_PERMISSIONS: {tier:?} is not in ROLE_HIERARCHY"
                )),
            }
        }
        for tier in &tiers {
            if !declared.contains(tier) {
                errors.push(format!("ROLE_PERMISSIONS: missing tier {tier}"));
            }
        }

        let permissions = tiers
            .iter()
            .map(|tier| {
                self.role_permissions
                    .iter()
                    .find(|(name, _)| Identifier::parse(name).ok().as_ref() == Some(tier))
                    .map(|(_, privileges)| {
                        self.validate_permissions(tier, privileges, expected, &mut errors)
                    })
                    .unwrap_or_default()
            })
            .collect();

        let owner = match Identifier::parse(&self.role_owner) {
            Ok(owner) => Some(owner),
            Err(e) => {
                errors.push(format!("ROLE_OWNER: {e}"));
                None
            }
        };

        if !self.ar_prefix.is_empty() && !ROLE_PREFIX.is_match(&self.ar_prefix) {
            errors.push(format!(
                "AR_PREFIX: {:?} must be usable as the start of an unquoted identifier",
                self.ar_prefix
            ));
        }

        let mut defaults = Params::new();
        for (object_type, params) in self.params() {
            match params {
                Some(params) if object_type == expected => {
                    defaults = normalize_params(params.clone(), expected, &mut errors);
                }
                Some(_) => errors.push(format!(
                    "{} parameters don't belong in a {expected} config",
                    object_type
                )),
                None => (),
            }
        }

        match owner {
            Some(owner) if errors.is_empty() => Ok(Hierarchy {
                object_type: expected,
                tiers,
                permissions,
                owner,
                prefix: self.ar_prefix.to_uppercase(),
                defaults,
            }),
            _ => bail!(
                "invalid {expected} hierarchy configuration:\n{}",
                error_vec_to_string(&errors)
            ),
        }
    }

    fn validate_permissions(
        &self,
        tier: &Identifier,
        privileges: &IndexMap<String, Vec<String>>,
        object_type: ObjectType,
        errors: &mut Vec<String>,
    ) -> Vec<Permission> {
        let mut permissions = vec![];
        for (privilege, object_types) in privileges {
            if !KEYWORD.is_match(privilege) {
                errors.push(format!(
                    "ROLE_PERMISSIONS.{tier}: {privilege:?} is not a privilege"
                ));
                continue;
            }
            let mut valid_types = vec![];
            for granted_on in object_types {
                if !KEYWORD.is_match(granted_on) {
                    errors.push(format!(
                        "ROLE_PERMISSIONS.{tier}.{privilege}: {granted_on:?} is not an object type"
                    ));
                    continue;
                }
                let granted_on = granted_on.to_uppercase();
                if !grantable_on(object_type, &granted_on) {
                    errors.push(format!(
                        "ROLE_PERMISSIONS.{tier}.{privilege}: {granted_on} can't be granted from a {object_type}"
                    ));
                    continue;
                }
                valid_types.push(granted_on);
            }
            permissions.push(Permission {
                privilege: privilege.to_uppercase(),
                object_types: valid_types,
            });
        }
        permissions
    }
}

/// Whether privileges on `granted_on` can be handed out at the level of an
/// `object_type`.
fn grantable_on(object_type: ObjectType, granted_on: &str) -> bool {
    match object_type {
        ObjectType::Database => granted_on != "WAREHOUSE",
        ObjectType::Schema => granted_on != "WAREHOUSE" && granted_on != "DATABASE",
        ObjectType::Warehouse => granted_on == "WAREHOUSE",
    }
}

/// Upper-case and type-check creation parameters. Problems are pushed onto
/// `errors`.
pub fn normalize_params(
    params: Params,
    object_type: ObjectType,
    errors: &mut Vec<String>,
) -> Params {
    let mut normalized = Params::new();
    for (key, value) in params {
        if !is_unquoted(&key) {
            errors.push(format!("parameter {key:?} is not a valid name"));
            continue;
        }
        let key = key.to_uppercase();
        let value = value.normalized();
        match key.as_str() {
            TRANSIENT if object_type == ObjectType::Warehouse => {
                errors.push(format!("{TRANSIENT} doesn't apply to a {object_type}"));
                continue;
            }
            MANAGED_ACCESS if object_type != ObjectType::Schema => {
                errors.push(format!("{MANAGED_ACCESS} only applies to a SCHEMA"));
                continue;
            }
            TRANSIENT | MANAGED_ACCESS if !matches!(value, ParamValue::Bool(_)) => {
                errors.push(format!("{key} must be TRUE or FALSE, got {value}"));
                continue;
            }
            _ => (),
        }
        normalized.insert(key, value);
    }
    normalized
}
