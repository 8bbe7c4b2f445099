//! Role naming convention shared by the provisioner and the reconciler.
//!
//! Access roles are named `<prefix><scope>_<tier>_AR`, where the scope of a
//! schema is `<database>_<schema>`. Functional roles end in `_FR`.

use std::fmt::Display;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::identifier::{split_composite, CompositeReference, Identifier, NameError};

/// Suffix of generated access roles.
pub const ACCESS_ROLE_SUFFIX: &str = "_AR";
/// Suffix of functional roles.
pub const FUNCTIONAL_ROLE_SUFFIX: &str = "_FR";

/// The kinds of objects an access role hierarchy can be provisioned for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ObjectType {
    /// A database
    Database,
    /// A schema inside a database
    Schema,
    /// A virtual warehouse
    Warehouse,
}

impl ObjectType {
    /// The SQL keyword for this object type.
    pub fn keyword(&self) -> &'static str {
        match self {
            ObjectType::Database => "DATABASE",
            ObjectType::Schema => "SCHEMA",
            ObjectType::Warehouse => "WAREHOUSE",
        }
    }
}

impl Display for ObjectType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.keyword())
    }
}

/// The object an access role is bound to.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Scope {
    /// A database
    Database(Identifier),
    /// A schema, qualified by its database
    Schema(CompositeReference),
    /// A warehouse
    Warehouse(Identifier),
}

impl Scope {
    /// Parse an object name given on the command line. Schemas must be
    /// qualified as `database.schema`.
    pub fn parse(object_type: ObjectType, name: &str) -> Result<Self> {
        Ok(match object_type {
            ObjectType::Database => {
                Scope::Database(Identifier::parse(name).context("invalid database name")?)
            }
            ObjectType::Schema => {
                Scope::Schema(split_composite(name).context("invalid schema reference")?)
            }
            ObjectType::Warehouse => {
                Scope::Warehouse(Identifier::parse(name).context("invalid warehouse name")?)
            }
        })
    }

    /// The type of the scoped object.
    pub fn object_type(&self) -> ObjectType {
        match self {
            Scope::Database(_) => ObjectType::Database,
            Scope::Schema(_) => ObjectType::Schema,
            Scope::Warehouse(_) => ObjectType::Warehouse,
        }
    }

    /// The object name as written in SQL.
    pub fn sql_name(&self) -> String {
        match self {
            Scope::Database(name) | Scope::Warehouse(name) => name.to_sql(),
            Scope::Schema(reference) => reference.to_string(),
        }
    }

    fn parts(&self) -> Vec<&Identifier> {
        match self {
            Scope::Database(name) | Scope::Warehouse(name) => vec![name],
            Scope::Schema(reference) => vec![&reference.database, &reference.schema],
        }
    }
}

impl Display for Scope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.object_type(), self.sql_name())
    }
}

/// The access role for `scope` at `tier`.
///
/// When any part of the scope is quoted the whole role name is quoted, built
/// from the resolved part names. Fails if the result would be too long.
pub fn access_role_name(
    prefix: &str,
    scope: &Scope,
    tier: &Identifier,
) -> Result<Identifier, NameError> {
    let parts = scope.parts();
    let scope_name = parts
        .iter()
        .map(|p| p.value())
        .collect::<Vec<_>>()
        .join("_");
    let value = format!(
        "{prefix}{scope_name}_{}{ACCESS_ROLE_SUFFIX}",
        tier.value()
    );

    if parts.iter().any(|p| p.is_quoted()) {
        Identifier::parse(&format!("\"{}\"", value.replace('"', "\"\"")))
    } else {
        Identifier::parse(&value)
    }
}

/// What a role's name says it is.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RoleKind {
    /// Ends in `_AR`
    Access,
    /// Ends in `_FR`
    Functional,
    /// Anything else
    Unrecognized,
}

/// Classify a resolved role name by suffix.
pub fn classify_role(name: &str) -> RoleKind {
    if name.ends_with(ACCESS_ROLE_SUFFIX) {
        RoleKind::Access
    } else if name.ends_with(FUNCTIONAL_ROLE_SUFFIX) {
        RoleKind::Functional
    } else {
        RoleKind::Unrecognized
    }
}
