//! Functional role configuration (`fr-config.json`).
//!
//! ```json
//! {
//!   "ANALYST_FR": {
//!     "ORDER": "INCEXC",
//!     "INCLUDE": [{"TYPE": "DATABASE", "DATABASE": "SALES", "ROLE": "READ"}],
//!     "EXCLUDE": [{"TYPE": "SCHEMA", "DATABASE": "SALES", "SCHEMA": "PII%"}],
//!     "CUSTOM_INCLUDE": ["REPORTING_FR"],
//!     "CUSTOM_EXCLUDE": [],
//!     "SCIM_ROLES": []
//!   }
//! }
//! ```

use anyhow::{bail, Result};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::config::{error_vec_to_string, ProvisionConfig};
use crate::identifier::Identifier;
use crate::logging::warn;
use crate::naming::{classify_role, ObjectType, RoleKind};
use crate::rules::{GrantRule, NamePattern, RuleKind, RuleSet, ScopePattern};

/// Whether exclusions or custom inclusions get the last word.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum RuleOrder {
    /// Include, then exclude. Exclusions always win.
    #[default]
    #[serde(rename = "INCEXC")]
    IncludeExclude,
    /// Exclude, then add `CUSTOM_INCLUDE` back.
    #[serde(rename = "EXCINC")]
    ExcludeInclude,
}

/// One INCLUDE or EXCLUDE entry.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "TYPE", rename_all = "UPPERCASE", deny_unknown_fields)]
pub enum RuleEntry {
    /// Database access roles
    Database {
        /// Database name pattern
        #[serde(rename = "DATABASE")]
        database: String,
        /// Tier
        #[serde(rename = "ROLE", default, skip_serializing_if = "Option::is_none")]
        role: Option<String>,
    },
    /// Schema access roles
    Schema {
        /// Database name pattern
        #[serde(rename = "DATABASE")]
        database: String,
        /// Schema name pattern
        #[serde(rename = "SCHEMA")]
        schema: String,
        /// Tier
        #[serde(rename = "ROLE", default, skip_serializing_if = "Option::is_none")]
        role: Option<String>,
    },
    /// Warehouse access roles
    Warehouse {
        /// Warehouse name pattern
        #[serde(rename = "WAREHOUSE")]
        warehouse: String,
        /// Tier
        #[serde(rename = "ROLE", default, skip_serializing_if = "Option::is_none")]
        role: Option<String>,
    },
    /// Other functional roles
    Role {
        /// Role name pattern
        #[serde(rename = "ROLE")]
        role: String,
    },
}

/// The configuration of one functional role.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE", default, deny_unknown_fields)]
pub struct FunctionalRoleConfig {
    /// Evaluation order
    pub order: RuleOrder,
    /// Roles to grant
    pub include: Vec<RuleEntry>,
    /// Roles to keep out
    pub exclude: Vec<RuleEntry>,
    /// Literal role names to grant
    pub custom_include: Vec<String>,
    /// Literal role names to keep out
    pub custom_exclude: Vec<String>,
    /// Identity provider groups mapped to this role. Carried along, not acted on.
    pub scim_roles: Vec<String>,
}

/// The whole functional role config file, keyed by role name.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FunctionalConfig(pub IndexMap<String, FunctionalRoleConfig>);

impl FunctionalConfig {
    /// Validate every role against the hierarchies. All problems are reported
    /// together.
    pub fn validate(&self, hierarchies: &ProvisionConfig) -> Result<Vec<RuleSet>> {
        let mut errors = vec![];
        let rule_sets: Vec<RuleSet> = self
            .0
            .iter()
            .filter_map(|(name, config)| {
                let before = errors.len();
                let rule_set = config.validate(name, hierarchies, &mut errors);
                (errors.len() == before).then_some(rule_set).flatten()
            })
            .collect();

        if !errors.is_empty() {
            bail!(
                "invalid functional role configuration:\n{}",
                error_vec_to_string(&errors)
            );
        }
        Ok(rule_sets)
    }

    /// Validate the named roles only.
    pub fn select(&self, hierarchies: &ProvisionConfig, roles: &[String]) -> Result<Vec<RuleSet>> {
        if roles.is_empty() {
            return self.validate(hierarchies);
        }
        let mut selected = IndexMap::new();
        for role in roles {
            let wanted = Identifier::parse(role)?;
            let found = self
                .0
                .iter()
                .find(|(name, _)| Identifier::parse(name).ok().as_ref() == Some(&wanted));
            match found {
                Some((name, config)) => {
                    selected.insert(name.to_owned(), config.to_owned());
                }
                None => bail!("{wanted} isn't configured in the functional role config"),
            }
        }
        FunctionalConfig(selected).validate(hierarchies)
    }
}

impl FunctionalRoleConfig {
    fn validate(
        &self,
        name: &str,
        hierarchies: &ProvisionConfig,
        errors: &mut Vec<String>,
    ) -> Option<RuleSet> {
        let target = match Identifier::parse(name) {
            Ok(target) => target,
            Err(e) => {
                errors.push(format!("{e}"));
                return None;
            }
        };
        if classify_role(target.value()) != RoleKind::Functional {
            warn!("{target} doesn't follow the functional role naming convention (*_FR)");
        }

        let mut rules = vec![];
        for (kind, entries) in [
            (RuleKind::Include, &self.include),
            (RuleKind::Exclude, &self.exclude),
        ] {
            for entry in entries {
                match entry.to_rule(kind, hierarchies) {
                    Ok(rule) => rules.push(rule),
                    Err(e) => errors.push(format!("{target}: {e}")),
                }
            }
        }

        let custom_include = custom_roles(&target, "CUSTOM_INCLUDE", &self.custom_include, errors);
        let custom_exclude = custom_roles(&target, "CUSTOM_EXCLUDE", &self.custom_exclude, errors);
        for scim_role in &self.scim_roles {
            if scim_role.trim().is_empty() {
                errors.push(format!("{target}: SCIM_ROLES entries can't be empty"));
            }
        }

        Some(RuleSet {
            target,
            order: self.order,
            rules,
            custom_include,
            custom_exclude,
        })
    }
}

/// Parse literal role names. Names without an `_AR`/`_FR` suffix can't be
/// managed and are dropped with a warning.
fn custom_roles(
    target: &Identifier,
    field: &str,
    names: &[String],
    errors: &mut Vec<String>,
) -> Vec<Identifier> {
    names
        .iter()
        .filter_map(|name| match Identifier::parse(name) {
            Ok(role) if classify_role(role.value()) == RoleKind::Unrecognized => {
                warn!("{target}: ignoring {field} entry {role}, it is neither an access nor a functional role");
                None
            }
            Ok(role) => Some(role),
            Err(e) => {
                errors.push(format!("{target}: {field}: {e}"));
                None
            }
        })
        .collect()
}

impl RuleEntry {
    /// Typed rule for this entry. INCLUDE entries on objects must name a tier
    /// of that object's hierarchy; EXCLUDE entries without one match every
    /// tier.
    pub fn to_rule(&self, kind: RuleKind, hierarchies: &ProvisionConfig) -> Result<GrantRule> {
        let tier = |object_type: ObjectType, role: &Option<String>| -> Result<Option<Identifier>> {
            match (role, kind) {
                (None, RuleKind::Include) => {
                    bail!("{object_type} INCLUDE entries need a ROLE (tier)")
                }
                (None, RuleKind::Exclude) => Ok(None),
                (Some(role), _) => {
                    let tier = Identifier::parse(role)?;
                    if !hierarchies.hierarchy(object_type).has_tier(&tier) {
                        bail!("{tier} is not a tier of the {object_type} hierarchy");
                    }
                    Ok(Some(tier))
                }
            }
        };

        let (scope, tier) = match self {
            RuleEntry::Database { database, role } => (
                ScopePattern::Database(NamePattern::parse(database)?),
                tier(ObjectType::Database, role)?,
            ),
            RuleEntry::Schema {
                database,
                schema,
                role,
            } => (
                ScopePattern::Schema(NamePattern::parse(database)?, NamePattern::parse(schema)?),
                tier(ObjectType::Schema, role)?,
            ),
            RuleEntry::Warehouse { warehouse, role } => (
                ScopePattern::Warehouse(NamePattern::parse(warehouse)?),
                tier(ObjectType::Warehouse, role)?,
            ),
            RuleEntry::Role { role } => (ScopePattern::Role(NamePattern::parse(role)?), None),
        };
        Ok(GrantRule { kind, scope, tier })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::test_util::provision_config;

    fn parse(json: &str) -> FunctionalConfig {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn lists_default_to_empty() {
        let config = parse(r#"{"ANALYST_FR": {"INCLUDE": [{"TYPE": "ROLE", "ROLE": "BASE_FR"}]}}"#);
        let role = &config.0["ANALYST_FR"];
        assert_eq!(role.order, RuleOrder::IncludeExclude);
        assert!(role.exclude.is_empty());
        assert!(role.scim_roles.is_empty());
    }

    #[test]
    fn rule_entries_are_tagged_by_type() {
        let config = parse(
            r#"{"ANALYST_FR": {
                "ORDER": "EXCINC",
                "INCLUDE": [{"TYPE": "SCHEMA", "DATABASE": "SALES", "SCHEMA": "RAW", "ROLE": "READ"}],
                "EXCLUDE": [{"TYPE": "WAREHOUSE", "WAREHOUSE": "BIG%"}]
            }}"#,
        );
        let role = &config.0["ANALYST_FR"];
        assert_eq!(role.order, RuleOrder::ExcludeInclude);
        assert_eq!(
            role.include[0],
            RuleEntry::Schema {
                database: "SALES".to_owned(),
                schema: "RAW".to_owned(),
                role: Some("READ".to_owned())
            }
        );
        assert_eq!(
            role.exclude[0],
            RuleEntry::Warehouse {
                warehouse: "BIG%".to_owned(),
                role: None
            }
        );
    }

    #[test]
    fn misspelled_rule_keys_are_rejected() {
        let parsed = serde_json::from_str::<FunctionalConfig>(
            r#"{"A_FR": {"EXCLUDE": [{"TYPE": "DATABASE", "DATABASE": "SALES", "ROLES": "READ"}]}}"#,
        );
        assert!(parsed.is_err(), "{parsed:?}");
    }

    #[test]
    fn include_needs_a_declared_tier() {
        let config = parse(
            r#"{"ANALYST_FR": {"INCLUDE": [
                {"TYPE": "DATABASE", "DATABASE": "SALES"},
                {"TYPE": "DATABASE", "DATABASE": "SALES", "ROLE": "ADMIN"}
            ]}}"#,
        );
        let err = config.validate(&provision_config()).unwrap_err().to_string();
        assert!(err.contains("need a ROLE"), "{err}");
        assert!(err.contains("ADMIN is not a tier"), "{err}");
    }

    #[test]
    fn unrecognized_custom_roles_are_dropped() {
        let config = parse(
            r#"{"ANALYST_FR": {"CUSTOM_INCLUDE": ["LEGACY_ADMIN", "REPORTING_FR", "raw_ar"]}}"#,
        );
        let rule_sets = config.validate(&provision_config()).unwrap();
        let names: Vec<_> = rule_sets[0]
            .custom_include
            .iter()
            .map(|r| r.to_sql())
            .collect();
        assert_eq!(names, vec!["REPORTING_FR", "RAW_AR"]);
    }

    #[test]
    fn select_picks_named_roles() {
        let config = parse(r#"{"A_FR": {}, "B_FR": {}}"#);
        let rule_sets = config
            .select(&provision_config(), &["b_fr".to_owned()])
            .unwrap();
        assert_eq!(rule_sets.len(), 1);
        assert_eq!(rule_sets[0].target.to_sql(), "B_FR");
        assert!(config
            .select(&provision_config(), &["C_FR".to_owned()])
            .is_err());
    }
}
