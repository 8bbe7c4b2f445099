//! Generate functional role configuration from live grants.
//!
//! This is the reconciler run backwards: every role granted to a functional
//! role is turned into the narrowest rule that selects it again.

use anyhow::{bail, Context, Result};
use indexmap::IndexMap;

use crate::catalog::{Catalog, CatalogSnapshot, ObservedGrant};
use crate::config::{FunctionalConfig, FunctionalRoleConfig, RuleEntry};
use crate::identifier::Identifier;
use crate::logging::{info, warn};
use crate::naming::Scope;
use crate::reconcile::ObservedState;
use crate::rules::NamePattern;

/// Selects every functional role in the catalog.
pub const ALL_ROLES: &str = "ALL";

/// How to write the generated config.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// The format the config files are read in
    #[default]
    Json,
    /// YAML
    Yaml,
}

/// The config for one role, and the grants it couldn't express.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GeneratedRole {
    /// The functional role
    pub role: Identifier,
    /// Its rules
    pub config: FunctionalRoleConfig,
    /// Privileges granted directly, which rules can't describe
    pub unexpressed: Vec<ObservedGrant>,
}

/// Turn observed grants into rules.
///
/// Access roles that resolve to exactly one (scope, tier) binding become
/// INCLUDE entries and existing functional roles become ROLE entries.
/// Anything else is listed literally under `CUSTOM_INCLUDE`.
pub fn generate(
    role: &Identifier,
    observed: &ObservedState,
    snapshot: &CatalogSnapshot,
) -> GeneratedRole {
    let mut include = vec![];
    let mut custom_include = vec![];

    for granted in observed.roles.access.iter() {
        match snapshot.resolve(granted).as_slice() {
            [entry] => include.push(include_entry(&entry.scope, &entry.tier)),
            _ => custom_include.push(granted.to_sql()),
        }
    }
    for granted in observed.roles.functional.iter() {
        if snapshot.functional_roles.contains(granted) {
            include.push(RuleEntry::Role {
                role: NamePattern::literal(granted),
            });
        } else {
            custom_include.push(granted.to_sql());
        }
    }
    custom_include.extend(observed.unrecognized_roles.iter().map(|r| r.to_sql()));

    include.sort();
    include.dedup();
    custom_include.sort();
    custom_include.dedup();

    GeneratedRole {
        role: role.clone(),
        config: FunctionalRoleConfig {
            include,
            custom_include,
            ..Default::default()
        },
        unexpressed: observed.privileges.clone(),
    }
}

fn include_entry(scope: &Scope, tier: &Identifier) -> RuleEntry {
    let tier = Some(tier.value().to_owned());
    match scope {
        Scope::Database(database) => RuleEntry::Database {
            database: NamePattern::literal(database),
            role: tier,
        },
        Scope::Schema(reference) => RuleEntry::Schema {
            database: NamePattern::literal(&reference.database),
            schema: NamePattern::literal(&reference.schema),
            role: tier,
        },
        Scope::Warehouse(warehouse) => RuleEntry::Warehouse {
            warehouse: NamePattern::literal(warehouse),
            role: tier,
        },
    }
}

/// Resolve the roles asked for on the command line. `ALL` means every
/// functional role in the catalog.
pub fn target_roles(requested: &[String], snapshot: &CatalogSnapshot) -> Result<Vec<Identifier>> {
    if requested.is_empty() {
        bail!("no roles given; name one or more functional roles or {ALL_ROLES}");
    }
    if requested.iter().any(|r| r == ALL_ROLES) {
        return Ok(snapshot.functional_roles.iter().cloned().collect());
    }
    requested
        .iter()
        .map(|r| Identifier::parse(r).with_context(|| format!("invalid role name {r:?}")))
        .collect()
}

/// Generate the config for each role in `roles`.
pub async fn generate_config(
    catalog: &dyn Catalog,
    snapshot: &CatalogSnapshot,
    roles: &[Identifier],
) -> Result<FunctionalConfig> {
    let mut config = IndexMap::new();
    for role in roles {
        let grants = catalog
            .grants_to_role(role)
            .await
            .with_context(|| format!("reading grants of {role}"))?;
        if grants.is_none() {
            warn!("{role} doesn't exist; skipping");
            continue;
        }
        let generated = generate(role, &ObservedState::from_grants(grants), snapshot);
        for grant in &generated.unexpressed {
            warn!(
                "{role} holds {} on {} {} directly; this can't be expressed as a rule",
                grant.privilege, grant.granted_on, grant.name
            );
        }
        config.insert(role.to_sql(), generated.config);
    }
    info!("generated configuration for {} roles", config.len());
    Ok(FunctionalConfig(config))
}

/// Serialize a functional role config.
pub fn render(config: &FunctionalConfig, format: OutputFormat) -> Result<String> {
    Ok(match format {
        OutputFormat::Json => serde_json::to_string_pretty(config)?,
        OutputFormat::Yaml => yaml_peg::serde::to_string(config)?,
    })
}
