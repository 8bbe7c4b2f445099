//! Access role hierarchy provisioning.
//!
//! For one object and its hierarchy this produces, in order:
//!
//! 1. the object itself and one access role per tier, least privileged first
//! 2. ownership of the object and every access role for the owner role
//! 3. the role chain: each tier is granted to the next more privileged tier
//!    and the top tier to the owner. Schema access roles are also granted to
//!    the database access role of the same tier.
//! 4. the object privileges of every tier
//!
//! Teardown is the same plan negated and replayed backwards, minus the
//! ownership phase.

use anyhow::{bail, Context, Result};

use crate::config::hierarchy::{normalize_params, MANAGED_ACCESS, TAG, TRANSIENT};
use crate::config::{error_vec_to_string, Hierarchy, ParamValue, Params, ProvisionConfig};
use crate::identifier::Identifier;
use crate::logging::debug;
use crate::naming::{access_role_name, ObjectType, Scope};
use crate::write::{GrantTarget, PrioritizedStatements, Statement};

/// Warehouse properties that take an object name rather than a literal.
const BARE_PROPERTIES: [&str; 2] = ["RESOURCE_MONITOR", "SCALING_POLICY"];

/// Build the statements that create `scope` and its access role hierarchy.
///
/// `overrides` take precedence over the hierarchy's default parameters.
pub fn provision(
    hierarchies: &ProvisionConfig,
    scope: &Scope,
    overrides: Params,
) -> Result<PrioritizedStatements> {
    let object_type = scope.object_type();
    let hierarchy = hierarchies.hierarchy(object_type);

    let mut errors = vec![];
    let overrides = normalize_params(overrides, object_type, &mut errors);
    if !errors.is_empty() {
        bail!("invalid parameters:\n{}", error_vec_to_string(&errors));
    }
    let mut params = hierarchy.defaults.clone();
    params.extend(overrides);

    let roles = tier_roles(hierarchy, scope)?;
    let mut plan = PrioritizedStatements::default();

    // 1. objects and roles
    plan.objects.insert(create_object(scope, &params));
    for (_, role) in &roles {
        plan.objects.insert(Statement::CreateRole(role.clone()));
    }

    // 2. ownership
    let object_name = scope.sql_name();
    plan.owner_grants.insert(Statement::GrantOwnership {
        object_type: object_type.keyword().to_owned(),
        name: object_name.clone(),
        owner: hierarchy.owner.clone(),
    });
    plan.owner_grants.insert(Statement::GrantPrivilege {
        privilege: "ALL PRIVILEGES".to_owned(),
        target: GrantTarget::Object {
            object_type: object_type.keyword().to_owned(),
            name: object_name.clone(),
        },
        role: hierarchy.owner.clone(),
    });
    for (_, role) in &roles {
        plan.owner_grants.insert(Statement::GrantOwnership {
            object_type: "ROLE".to_owned(),
            name: role.to_sql(),
            owner: hierarchy.owner.clone(),
        });
    }

    // 3. role chain
    for pair in roles.windows(2) {
        plan.role_grants.insert(Statement::GrantRole {
            role: pair[0].1.clone(),
            to: pair[1].1.clone(),
        });
    }
    if let Some((_, top)) = roles.last() {
        plan.role_grants.insert(Statement::GrantRole {
            role: top.clone(),
            to: hierarchy.owner.clone(),
        });
    }
    if let Scope::Schema(reference) = scope {
        let database = Scope::Database(reference.database.clone());
        let database_roles = tier_roles(&hierarchies.database, &database)?;
        for ((_, schema_role), (_, database_role)) in roles.iter().zip(&database_roles) {
            plan.role_grants.insert(Statement::GrantRole {
                role: schema_role.clone(),
                to: database_role.clone(),
            });
        }
    }

    // 4. object privileges
    if let (Scope::Schema(reference), Some((_, least))) = (scope, roles.first()) {
        // Usage on the way down is enough once: every other tier inherits it.
        for (object_type, name) in [
            ("DATABASE", reference.database.to_sql()),
            ("SCHEMA", reference.to_string()),
        ] {
            plan.object_grants.insert(Statement::GrantPrivilege {
                privilege: "USAGE".to_owned(),
                target: GrantTarget::Object {
                    object_type: object_type.to_owned(),
                    name,
                },
                role: least.clone(),
            });
        }
    }
    for (tier, role) in &roles {
        for permission in hierarchy.permissions_for(tier).unwrap_or_default() {
            for granted_on in &permission.object_types {
                for target in grant_targets(object_type, &object_name, granted_on) {
                    plan.object_grants.insert(Statement::GrantPrivilege {
                        privilege: permission.privilege.clone(),
                        target,
                        role: role.clone(),
                    });
                }
            }
        }
    }

    debug!(
        "planned {} statements for {}",
        plan.flatten().len(),
        scope
    );
    Ok(plan)
}

/// Build the statements that remove `scope` and its access roles: object
/// grants are revoked, then role grants, then roles and the object are
/// dropped.
pub fn deprovision(hierarchies: &ProvisionConfig, scope: &Scope) -> Result<Vec<Statement>> {
    Ok(provision(hierarchies, scope, Params::new())?.teardown())
}

/// (tier, access role) pairs, least privileged first.
fn tier_roles(hierarchy: &Hierarchy, scope: &Scope) -> Result<Vec<(Identifier, Identifier)>> {
    hierarchy
        .tiers
        .iter()
        .map(|tier| {
            access_role_name(&hierarchy.prefix, scope, tier)
                .map(|role| (tier.clone(), role))
                .with_context(|| format!("no valid access role name for {scope} at tier {tier}"))
        })
        .collect()
}

fn grant_targets(object_type: ObjectType, name: &str, granted_on: &str) -> Vec<GrantTarget> {
    if granted_on == object_type.keyword() {
        return vec![GrantTarget::Object {
            object_type: granted_on.to_owned(),
            name: name.to_owned(),
        }];
    }
    let object_types = pluralize(granted_on);
    vec![
        GrantTarget::All {
            object_types: object_types.clone(),
            container_type: object_type,
            container: name.to_owned(),
        },
        GrantTarget::Future {
            object_types,
            container_type: object_type,
            container: name.to_owned(),
        },
    ]
}

/// `TABLE` -> `TABLES`, `MASKING POLICY` -> `MASKING POLICIES`
fn pluralize(object_type: &str) -> String {
    match object_type.strip_suffix('Y') {
        Some(stem) if !stem.ends_with(['A', 'E', 'I', 'O', 'U']) => format!("{stem}IES"),
        _ => format!("{object_type}S"),
    }
}

fn create_object(scope: &Scope, params: &Params) -> Statement {
    let mut transient = false;
    let mut properties = vec![];
    for (key, value) in params {
        match (key.as_str(), value) {
            (TRANSIENT, ParamValue::Bool(b)) => transient = *b,
            (MANAGED_ACCESS, ParamValue::Bool(true)) => {
                properties.push("WITH MANAGED ACCESS".to_owned())
            }
            (MANAGED_ACCESS, _) => (),
            (TAG, value) => properties.push(format!("WITH TAG ( {} )", bare(value))),
            (key, value) if BARE_PROPERTIES.contains(&key) => {
                properties.push(format!("{key} = {}", bare(value)))
            }
            (key, value) => properties.push(format!("{key} = {value}")),
        }
    }
    Statement::CreateObject {
        object_type: scope.object_type(),
        name: scope.sql_name(),
        transient,
        properties,
    }
}

fn bare(value: &ParamValue) -> String {
    match value {
        ParamValue::Str(s) => s.to_owned(),
        other => other.to_string(),
    }
}
