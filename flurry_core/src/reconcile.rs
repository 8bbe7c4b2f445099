//! Functional role reconciliation.
//!
//! The desired membership of a functional role is computed from its rules
//! against the catalog, the observed membership is read from its grants,
//! and the difference becomes GRANT/REVOKE statements. Observed grants that
//! don't follow the naming convention are reported and left alone.

use std::collections::BTreeSet;
use std::fmt::Display;

use anyhow::{Context, Result};
use colored::Colorize;

use crate::catalog::{Catalog, CatalogSnapshot, ObservedGrant};
use crate::config::RuleOrder;
use crate::identifier::Identifier;
use crate::logging::{debug, warn};
use crate::naming::{classify_role, RoleKind};
use crate::rules::{RuleKind, RuleSet};
use crate::write::Statement;

const ROLE: &str = "ROLE";
const USAGE: &str = "USAGE";
const OWNERSHIP: &str = "OWNERSHIP";

/// Roles split by kind.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RoleSet {
    /// Access roles
    pub access: BTreeSet<Identifier>,
    /// Functional roles
    pub functional: BTreeSet<Identifier>,
}

impl RoleSet {
    /// Add a role under its kind. Roles of neither kind are refused and
    /// `false` is returned.
    pub fn insert(&mut self, role: Identifier) -> bool {
        match classify_role(role.value()) {
            RoleKind::Access => {
                self.access.insert(role);
                true
            }
            RoleKind::Functional => {
                self.functional.insert(role);
                true
            }
            RoleKind::Unrecognized => false,
        }
    }

    /// Drop a role.
    pub fn remove(&mut self, role: &Identifier) {
        self.access.remove(role);
        self.functional.remove(role);
    }

    /// Roles in `self` but not in `other`.
    pub fn difference(&self, other: &RoleSet) -> RoleSet {
        RoleSet {
            access: self.access.difference(&other.access).cloned().collect(),
            functional: self
                .functional
                .difference(&other.functional)
                .cloned()
                .collect(),
        }
    }

    /// Access roles first, then functional roles, each sorted.
    pub fn iter(&self) -> impl Iterator<Item = &Identifier> {
        self.access.iter().chain(self.functional.iter())
    }

    /// Number of roles.
    pub fn len(&self) -> usize {
        self.access.len() + self.functional.len()
    }

    /// Whether there are no roles.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Extend<Identifier> for RoleSet {
    fn extend<T: IntoIterator<Item = Identifier>>(&mut self, iter: T) {
        for role in iter {
            self.insert(role);
        }
    }
}

impl FromIterator<Identifier> for RoleSet {
    fn from_iter<T: IntoIterator<Item = Identifier>>(iter: T) -> Self {
        let mut set = RoleSet::default();
        set.extend(iter);
        set
    }
}

/// What a functional role currently holds.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ObservedState {
    /// Whether the role exists at all
    pub exists: bool,
    /// Access and functional roles granted to it
    pub roles: RoleSet,
    /// Granted roles that are neither access nor functional roles
    pub unrecognized_roles: Vec<Identifier>,
    /// Privileges granted directly on objects
    pub privileges: Vec<ObservedGrant>,
}

impl ObservedState {
    /// Classify the grants of a role. `None` means the role doesn't exist.
    pub fn from_grants(grants: Option<Vec<ObservedGrant>>) -> Self {
        let Some(grants) = grants else {
            return Self::default();
        };

        let mut state = ObservedState {
            exists: true,
            ..Default::default()
        };
        for grant in grants {
            if grant.privilege == OWNERSHIP {
                continue;
            }
            if grant.granted_on != ROLE || grant.privilege != USAGE {
                state.privileges.push(grant);
                continue;
            }
            match Identifier::from_catalog_name(&grant.name) {
                Ok(role) => {
                    if !state.roles.insert(role.clone()) {
                        state.unrecognized_roles.push(role);
                    }
                }
                Err(e) => {
                    warn!("skipping granted role {:?}: {e}", grant.name);
                    state.privileges.push(grant);
                }
            }
        }
        state
    }
}

/// Evaluate a rule set against the catalog.
///
/// With `INCEXC` the result is everything included minus everything
/// excluded. With `EXCINC` the custom inclusions are added back after the
/// exclusions. The target role is never a member of itself.
pub fn desired_roles(rule_set: &RuleSet, snapshot: &CatalogSnapshot) -> RoleSet {
    let evaluate = |kind| -> RoleSet {
        rule_set
            .rules_of(kind)
            .flat_map(|rule| rule.matching_roles(snapshot))
            .collect()
    };

    let mut included = evaluate(RuleKind::Include);
    let mut excluded = evaluate(RuleKind::Exclude);
    excluded.extend(rule_set.custom_exclude.iter().cloned());

    let mut desired = match rule_set.order {
        RuleOrder::IncludeExclude => {
            included.extend(rule_set.custom_include.iter().cloned());
            included.difference(&excluded)
        }
        RuleOrder::ExcludeInclude => {
            let mut desired = included.difference(&excluded);
            desired.extend(rule_set.custom_include.iter().cloned());
            desired
        }
    };
    desired.remove(&rule_set.target);
    desired
}

/// The changes that converge one functional role.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RoleDelta {
    /// The functional role
    pub role: Identifier,
    /// The role doesn't exist yet
    pub create_role: bool,
    /// Roles to grant
    pub add: RoleSet,
    /// Roles to revoke
    pub remove: RoleSet,
    /// Granted roles left alone because they aren't managed
    pub unrecognized: Vec<Identifier>,
    /// Direct privileges left alone
    pub privileges: Vec<ObservedGrant>,
}

/// Compare desired and observed membership.
pub fn reconcile(target: &Identifier, desired: &RoleSet, observed: &ObservedState) -> RoleDelta {
    let mut desired = desired.clone();
    desired.remove(target);
    RoleDelta {
        role: target.clone(),
        create_role: !observed.exists,
        add: desired.difference(&observed.roles),
        remove: observed.roles.difference(&desired),
        unrecognized: observed.unrecognized_roles.clone(),
        privileges: observed.privileges.clone(),
    }
}

impl RoleDelta {
    /// Whether nothing needs to run.
    pub fn is_empty(&self) -> bool {
        !self.create_role && self.add.is_empty() && self.remove.is_empty()
    }

    /// Statements in execution order: create the role if needed, grant
    /// access roles, grant functional roles, then revoke.
    pub fn statements(&self) -> Vec<Statement> {
        let create = self
            .create_role
            .then(|| Statement::CreateRole(self.role.clone()));
        let grants = self.add.iter().map(|role| Statement::GrantRole {
            role: role.clone(),
            to: self.role.clone(),
        });
        let revokes = self.remove.iter().map(|role| Statement::RevokeRole {
            role: role.clone(),
            from: self.role.clone(),
        });
        create.into_iter().chain(grants).chain(revokes).collect()
    }

    /// Log everything that was left alone.
    pub fn warn_unmanaged(&self) {
        for role in &self.unrecognized {
            warn!(
                "{} holds role {} which is neither an access nor a functional role; leaving it in place",
                self.role, role
            );
        }
        for grant in &self.privileges {
            warn!(
                "{} holds {} on {} {} directly; leaving it in place",
                self.role, grant.privilege, grant.granted_on, grant.name
            );
        }
    }
}

impl Display for RoleDelta {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut text = "".to_owned();
        if self.create_role {
            text += format!("{}", format!("+ role: {}\n", self.role).green()).as_str();
        } else if self.is_empty() {
            text += format!("  role: {} (no changes)\n", self.role).as_str();
        } else {
            text += format!("{}", format!("~ role: {}\n", self.role).yellow()).as_str();
        }
        for role in self.add.iter() {
            text += format!("{}", format!("    + {role}\n").green()).as_str();
        }
        for role in self.remove.iter() {
            text += format!("{}", format!("    - {role}\n").red()).as_str();
        }
        for role in &self.unrecognized {
            text += format!("    ? {role} (unmanaged)\n").as_str();
        }
        write!(f, "{text}")
    }
}

/// Fetch the grants of a role, compute and return its delta.
pub async fn plan_role(
    catalog: &dyn Catalog,
    snapshot: &CatalogSnapshot,
    rule_set: &RuleSet,
) -> Result<RoleDelta> {
    let grants = catalog
        .grants_to_role(&rule_set.target)
        .await
        .with_context(|| format!("reading grants of {}", rule_set.target))?;
    let observed = ObservedState::from_grants(grants);
    let desired = desired_roles(rule_set, snapshot);
    debug!(
        "{}: {} desired roles, {} observed",
        rule_set.target,
        desired.len(),
        observed.roles.len()
    );
    Ok(reconcile(&rule_set.target, &desired, &observed))
}
