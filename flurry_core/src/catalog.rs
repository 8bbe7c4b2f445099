//! Read access to the live catalog.
//!
//! The [`Catalog`] trait is implemented by connectors. Everything the
//! reconciler needs is pulled once per run into a [`CatalogSnapshot`].

use std::collections::BTreeSet;

use anyhow::{Context, Result};
use async_trait::async_trait;
use mockall::automock;
use serde::{Deserialize, Serialize};

use crate::config::ProvisionConfig;
use crate::identifier::{CompositeReference, Identifier};
use crate::log_runtime;
use crate::logging::debug;
use crate::naming::{access_role_name, classify_role, ObjectType, RoleKind, Scope};

/// Databases that belong to the platform, not to anyone's hierarchy.
const SYSTEM_DATABASES: [&str; 1] = ["SNOWFLAKE"];
/// Schemas that exist in every database.
const SYSTEM_SCHEMAS: [&str; 1] = ["INFORMATION_SCHEMA"];

/// One row of `SHOW GRANTS TO ROLE`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObservedGrant {
    /// e.g. `USAGE` or `OWNERSHIP`
    pub privilege: String,
    /// The type of the granted object, e.g. `ROLE` or `TABLE`
    pub granted_on: String,
    /// The granted object's name as the catalog reports it
    pub name: String,
}

/// A schema as listed by the catalog.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SchemaName {
    /// Database name
    pub database: String,
    /// Schema name
    pub name: String,
}

/// The catalog queries the core needs.
#[automock]
#[async_trait]
pub trait Catalog: Send + Sync {
    /// All role names.
    async fn roles(&self) -> Result<Vec<String>>;
    /// All database names.
    async fn databases(&self) -> Result<Vec<String>>;
    /// All schemas in the account.
    async fn schemas(&self) -> Result<Vec<SchemaName>>;
    /// All warehouse names.
    async fn warehouses(&self) -> Result<Vec<String>>;
    /// Grants held by `role`, or `None` if the role doesn't exist.
    async fn grants_to_role(&self, role: &Identifier) -> Result<Option<Vec<ObservedGrant>>>;
}

/// An existing access role and what it is bound to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AccessRoleEntry {
    /// The role
    pub role: Identifier,
    /// The object it grants access to
    pub scope: Scope,
    /// Its tier
    pub tier: Identifier,
}

/// The roles and objects that exist, with access roles tied back to their
/// (scope, tier) pairs through the naming convention.
#[derive(Clone, Debug, Default)]
pub struct CatalogSnapshot {
    /// Every role
    pub roles: BTreeSet<Identifier>,
    /// Access roles that exist and match an object and tier
    pub access_roles: Vec<AccessRoleEntry>,
    /// Roles with the functional suffix
    pub functional_roles: BTreeSet<Identifier>,
}

impl CatalogSnapshot {
    /// Build a snapshot from catalog listings.
    pub fn new(
        roles: BTreeSet<Identifier>,
        databases: &[Identifier],
        schemas: &[CompositeReference],
        warehouses: &[Identifier],
        hierarchies: &ProvisionConfig,
    ) -> Self {
        let scopes = databases
            .iter()
            .cloned()
            .map(Scope::Database)
            .chain(schemas.iter().cloned().map(Scope::Schema))
            .chain(warehouses.iter().cloned().map(Scope::Warehouse));

        let mut access_roles = vec![];
        for scope in scopes {
            let hierarchy = hierarchies.hierarchy(scope.object_type());
            for tier in &hierarchy.tiers {
                match access_role_name(&hierarchy.prefix, &scope, tier) {
                    Ok(role) if roles.contains(&role) => access_roles.push(AccessRoleEntry {
                        role,
                        scope: scope.clone(),
                        tier: tier.clone(),
                    }),
                    Ok(_) => (),
                    Err(e) => debug!("no access role possible for {scope}: {e}"),
                }
            }
        }

        let functional_roles = roles
            .iter()
            .filter(|r| classify_role(r.value()) == RoleKind::Functional)
            .cloned()
            .collect();

        Self {
            roles,
            access_roles,
            functional_roles,
        }
    }

    /// Query the catalog and build a snapshot.
    pub async fn fetch(catalog: &dyn Catalog, hierarchies: &ProvisionConfig) -> Result<Self> {
        log_runtime!("fetching catalog snapshot", {
            let roles = catalog_names(catalog.roles().await.context("listing roles")?);
            let databases: Vec<Identifier> =
                catalog_names::<Vec<_>>(catalog.databases().await.context("listing databases")?)
                    .into_iter()
                    .filter(|db| !SYSTEM_DATABASES.contains(&db.value()))
                    .collect();
            let schemas: Vec<CompositeReference> = catalog
                .schemas()
                .await
                .context("listing schemas")?
                .into_iter()
                .filter(|s| {
                    !SYSTEM_SCHEMAS.contains(&s.name.as_str())
                        && !SYSTEM_DATABASES.contains(&s.database.as_str())
                })
                .filter_map(|s| {
                    Some(CompositeReference::new(
                        catalog_name(&s.database)?,
                        catalog_name(&s.name)?,
                    ))
                })
                .collect();
            let warehouses: Vec<Identifier> =
                catalog_names(catalog.warehouses().await.context("listing warehouses")?);

            Ok(Self::new(
                roles,
                &databases,
                &schemas,
                &warehouses,
                hierarchies,
            ))
        })
    }

    /// Every (scope, tier) binding of an access role.
    pub fn resolve(&self, role: &Identifier) -> Vec<&AccessRoleEntry> {
        self.access_roles.iter().filter(|e| &e.role == role).collect()
    }
}

fn catalog_name(name: &str) -> Option<Identifier> {
    match Identifier::from_catalog_name(name) {
        Ok(id) => Some(id),
        Err(e) => {
            debug!("skipping catalog entry: {e}");
            None
        }
    }
}

fn catalog_names<C: FromIterator<Identifier>>(names: Vec<String>) -> C {
    names.iter().filter_map(|n| catalog_name(n)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::test_util::provision_config;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn snapshot_ties_roles_to_scopes() {
        let mut catalog = MockCatalog::new();
        catalog.expect_roles().returning(|| {
            Ok(names(&[
                "AR_SALES_READ_AR",
                "AR_SALES_WRITE_AR",
                "AR_SALES_RAW_READ_AR",
                "AR_ORPHAN_READ_AR",
                "ANALYST_FR",
                "SYSADMIN",
            ]))
        });
        catalog
            .expect_databases()
            .returning(|| Ok(names(&["SALES", "SNOWFLAKE"])));
        catalog.expect_schemas().returning(|| {
            Ok(vec![
                SchemaName {
                    database: "SALES".to_owned(),
                    name: "RAW".to_owned(),
                },
                SchemaName {
                    database: "SALES".to_owned(),
                    name: "INFORMATION_SCHEMA".to_owned(),
                },
            ])
        });
        catalog.expect_warehouses().returning(|| Ok(vec![]));

        let snapshot = CatalogSnapshot::fetch(&catalog, &provision_config())
            .await
            .unwrap();

        let bound: Vec<_> = snapshot
            .access_roles
            .iter()
            .map(|e| e.role.to_sql())
            .collect();
        assert_eq!(
            bound,
            vec!["AR_SALES_READ_AR", "AR_SALES_WRITE_AR", "AR_SALES_RAW_READ_AR"]
        );
        assert_eq!(
            snapshot.functional_roles,
            BTreeSet::from([Identifier::parse("ANALYST_FR").unwrap()])
        );
        let entry = snapshot.resolve(&Identifier::parse("AR_SALES_RAW_READ_AR").unwrap());
        assert_eq!(entry.len(), 1);
        assert_eq!(entry[0].scope.object_type(), ObjectType::Schema);
    }

    #[test]
    fn quoted_scopes_resolve() {
        let roles = BTreeSet::from([Identifier::from_catalog_name("AR_my.db_READ_AR").unwrap()]);
        let snapshot = CatalogSnapshot::new(
            roles,
            &[Identifier::from_catalog_name("my.db").unwrap()],
            &[],
            &[],
            &provision_config(),
        );
        assert_eq!(snapshot.access_roles.len(), 1);
        assert_eq!(snapshot.access_roles[0].role.to_sql(), r#""AR_my.db_READ_AR""#);
    }
}
