use std::collections::BTreeSet;
use std::fs;
use std::path::PathBuf;

use flurry_core::catalog::{MockCatalog, ObservedGrant, SchemaName};
use flurry_core::config::{load_functional_config, Params, ProvisionConfig};
use flurry_core::identifier::{split_composite, Identifier};
use flurry_core::naming::{ObjectType, Scope};
use flurry_core::provision::{deprovision, provision};
use flurry_core::reconcile::plan_role;
use flurry_core::write::{apply, MockExecutor};
use flurry_core::CatalogSnapshot;
use mockall::predicate::eq;

const DB_CONFIG: &str = r#"{
    "TYPE": "DATABASE",
    "ROLE_HIERARCHY": ["READ", "WRITE", "OWNER"],
    "ROLE_PERMISSIONS": {
        "READ": {"USAGE": ["DATABASE"]},
        "WRITE": {"CREATE SCHEMA": ["DATABASE"]},
        "OWNER": {"MONITOR": ["DATABASE"]}
    },
    "ROLE_OWNER": "SYSADMIN",
    "AR_PREFIX": "AR_"
}"#;

const SC_CONFIG: &str = r#"{
    "TYPE": "SCHEMA",
    "ROLE_HIERARCHY": ["READ", "WRITE", "OWNER"],
    "ROLE_PERMISSIONS": {
        "READ": {"SELECT": ["TABLE", "VIEW"]},
        "WRITE": {"INSERT": ["TABLE"]},
        "OWNER": {"CREATE TABLE": ["SCHEMA"]}
    },
    "ROLE_OWNER": "SYSADMIN",
    "AR_PREFIX": "AR_"
}"#;

const WH_CONFIG: &str = r#"{
    "TYPE": "WAREHOUSE",
    "ROLE_HIERARCHY": ["USAGE", "OPERATE"],
    "ROLE_PERMISSIONS": {
        "USAGE": {"USAGE": ["WAREHOUSE"]},
        "OPERATE": {"OPERATE": ["WAREHOUSE"]}
    },
    "ROLE_OWNER": "SYSADMIN",
    "AR_PREFIX": "WH_",
    "DEFAULT_WH_PARAMS": {"WAREHOUSE_SIZE": "XSMALL", "AUTO_SUSPEND": 60}
}"#;

const FR_CONFIG: &str = r#"{
    "ANALYST_FR": {
        "INCLUDE": [{"TYPE": "DATABASE", "DATABASE": "SALES", "ROLE": "READ"}]
    }
}"#;

fn config_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("flurry-scenario-{name}-{}", std::process::id()));
    fs::create_dir_all(&dir).unwrap();
    for (file, contents) in [
        ("db-config.json", DB_CONFIG),
        ("sc-config.json", SC_CONFIG),
        ("wh-config.json", WH_CONFIG),
        ("fr-config.json", FR_CONFIG),
    ] {
        fs::write(dir.join(file), contents).unwrap();
    }
    dir
}

fn render(statements: &[flurry_core::write::Statement]) -> Vec<String> {
    statements.iter().map(|s| s.to_string()).collect()
}

fn id(text: &str) -> Identifier {
    Identifier::parse(text).unwrap()
}

#[test]
fn sales_database_hierarchy() {
    let hierarchies = ProvisionConfig::load(&[config_dir("sales")]).unwrap();
    let scope = Scope::parse(ObjectType::Database, "SALES").unwrap();
    let plan = provision(&hierarchies, &scope, Params::new()).unwrap();
    let sql = render(&plan.flatten());

    for role in ["AR_SALES_READ_AR", "AR_SALES_WRITE_AR", "AR_SALES_OWNER_AR"] {
        assert!(
            sql.contains(&format!("CREATE ROLE IF NOT EXISTS {role};")),
            "{role} missing from {sql:#?}"
        );
    }
    assert!(sql.contains(&"GRANT ROLE AR_SALES_READ_AR TO ROLE AR_SALES_WRITE_AR;".to_owned()));
    assert!(sql.contains(&"GRANT ROLE AR_SALES_WRITE_AR TO ROLE AR_SALES_OWNER_AR;".to_owned()));
    assert!(sql.contains(&"GRANT ROLE AR_SALES_OWNER_AR TO ROLE SYSADMIN;".to_owned()));
    assert!(sql.contains(&"GRANT USAGE ON DATABASE SALES TO ROLE AR_SALES_READ_AR;".to_owned()));

    let creates = sql.iter().position(|s| s.starts_with("CREATE ROLE")).unwrap();
    let first_grant = sql.iter().position(|s| s.starts_with("GRANT")).unwrap();
    assert!(creates < first_grant);
}

#[test]
fn warehouse_defaults_apply() {
    let hierarchies = ProvisionConfig::load(&[config_dir("warehouse")]).unwrap();
    let scope = Scope::parse(ObjectType::Warehouse, "load_wh").unwrap();
    let plan = provision(&hierarchies, &scope, Params::new()).unwrap();
    assert_eq!(
        plan.flatten()[0].to_string(),
        "CREATE WAREHOUSE IF NOT EXISTS LOAD_WH\n  WAREHOUSE_SIZE = 'XSMALL'\n  AUTO_SUSPEND = 60;"
    );
    assert!(render(&plan.flatten())
        .contains(&"GRANT ROLE WH_LOAD_WH_USAGE_AR TO ROLE WH_LOAD_WH_OPERATE_AR;".to_owned()));
}

#[test]
fn teardown_mirrors_creation() {
    let hierarchies = ProvisionConfig::load(&[config_dir("teardown")]).unwrap();
    let scope = Scope::parse(ObjectType::Schema, "sales.raw").unwrap();
    let sql = render(&deprovision(&hierarchies, &scope).unwrap());
    assert_eq!(sql.last().unwrap(), "DROP SCHEMA IF EXISTS SALES.RAW;");
    assert!(sql.iter().all(|s| !s.contains("OWNERSHIP")));
}

#[test]
fn composite_references_split_or_fail() {
    let reference = split_composite(r#""0123_DB"."01""23_SC""#).unwrap();
    assert_eq!(reference.database.value(), "0123_DB");
    assert_eq!(reference.schema.value(), r#"01"23_SC"#);
    for bad in ["TEST_SC", "TEST_DB.%", r#""01"23_DB"."0123_SC""#] {
        assert!(split_composite(bad).is_err(), "{bad}");
    }
}

fn catalog_with(grants: Vec<ObservedGrant>) -> MockCatalog {
    let mut catalog = MockCatalog::new();
    catalog.expect_roles().returning(|| {
        Ok(["AR_SALES_READ_AR", "AR_SALES_WRITE_AR", "ANALYST_FR", "LEGACY_ADMIN"]
            .iter()
            .map(|s| s.to_string())
            .collect())
    });
    catalog
        .expect_databases()
        .returning(|| Ok(vec!["SALES".to_owned()]));
    catalog.expect_schemas().returning(|| {
        Ok(vec![SchemaName {
            database: "SALES".to_owned(),
            name: "PUBLIC".to_owned(),
        }])
    });
    catalog.expect_warehouses().returning(|| Ok(vec![]));
    catalog
        .expect_grants_to_role()
        .returning(move |_| Ok(Some(grants.clone())));
    catalog
}

fn usage_on_role(name: &str) -> ObservedGrant {
    ObservedGrant {
        privilege: "USAGE".to_owned(),
        granted_on: "ROLE".to_owned(),
        name: name.to_owned(),
    }
}

#[tokio::test]
async fn legacy_admin_is_reported_not_revoked() {
    let dir = config_dir("legacy");
    let hierarchies = ProvisionConfig::load(&[dir.clone()]).unwrap();
    let rule_sets = load_functional_config(&[dir])
        .unwrap()
        .validate(&hierarchies)
        .unwrap();
    let catalog = catalog_with(vec![usage_on_role("LEGACY_ADMIN")]);
    let snapshot = CatalogSnapshot::fetch(&catalog, &hierarchies).await.unwrap();

    let delta = plan_role(&catalog, &snapshot, &rule_sets[0]).await.unwrap();
    assert_eq!(delta.unrecognized, vec![id("LEGACY_ADMIN")]);
    assert_eq!(
        delta.add.iter().cloned().collect::<BTreeSet<_>>(),
        BTreeSet::from([id("AR_SALES_READ_AR")])
    );
    assert!(delta.remove.is_empty());

    let mut executor = MockExecutor::new();
    executor
        .expect_execute()
        .with(eq("GRANT ROLE AR_SALES_READ_AR TO ROLE ANALYST_FR;"))
        .times(1)
        .returning(|_| Ok(()));
    assert_eq!(apply(&executor, &delta.statements()).await.unwrap(), 1);
}

#[tokio::test]
async fn converged_roles_plan_nothing() {
    let dir = config_dir("converged");
    let hierarchies = ProvisionConfig::load(&[dir.clone()]).unwrap();
    let rule_sets = load_functional_config(&[dir])
        .unwrap()
        .validate(&hierarchies)
        .unwrap();
    let catalog = catalog_with(vec![usage_on_role("AR_SALES_READ_AR")]);
    let snapshot = CatalogSnapshot::fetch(&catalog, &hierarchies).await.unwrap();

    let delta = plan_role(&catalog, &snapshot, &rule_sets[0]).await.unwrap();
    assert!(delta.is_empty(), "{delta}");
    assert!(delta.statements().is_empty());
}

#[tokio::test]
async fn stale_access_roles_are_revoked() {
    let dir = config_dir("stale");
    let hierarchies = ProvisionConfig::load(&[dir.clone()]).unwrap();
    let rule_sets = load_functional_config(&[dir])
        .unwrap()
        .validate(&hierarchies)
        .unwrap();
    let catalog = catalog_with(vec![
        usage_on_role("AR_SALES_READ_AR"),
        usage_on_role("AR_SALES_WRITE_AR"),
    ]);
    let snapshot = CatalogSnapshot::fetch(&catalog, &hierarchies).await.unwrap();

    let delta = plan_role(&catalog, &snapshot, &rule_sets[0]).await.unwrap();
    assert_eq!(
        render(&delta.statements()),
        vec!["REVOKE ROLE AR_SALES_WRITE_AR FROM ROLE ANALYST_FR;"]
    );
}
