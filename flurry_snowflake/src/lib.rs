//! Snowflake Connector
//!
//! Everything needed for connection and interaction with Snowflake.
//!
//! ```no_run
//! use flurry_core::fetch_credentials;
//! use flurry_snowflake::SnowflakeConnector;
//!
//! let credentials = fetch_credentials(None).unwrap();
//! let snow = SnowflakeConnector::new(&credentials).unwrap();
//! ```

mod consts;
mod creds;
mod entry;
mod rest;

pub use entry::*;
pub use rest::SnowflakeApiError;
use rest::SnowflakeRestClient;

use std::iter::zip;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use flurry_core::catalog::{Catalog, ObservedGrant, SchemaName};
use flurry_core::connection::CredentialsMap;
use flurry_core::identifier::Identifier;
use flurry_core::logging::debug;
use flurry_core::write::Executor;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{Map, Value as JsonValue};

/// The main Snowflake Connector struct.
///
/// Use this connector to read the catalog and run statements.
pub struct SnowflakeConnector {
    rest_client: SnowflakeRestClient,
}

#[derive(Deserialize, Debug)]
struct SnowflakeField {
    #[serde(default)]
    name: String,
}

impl SnowflakeConnector {
    /// Validates the connection settings and bootstraps a Snowflake
    /// connection.
    pub fn new(credentials: &CredentialsMap) -> Result<Self> {
        let conn = creds::SnowflakeCredentials::from_map(credentials)?;
        Ok(SnowflakeConnector {
            rest_client: SnowflakeRestClient::new(conn)?,
        })
    }

    /// Get all grants to a role: the privileges and "children" roles.
    /// `None` if the role doesn't exist.
    pub async fn get_grants_to_role(&self, role: &Identifier) -> Result<Option<Vec<Grant>>> {
        match self
            .query_to_obj::<Grant>(&format!("SHOW GRANTS TO ROLE {}", role.to_sql()))
            .await
        {
            Ok(grants) => Ok(Some(grants)),
            Err(e)
                if e
                    .downcast_ref::<SnowflakeApiError>()
                    .map_or(false, |e| e.is_missing_object()) =>
            {
                debug!("{role} doesn't exist");
                Ok(None)
            }
            Err(e) => Err(e.context(format!("failed to get grants to role {role}"))),
        }
    }

    /// Get all roles.
    pub async fn get_roles(&self) -> Result<Vec<Role>> {
        self.query_to_obj::<Role>("SHOW ROLES")
            .await
            .context("failed to get roles")
    }

    /// Get all databases.
    pub async fn get_databases(&self) -> Result<Vec<Database>> {
        self.query_to_obj::<Database>("SHOW DATABASES")
            .await
            .context("failed to get databases")
    }

    /// Get all schemas.
    pub async fn get_schemas(&self) -> Result<Vec<Schema>> {
        self.query_to_obj::<Schema>("SHOW SCHEMAS IN ACCOUNT")
            .await
            .context("failed to get schemas")
    }

    /// Get all warehouses.
    pub async fn get_warehouses(&self) -> Result<Vec<Warehouse>> {
        self.query_to_obj::<Warehouse>("SHOW WAREHOUSES")
            .await
            .context("failed to get warehouses")
    }

    /// Execute the given query and deserialize the result into the given type.
    ///
    /// Rows come back as arrays of strings next to the column names; each
    /// row is zipped into an object before deserializing.
    pub async fn query_to_obj<T>(&self, query: &str) -> Result<Vec<T>>
    where
        T: DeserializeOwned,
    {
        let result = self.rest_client.query(query).await.context("query failed")?;
        if result.is_empty() {
            return Ok(vec![]);
        }
        let rows_value: JsonValue =
            serde_json::from_str(&result).context("failed to deserialize")?;
        let partitions = &rows_value["resultSetMetaData"]["partitionInfo"];
        if partitions.as_array().map_or(false, |p| p.len() > 1) {
            bail!("unexpected partitioned result for {query:?}: {partitions}");
        }
        let rows: Vec<Vec<Option<String>>> =
            serde_json::from_value(rows_value["data"].clone()).context("failed to deserialize rows")?;
        let fields_intermediate: Vec<SnowflakeField> =
            serde_json::from_value(rows_value["resultSetMetaData"]["rowType"].clone())
                .context("failed to deserialize fields")?;
        let fields: Vec<String> = fields_intermediate.into_iter().map(|i| i.name).collect();

        rows.into_iter()
            .map(|row| {
                let map: Map<String, JsonValue> = zip(
                    fields.iter().cloned(),
                    row.into_iter()
                        .map(|x| JsonValue::String(x.unwrap_or_default())),
                )
                .collect();
                serde_json::from_value(JsonValue::Object(map)).context("failed to deserialize row")
            })
            .collect()
    }
}

#[async_trait]
impl Catalog for SnowflakeConnector {
    async fn roles(&self) -> Result<Vec<String>> {
        Ok(self.get_roles().await?.into_iter().map(|r| r.name).collect())
    }

    async fn databases(&self) -> Result<Vec<String>> {
        Ok(self
            .get_databases()
            .await?
            .into_iter()
            .map(|d| d.name)
            .collect())
    }

    async fn schemas(&self) -> Result<Vec<SchemaName>> {
        Ok(self
            .get_schemas()
            .await?
            .into_iter()
            .map(|s| SchemaName {
                database: s.database_name,
                name: s.name,
            })
            .collect())
    }

    async fn warehouses(&self) -> Result<Vec<String>> {
        Ok(self
            .get_warehouses()
            .await?
            .into_iter()
            .map(|w| w.name)
            .collect())
    }

    async fn grants_to_role(&self, role: &Identifier) -> Result<Option<Vec<ObservedGrant>>> {
        Ok(self
            .get_grants_to_role(role)
            .await?
            .map(|grants| grants.into_iter().map(ObservedGrant::from).collect()))
    }
}

#[async_trait]
impl Executor for SnowflakeConnector {
    async fn execute(&self, sql: &str) -> Result<()> {
        self.rest_client.execute(sql).await
    }
}
