use serde::{Deserialize, Serialize};

/// Snowflake Schema entry.
#[derive(Clone, Default, Deserialize, Serialize, Debug, PartialEq, Eq)]
pub struct Schema {
    /// The schema name in Snowflake.
    pub name: String,
    /// The database the schema lives in.
    pub database_name: String,
}
