use serde::{Deserialize, Serialize};

/// Snowflake Database entry.
#[derive(Clone, Default, Deserialize, Serialize, Debug, PartialEq, Eq)]
pub struct Database {
    /// The database name in Snowflake.
    pub name: String,
}
