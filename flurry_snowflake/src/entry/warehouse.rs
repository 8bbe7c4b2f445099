use serde::{Deserialize, Serialize};

/// Snowflake Warehouse entry.
#[derive(Clone, Default, Deserialize, Serialize, Debug, PartialEq, Eq)]
pub struct Warehouse {
    /// The warehouse name in Snowflake.
    pub name: String,
}
