use serde::{Deserialize, Serialize};

/// Snowflake Role entry.
#[derive(Clone, Default, Deserialize, Serialize, Debug, PartialEq, Eq)]
pub struct Role {
    /// The role name in Snowflake.
    pub name: String,
}
