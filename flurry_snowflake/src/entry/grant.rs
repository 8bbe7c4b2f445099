use flurry_core::catalog::ObservedGrant;
use serde::{Deserialize, Serialize};

/// Snowflake Grant entry, one row of `SHOW GRANTS TO ROLE`.
#[derive(Default, Deserialize, Serialize, Debug, PartialEq, Eq, Hash, Clone)]
pub struct Grant {
    /// The role name or fully-qualified object name this grant grants access to.
    pub name: String,
    /// e.g. `USAGE`
    pub privilege: String,
    /// The type of the granted object, e.g. `ROLE`
    pub granted_on: String,
}

impl From<Grant> for ObservedGrant {
    fn from(grant: Grant) -> Self {
        ObservedGrant {
            privilege: grant.privilege,
            granted_on: grant.granted_on,
            name: grant.name,
        }
    }
}
