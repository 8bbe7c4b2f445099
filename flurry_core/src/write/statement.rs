//! SQL statements the tool emits.

use std::fmt::Display;

use crate::identifier::Identifier;
use crate::naming::ObjectType;

/// What a privilege is granted on.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum GrantTarget {
    /// A single object: `ON DATABASE SALES`
    Object {
        /// e.g. `DATABASE`
        object_type: String,
        /// SQL name
        name: String,
    },
    /// Existing objects in a container: `ON ALL TABLES IN SCHEMA SALES.RAW`
    All {
        /// Plural object type, e.g. `TABLES`
        object_types: String,
        /// Container type
        container_type: ObjectType,
        /// Container SQL name
        container: String,
    },
    /// Objects created later: `ON FUTURE TABLES IN SCHEMA SALES.RAW`
    Future {
        /// Plural object type, e.g. `TABLES`
        object_types: String,
        /// Container type
        container_type: ObjectType,
        /// Container SQL name
        container: String,
    },
}

impl Display for GrantTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GrantTarget::Object { object_type, name } => write!(f, "{object_type} {name}"),
            GrantTarget::All {
                object_types,
                container_type,
                container,
            } => write!(f, "ALL {object_types} IN {container_type} {container}"),
            GrantTarget::Future {
                object_types,
                container_type,
                container,
            } => write!(f, "FUTURE {object_types} IN {container_type} {container}"),
        }
    }
}

/// A single SQL statement.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Statement {
    /// `CREATE [TRANSIENT ]<TYPE> IF NOT EXISTS <name> ...;`
    CreateObject {
        /// Object type
        object_type: ObjectType,
        /// SQL name
        name: String,
        /// Create as transient
        transient: bool,
        /// Pre-rendered property clauses
        properties: Vec<String>,
    },
    /// `DROP <TYPE> IF EXISTS <name>;`
    DropObject {
        /// Object type
        object_type: ObjectType,
        /// SQL name
        name: String,
    },
    /// `CREATE ROLE IF NOT EXISTS <role>;`
    CreateRole(Identifier),
    /// `DROP ROLE IF EXISTS <role>;`
    DropRole(Identifier),
    /// `GRANT OWNERSHIP ON <type> <name> TO ROLE <owner> REVOKE CURRENT GRANTS;`
    GrantOwnership {
        /// Object type, e.g. `ROLE`
        object_type: String,
        /// SQL name
        name: String,
        /// New owner
        owner: Identifier,
    },
    /// `GRANT <privilege> ON <target> TO ROLE <role>;`
    GrantPrivilege {
        /// Privilege
        privilege: String,
        /// Target
        target: GrantTarget,
        /// Grantee
        role: Identifier,
    },
    /// `REVOKE <privilege> ON <target> FROM ROLE <role>;`
    RevokePrivilege {
        /// Privilege
        privilege: String,
        /// Target
        target: GrantTarget,
        /// Grantee
        role: Identifier,
    },
    /// `GRANT ROLE <role> TO ROLE <to>;`
    GrantRole {
        /// Granted role
        role: Identifier,
        /// Grantee
        to: Identifier,
    },
    /// `REVOKE ROLE <role> FROM ROLE <from>;`
    RevokeRole {
        /// Revoked role
        role: Identifier,
        /// Grantee
        from: Identifier,
    },
}

impl Statement {
    /// The statement that undoes this one. Ownership transfers can't be
    /// undone and return `None`.
    pub fn negate(&self) -> Option<Statement> {
        Some(match self.clone() {
            Statement::CreateObject {
                object_type, name, ..
            } => Statement::DropObject { object_type, name },
            Statement::DropObject { .. } => return None,
            Statement::CreateRole(role) => Statement::DropRole(role),
            Statement::DropRole(role) => Statement::CreateRole(role),
            Statement::GrantOwnership { .. } => return None,
            Statement::GrantPrivilege {
                privilege,
                target,
                role,
            } => Statement::RevokePrivilege {
                privilege,
                target,
                role,
            },
            Statement::RevokePrivilege {
                privilege,
                target,
                role,
            } => Statement::GrantPrivilege {
                privilege,
                target,
                role,
            },
            Statement::GrantRole { role, to } => Statement::RevokeRole { role, from: to },
            Statement::RevokeRole { role, from } => Statement::GrantRole { role, to: from },
        })
    }
}

impl Display for Statement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Statement::CreateObject {
                object_type,
                name,
                transient,
                properties,
            } => {
                let transient = if *transient { "TRANSIENT " } else { "" };
                write!(f, "CREATE {transient}{object_type} IF NOT EXISTS {name}")?;
                for property in properties {
                    write!(f, "\n  {property}")?;
                }
                write!(f, ";")
            }
            Statement::DropObject { object_type, name } => {
                write!(f, "DROP {object_type} IF EXISTS {name};")
            }
            Statement::CreateRole(role) => write!(f, "CREATE ROLE IF NOT EXISTS {role};"),
            Statement::DropRole(role) => write!(f, "DROP ROLE IF EXISTS {role};"),
            Statement::GrantOwnership {
                object_type,
                name,
                owner,
            } => write!(
                f,
                "GRANT OWNERSHIP ON {object_type} {name} TO ROLE {owner} REVOKE CURRENT GRANTS;"
            ),
            Statement::GrantPrivilege {
                privilege,
                target,
                role,
            } => write!(f, "GRANT {privilege} ON {target} TO ROLE {role};"),
            Statement::RevokePrivilege {
                privilege,
                target,
                role,
            } => write!(f, "REVOKE {privilege} ON {target} FROM ROLE {role};"),
            Statement::GrantRole { role, to } => write!(f, "GRANT ROLE {role} TO ROLE {to};"),
            Statement::RevokeRole { role, from } => {
                write!(f, "REVOKE ROLE {role} FROM ROLE {from};")
            }
        }
    }
}
