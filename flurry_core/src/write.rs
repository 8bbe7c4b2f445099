//! Write path: statement plans and their execution.

pub mod statement;

use std::fmt::Display;

use anyhow::{Context, Result};
use async_trait::async_trait;
use indexmap::IndexSet;
use mockall::automock;

use crate::logging::{debug, info};

pub use statement::{GrantTarget, Statement};

/// Runs SQL against the platform.
#[automock]
#[async_trait]
pub trait Executor: Send + Sync {
    /// Execute one statement, discarding any result.
    async fn execute(&self, sql: &str) -> Result<()>;
}

/// Statements grouped into phases that have to run in order. Each phase
/// keeps the first occurrence of a statement only.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PrioritizedStatements {
    /// Objects and roles
    pub objects: IndexSet<Statement>,
    /// Ownership of the objects and roles
    pub owner_grants: IndexSet<Statement>,
    /// Role-to-role grants
    pub role_grants: IndexSet<Statement>,
    /// Privileges on objects
    pub object_grants: IndexSet<Statement>,
}

impl PrioritizedStatements {
    /// Everything, in execution order.
    pub fn flatten(&self) -> Vec<Statement> {
        [
            &self.objects,
            &self.owner_grants,
            &self.role_grants,
            &self.object_grants,
        ]
        .into_iter()
        .flatten()
        .cloned()
        .collect()
    }

    /// The statements that undo this plan: object grants are revoked, then
    /// role grants, then roles and objects are dropped. The owner phase is
    /// skipped; dropping the object takes its owner grants with it.
    pub fn teardown(&self) -> Vec<Statement> {
        [&self.object_grants, &self.role_grants, &self.objects]
        .into_iter()
        .flat_map(|phase| phase.iter().rev().filter_map(Statement::negate))
        .collect()
    }
}

impl Display for PrioritizedStatements {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for statement in self.flatten() {
            writeln!(f, "{statement}")?;
        }
        Ok(())
    }
}

/// Execute `statements` one at a time, in order. Stops at the first
/// failure; statements that already ran stay applied. Returns the number of
/// statements executed.
pub async fn apply(executor: &dyn Executor, statements: &[Statement]) -> Result<usize> {
    let total = statements.len();
    for (i, statement) in statements.iter().enumerate() {
        let sql = statement.to_string();
        debug!("executing {}/{}: {}", i + 1, total, sql);
        executor.execute(&sql).await.with_context(|| {
            format!(
                "statement {}/{} failed: {}\n{} earlier statements were applied and are not rolled back",
                i + 1,
                total,
                sql,
                i
            )
        })?;
    }
    info!("applied {} statements", total);
    Ok(total)
}

#[cfg(test)]
mod tests {
    use anyhow::anyhow;
    use mockall::{predicate::eq, Sequence};

    use super::*;
    use crate::identifier::Identifier;

    fn id(text: &str) -> Identifier {
        Identifier::parse(text).unwrap()
    }

    fn plan() -> PrioritizedStatements {
        let mut plan = PrioritizedStatements::default();
        plan.objects.insert(Statement::CreateRole(id("A_AR")));
        plan.objects.insert(Statement::CreateRole(id("A_AR")));
        plan.owner_grants.insert(Statement::GrantOwnership {
            object_type: "ROLE".to_owned(),
            name: "A_AR".to_owned(),
            owner: id("SYSADMIN"),
        });
        plan.owner_grants.insert(Statement::GrantPrivilege {
            privilege: "ALL PRIVILEGES".to_owned(),
            target: GrantTarget::Object {
                object_type: "DATABASE".to_owned(),
                name: "SALES".to_owned(),
            },
            role: id("SYSADMIN"),
        });
        plan.role_grants.insert(Statement::GrantRole {
            role: id("A_AR"),
            to: id("SYSADMIN"),
        });
        plan
    }

    #[test]
    fn phases_deduplicate() {
        assert_eq!(plan().flatten().len(), 4);
    }

    #[test]
    fn teardown_leaves_owner_grants_alone() {
        let teardown = plan().teardown();
        assert!(teardown
            .iter()
            .all(|s| !s.to_string().contains("ALL PRIVILEGES")));
    }

    #[test]
    fn teardown_reverses() {
        let teardown: Vec<String> = plan().teardown().iter().map(|s| s.to_string()).collect();
        assert_eq!(
            teardown,
            vec![
                "REVOKE ROLE A_AR FROM ROLE SYSADMIN;",
                "DROP ROLE IF EXISTS A_AR;"
            ]
        );
    }

    #[tokio::test]
    async fn apply_runs_in_order() {
        let mut executor = MockExecutor::new();
        let mut seq = Sequence::new();
        for sql in ["CREATE ROLE IF NOT EXISTS A_AR;", "DROP ROLE IF EXISTS A_AR;"] {
            executor
                .expect_execute()
                .with(eq(sql))
                .times(1)
                .in_sequence(&mut seq)
                .returning(|_| Ok(()));
        }
        let statements = vec![
            Statement::CreateRole(id("A_AR")),
            Statement::DropRole(id("A_AR")),
        ];
        assert_eq!(apply(&executor, &statements).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn apply_stops_at_first_failure() {
        let mut executor = MockExecutor::new();
        executor
            .expect_execute()
            .with(eq("CREATE ROLE IF NOT EXISTS A_AR;"))
            .times(1)
            .returning(|_| Ok(()));
        executor
            .expect_execute()
            .with(eq("CREATE ROLE IF NOT EXISTS B_AR;"))
            .times(1)
            .returning(|_| Err(anyhow!("insufficient privileges")));

        let statements = vec![
            Statement::CreateRole(id("A_AR")),
            Statement::CreateRole(id("B_AR")),
            Statement::CreateRole(id("C_AR")),
        ];
        let err = apply(&executor, &statements).await.unwrap_err();
        assert!(format!("{err:#}").contains("statement 2/3 failed"), "{err:#}");
        assert!(format!("{err:#}").contains("1 earlier statements"), "{err:#}");
    }
}
