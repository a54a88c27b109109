//! Persistence for permission tuples.

use async_trait::async_trait;

use super::{Grouping, Rule};
use crate::db::Database;
use crate::Result;

/// Everything stored by an adapter.
#[derive(Debug, Clone, Default)]
pub struct PolicySnapshot {
    /// Permission tuples.
    pub rules: Vec<Rule>,
    /// Role groupings.
    pub groupings: Vec<Grouping>,
}

/// Durable storage behind [`super::PolicyEngine`].
///
/// Every write is idempotent: adding an existing tuple or removing a
/// missing one succeeds and reports `false` / `0`.
#[async_trait]
pub trait PolicyAdapter: Send + Sync {
    /// Load every tuple and grouping.
    async fn load(&self) -> Result<PolicySnapshot>;

    /// Store a tuple. Returns whether it was new.
    async fn add_rule(&self, rule: &Rule) -> Result<bool>;

    /// Delete a tuple. Returns whether it existed.
    async fn remove_rule(&self, rule: &Rule) -> Result<bool>;

    /// Delete every tuple on `object`, optionally only for `action`.
    async fn remove_object(&self, object: &str, action: Option<&str>) -> Result<u64>;

    /// Delete every tuple and grouping naming `subject`.
    async fn remove_subject(&self, subject: &str) -> Result<u64>;

    /// Store a grouping. Returns whether it was new.
    async fn add_grouping(&self, grouping: &Grouping) -> Result<bool>;
}

#[async_trait]
impl PolicyAdapter for Database {
    async fn load(&self) -> Result<PolicySnapshot> {
        let rules: Vec<(String, String, String)> =
            sqlx::query_as(r#"SELECT subject, object, action FROM "user".policy_rules"#)
                .fetch_all(self.pool())
                .await?;
        let groupings: Vec<(String, String)> =
            sqlx::query_as(r#"SELECT member, parent FROM "user".policy_groups"#)
                .fetch_all(self.pool())
                .await?;

        Ok(PolicySnapshot {
            rules: rules
                .into_iter()
                .map(|(s, o, a)| Rule::new(s, o, a))
                .collect(),
            groupings: groupings
                .into_iter()
                .map(|(m, p)| Grouping::new(m, p))
                .collect(),
        })
    }

    async fn add_rule(&self, rule: &Rule) -> Result<bool> {
        let result = sqlx::query(
            r#"INSERT INTO "user".policy_rules (subject, object, action)
               VALUES ($1, $2, $3) ON CONFLICT DO NOTHING"#,
        )
        .bind(&rule.subject)
        .bind(&rule.object)
        .bind(&rule.action)
        .execute(self.pool())
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn remove_rule(&self, rule: &Rule) -> Result<bool> {
        let result = sqlx::query(
            r#"DELETE FROM "user".policy_rules
               WHERE subject = $1 AND object = $2 AND action = $3"#,
        )
        .bind(&rule.subject)
        .bind(&rule.object)
        .bind(&rule.action)
        .execute(self.pool())
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn remove_object(&self, object: &str, action: Option<&str>) -> Result<u64> {
        let result = sqlx::query(
            r#"DELETE FROM "user".policy_rules
               WHERE object = $1 AND ($2::text IS NULL OR action = $2)"#,
        )
        .bind(object)
        .bind(action)
        .execute(self.pool())
        .await?;
        Ok(result.rows_affected())
    }

    async fn remove_subject(&self, subject: &str) -> Result<u64> {
        let mut tx = self.pool().begin().await?;
        let rules = sqlx::query(r#"DELETE FROM "user".policy_rules WHERE subject = $1"#)
            .bind(subject)
            .execute(&mut *tx)
            .await?;
        let groups =
            sqlx::query(r#"DELETE FROM "user".policy_groups WHERE member = $1 OR parent = $1"#)
                .bind(subject)
                .execute(&mut *tx)
                .await?;
        tx.commit().await?;
        Ok(rules.rows_affected() + groups.rows_affected())
    }

    async fn add_grouping(&self, grouping: &Grouping) -> Result<bool> {
        let result = sqlx::query(
            r#"INSERT INTO "user".policy_groups (member, parent)
               VALUES ($1, $2) ON CONFLICT DO NOTHING"#,
        )
        .bind(&grouping.member)
        .bind(&grouping.parent)
        .execute(self.pool())
        .await?;
        Ok(result.rows_affected() > 0)
    }
}
