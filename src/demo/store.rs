//! Demo storage.

use async_trait::async_trait;
use sqlx::{Postgres, QueryBuilder};

use super::types::{Demo, DemoUpdate, NewDemo};
use crate::db::{map_constraint, missed_update, push_search, Database, KeywordMatch, SearchQuery, SortColumns};
use crate::{HangarError, Result};

const COLUMNS: &str = "id, title, description, link, tags, user_id, thread_id, created_at, \
                       updated_at, upvotes, downvotes, views, rating, version";

/// Persistence of demo rows.
#[async_trait]
pub trait DemoStore: Send + Sync {
    /// Insert a row. The thread ID must be set.
    async fn insert_demo(&self, demo: &NewDemo) -> Result<Demo>;

    /// Fetch one row, counting a view when `count_view` is set.
    async fn demo_by_id(&self, id: i64, count_view: bool) -> Result<Demo>;

    /// Search rows.
    async fn find_demos(&self, query: &SearchQuery) -> Result<Vec<Demo>>;

    /// Versioned partial update.
    async fn update_demo(&self, id: i64, update: &DemoUpdate) -> Result<Demo>;

    /// Delete a row.
    async fn delete_demo(&self, id: i64) -> Result<()>;
}

#[async_trait]
impl DemoStore for Database {
    async fn insert_demo(&self, demo: &NewDemo) -> Result<Demo> {
        let thread_id = demo
            .thread_id
            .ok_or_else(|| HangarError::Validation("demo has no thread".to_string()))?;

        sqlx::query_as(&format!(
            "INSERT INTO demo.demos (title, description, link, tags, user_id, thread_id, upvotes, downvotes)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) RETURNING {COLUMNS}"
        ))
        .bind(&demo.title)
        .bind(&demo.description)
        .bind(&demo.link)
        .bind(&demo.tags)
        .bind(demo.user_id)
        .bind(thread_id)
        .bind(demo.upvotes)
        .bind(demo.downvotes)
        .fetch_one(self.pool())
        .await
        .map_err(|e| map_constraint(e, "demo"))
    }

    async fn demo_by_id(&self, id: i64, count_view: bool) -> Result<Demo> {
        let sql = if count_view {
            format!("UPDATE demo.demos SET views = views + 1 WHERE id = $1 RETURNING {COLUMNS}")
        } else {
            format!("SELECT {COLUMNS} FROM demo.demos WHERE id = $1")
        };
        sqlx::query_as(&sql)
            .bind(id)
            .fetch_optional(self.pool())
            .await?
            .ok_or_else(|| HangarError::NotFound(format!("demo {id}")))
    }

    async fn find_demos(&self, query: &SearchQuery) -> Result<Vec<Demo>> {
        let mut builder: QueryBuilder<Postgres> =
            QueryBuilder::new(format!("SELECT {COLUMNS} FROM demo.demos"));
        push_search(
            &mut builder,
            query,
            KeywordMatch::Tags("tags"),
            &SortColumns::COUNTED,
            false,
        );
        Ok(builder.build_query_as().fetch_all(self.pool()).await?)
    }

    async fn update_demo(&self, id: i64, update: &DemoUpdate) -> Result<Demo> {
        let mut builder: QueryBuilder<Postgres> =
            QueryBuilder::new("UPDATE demo.demos SET updated_at = NOW()");
        if let Some(title) = &update.title {
            builder.push(", title = ").push_bind(title);
        }
        if let Some(description) = &update.description {
            builder.push(", description = ").push_bind(description);
        }
        if let Some(link) = &update.link {
            builder.push(", link = ").push_bind(link);
        }
        if let Some(tags) = &update.tags {
            builder.push(", tags = ").push_bind(tags);
        }
        if let Some(upvotes) = update.upvotes {
            builder.push(", upvotes = ").push_bind(upvotes);
        }
        if let Some(downvotes) = update.downvotes {
            builder.push(", downvotes = ").push_bind(downvotes);
        }
        builder.push(" WHERE id = ").push_bind(id);
        if let Some(version) = update.version {
            builder.push(" AND version = ").push_bind(version);
        }
        builder.push(format!(" RETURNING {COLUMNS}"));

        let row: Option<Demo> = builder
            .build_query_as()
            .fetch_optional(self.pool())
            .await
            .map_err(|e| map_constraint(e, "demo"))?;
        match row {
            Some(demo) => Ok(demo),
            None => Err(missed_update(self.pool(), "demo.demos", id, "demo").await),
        }
    }

    async fn delete_demo(&self, id: i64) -> Result<()> {
        let result = sqlx::query("DELETE FROM demo.demos WHERE id = $1")
            .bind(id)
            .execute(self.pool())
            .await?;
        if result.rows_affected() == 0 {
            return Err(HangarError::NotFound(format!("demo {id}")));
        }
        Ok(())
    }
}
