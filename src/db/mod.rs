//! Database module for Game Hangar.
//!
//! Owns the PostgreSQL connection pool, schema migrations and the shared
//! search query builder used by every finder.

mod migrate;
mod schema;
mod search;

pub use migrate::{Migration, Migrator};
pub use schema::MIGRATIONS;
pub use search::{push_search, KeywordMatch, SearchQuery, SortColumns, SortOrder};

use std::time::Duration;

use sqlx::pool::PoolConnection;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Postgres};
use tracing::{debug, info};

use crate::config::{DatabaseConfig, MigrateConfig};
use crate::{HangarError, Result};

/// Pool type used by every PostgreSQL store.
pub type DbPool = PgPool;

/// Database wrapper around the connection pool.
#[derive(Clone)]
pub struct Database {
    pool: DbPool,
}

impl Database {
    /// Connect to PostgreSQL and verify the server answers in time.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        info!("Connecting to PostgreSQL");
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(5))
            .connect(&config.conn_string)
            .await
            .map_err(|e| HangarError::DatabaseConnection(e.to_string()))?;

        let db = Self { pool };
        db.ping(Duration::from_millis(config.ping_timeout_ms)).await?;
        Ok(db)
    }

    /// Get a reference to the underlying pool.
    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    /// Acquire a pooled connection.
    ///
    /// The connection returns to the pool when dropped, on every exit path.
    pub async fn acquire(&self) -> Result<PoolConnection<Postgres>> {
        self.pool
            .acquire()
            .await
            .map_err(|e| HangarError::DatabaseConnection(e.to_string()))
    }

    /// Round-trip a trivial query within `budget`.
    pub async fn ping(&self, budget: Duration) -> Result<()> {
        let mut conn = self.acquire().await?;
        tokio::time::timeout(budget, sqlx::query("SELECT 1").execute(&mut *conn))
            .await
            .map_err(|_| {
                HangarError::DatabaseConnection(format!(
                    "ping did not answer within {} ms",
                    budget.as_millis()
                ))
            })?
            .map_err(|e| HangarError::DatabaseConnection(e.to_string()))?;
        debug!("Database ping ok");
        Ok(())
    }

    /// Run schema migrations when enabled.
    ///
    /// Returns the schema version after the run, or `None` when migrations
    /// are disabled.
    pub async fn migrate(&self, config: &MigrateConfig) -> Result<Option<i64>> {
        if !config.enabled {
            debug!("Schema migrations disabled");
            return Ok(None);
        }

        let migrator = match &config.root_dir {
            Some(dir) => Migrator::from_dir(dir, &config.version_table)?,
            None => Migrator::embedded(&config.version_table)?,
        };
        let version = migrator.migrate_to(&self.pool, config.expected_version).await?;
        Ok(Some(version))
    }

    /// Canonical "no rows" check.
    pub fn is_no_rows(err: &sqlx::Error) -> bool {
        matches!(err, sqlx::Error::RowNotFound)
    }
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database").finish()
    }
}

/// Map a unique or foreign-key violation to a client error.
///
/// Other errors keep their default mapping.
pub(crate) fn map_constraint(err: sqlx::Error, what: &str) -> HangarError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.is_unique_violation() {
            return HangarError::Validation(format!("{what} already exists"));
        }
        if db_err.is_foreign_key_violation() {
            return HangarError::Validation(format!("{what} references a missing or in-use row"));
        }
        if db_err.is_check_violation() {
            return HangarError::Validation(format!("{what} violates a value constraint"));
        }
    }
    err.into()
}

/// Explain why a version-gated UPDATE touched no row.
///
/// A missing row is `NotFound`; an existing one means the supplied version
/// was stale.
pub(crate) async fn missed_update<T>(pool: &DbPool, table: &str, id: T, what: &str) -> HangarError
where
    T: for<'q> sqlx::Encode<'q, Postgres> + sqlx::Type<Postgres> + Send + std::fmt::Display,
{
    let label = format!("{what} {id}");
    let sql = format!("SELECT EXISTS (SELECT 1 FROM {table} WHERE id = $1)");
    match sqlx::query_scalar::<_, bool>(&sql).bind(id).fetch_one(pool).await {
        Ok(true) => HangarError::Conflict(label),
        Ok(false) => HangarError::NotFound(label),
        Err(e) => e.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_no_rows() {
        assert!(Database::is_no_rows(&sqlx::Error::RowNotFound));
        assert!(!Database::is_no_rows(&sqlx::Error::PoolClosed));
    }

    #[test]
    fn test_map_constraint_passthrough() {
        let err = map_constraint(sqlx::Error::RowNotFound, "demo");
        assert!(err.is_not_found());
    }
}
