//! Versioned schema migrations.
//!
//! Migrations are numbered from 1 without gaps. Each one runs in its own
//! transaction together with the row that records it in the version table.

use std::path::Path;

use sqlx::PgPool;
use tracing::{debug, info};

use super::schema::MIGRATIONS;
use crate::config::is_sql_identifier;
use crate::{HangarError, Result};

/// A single migration script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Migration {
    /// Schema version reached after this migration.
    pub version: i64,
    /// Short name, from the file name.
    pub name: String,
    /// SQL script, possibly several statements.
    pub sql: String,
}

/// Applies migrations up to an expected version.
#[derive(Debug, Clone)]
pub struct Migrator {
    version_table: String,
    migrations: Vec<Migration>,
}

impl Migrator {
    /// Create a migrator from an explicit list.
    pub fn new(version_table: &str, migrations: Vec<Migration>) -> Result<Self> {
        if !is_sql_identifier(version_table) {
            return Err(HangarError::Config(format!(
                "invalid version table name: {version_table}"
            )));
        }
        for (i, migration) in migrations.iter().enumerate() {
            let expected = i as i64 + 1;
            if migration.version != expected {
                return Err(HangarError::Config(format!(
                    "migration {} is numbered {}, expected {}",
                    migration.name, migration.version, expected
                )));
            }
        }
        Ok(Self {
            version_table: version_table.to_string(),
            migrations,
        })
    }

    /// Migrator over the migrations compiled into the binary.
    pub fn embedded(version_table: &str) -> Result<Self> {
        let migrations = MIGRATIONS
            .iter()
            .enumerate()
            .map(|(i, (name, sql))| Migration {
                version: i as i64 + 1,
                name: name.to_string(),
                sql: sql.to_string(),
            })
            .collect();
        Self::new(version_table, migrations)
    }

    /// Migrator over `NNNN_name.sql` files in `dir`.
    pub fn from_dir(dir: impl AsRef<Path>, version_table: &str) -> Result<Self> {
        let dir = dir.as_ref();
        let mut migrations = Vec::new();

        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("sql") {
                continue;
            }
            let stem = path
                .file_stem()
                .and_then(|s| s.to_str())
                .ok_or_else(|| HangarError::Config(format!("bad migration file {path:?}")))?;
            let (number, name) = stem.split_once('_').unwrap_or((stem, ""));
            let version: i64 = number.parse().map_err(|_| {
                HangarError::Config(format!("migration file {stem} has no numeric prefix"))
            })?;

            migrations.push(Migration {
                version,
                name: name.to_string(),
                sql: std::fs::read_to_string(&path)?,
            });
        }

        migrations.sort_by_key(|m| m.version);
        debug!("Loaded {} migrations from {:?}", migrations.len(), dir);
        Self::new(version_table, migrations)
    }

    /// Highest version available.
    pub fn latest_version(&self) -> i64 {
        self.migrations.len() as i64
    }

    /// Migrations that move the schema from `current` to `expected`.
    pub fn pending(&self, current: i64, expected: i64) -> Result<&[Migration]> {
        if expected < 0 || expected > self.latest_version() {
            return Err(HangarError::Config(format!(
                "expected schema version {expected} but only {} migrations exist",
                self.latest_version()
            )));
        }
        if current > expected {
            return Err(HangarError::Config(format!(
                "database schema is at version {current}, newer than expected {expected}"
            )));
        }
        Ok(&self.migrations[current as usize..expected as usize])
    }

    /// Read the applied version, creating the version table if needed.
    pub async fn current_version(&self, pool: &PgPool) -> Result<i64> {
        sqlx::query(&format!(
            "CREATE TABLE IF NOT EXISTS {} (
                version    BIGINT PRIMARY KEY,
                name       TEXT NOT NULL,
                applied_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )",
            self.version_table
        ))
        .execute(pool)
        .await?;

        let version: i64 = sqlx::query_scalar(&format!(
            "SELECT COALESCE(MAX(version), 0) FROM {}",
            self.version_table
        ))
        .fetch_one(pool)
        .await?;
        Ok(version)
    }

    /// Apply every pending migration and return the resulting version.
    pub async fn migrate_to(&self, pool: &PgPool, expected: i64) -> Result<i64> {
        let current = self.current_version(pool).await?;
        let pending = self.pending(current, expected)?;

        if pending.is_empty() {
            debug!("Database is up to date (version {})", current);
            return Ok(current);
        }

        info!("Migrating database from version {} to {}", current, expected);

        for migration in pending {
            info!("Applying migration v{} ({})", migration.version, migration.name);
            let mut tx = pool.begin().await?;
            sqlx::raw_sql(&migration.sql).execute(&mut *tx).await?;
            sqlx::query(&format!(
                "INSERT INTO {} (version, name) VALUES ($1, $2)",
                self.version_table
            ))
            .bind(migration.version)
            .bind(&migration.name)
            .execute(&mut *tx)
            .await?;
            tx.commit().await?;
        }

        info!("Database migration complete (now at version {})", expected);
        Ok(expected)
    }
}
