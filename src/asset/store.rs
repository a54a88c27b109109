//! Asset storage.

use async_trait::async_trait;
use sqlx::{Postgres, QueryBuilder};

use super::types::{Asset, AssetUpdate, NewAsset};
use crate::db::{map_constraint, missed_update, push_search, Database, KeywordMatch, SearchQuery, SortColumns};
use crate::{HangarError, Result};

const COLUMNS: &str = "id, name, description, tags, user_id, object_key, created_at, \
                       updated_at, upvotes, downvotes, views, rating, version";

/// Persistence of asset rows.
#[async_trait]
pub trait AssetStore: Send + Sync {
    /// Insert a row and return it.
    async fn insert_asset(&self, asset: &NewAsset) -> Result<Asset>;

    /// Fetch one row.
    async fn asset_by_id(&self, id: i64) -> Result<Asset>;

    /// Search rows.
    async fn find_assets(&self, query: &SearchQuery) -> Result<Vec<Asset>>;

    /// Versioned partial update.
    async fn update_asset(&self, id: i64, update: &AssetUpdate) -> Result<Asset>;

    /// Record where the file of an asset is stored.
    async fn set_asset_key(&self, id: i64, key: &str) -> Result<()>;

    /// Delete a row.
    async fn delete_asset(&self, id: i64) -> Result<()>;
}

#[async_trait]
impl AssetStore for Database {
    async fn insert_asset(&self, asset: &NewAsset) -> Result<Asset> {
        sqlx::query_as(&format!(
            "INSERT INTO asset.assets (name, description, tags, user_id)
             VALUES ($1, $2, $3, $4) RETURNING {COLUMNS}"
        ))
        .bind(&asset.name)
        .bind(&asset.description)
        .bind(&asset.tags)
        .bind(asset.user_id)
        .fetch_one(self.pool())
        .await
        .map_err(|e| map_constraint(e, "asset"))
    }

    async fn asset_by_id(&self, id: i64) -> Result<Asset> {
        sqlx::query_as(&format!("SELECT {COLUMNS} FROM asset.assets WHERE id = $1"))
            .bind(id)
            .fetch_optional(self.pool())
            .await?
            .ok_or_else(|| HangarError::NotFound(format!("asset {id}")))
    }

    async fn find_assets(&self, query: &SearchQuery) -> Result<Vec<Asset>> {
        let mut builder: QueryBuilder<Postgres> =
            QueryBuilder::new(format!("SELECT {COLUMNS} FROM asset.assets"));
        push_search(
            &mut builder,
            query,
            KeywordMatch::Tags("tags"),
            &SortColumns::COUNTED,
            false,
        );
        Ok(builder.build_query_as().fetch_all(self.pool()).await?)
    }

    async fn update_asset(&self, id: i64, update: &AssetUpdate) -> Result<Asset> {
        let mut builder: QueryBuilder<Postgres> =
            QueryBuilder::new("UPDATE asset.assets SET updated_at = NOW()");
        if let Some(name) = &update.name {
            builder.push(", name = ").push_bind(name);
        }
        if let Some(description) = &update.description {
            builder.push(", description = ").push_bind(description);
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

        let row: Option<Asset> = builder
            .build_query_as()
            .fetch_optional(self.pool())
            .await
            .map_err(|e| map_constraint(e, "asset"))?;
        match row {
            Some(asset) => Ok(asset),
            None => Err(missed_update(self.pool(), "asset.assets", id, "asset").await),
        }
    }

    async fn set_asset_key(&self, id: i64, key: &str) -> Result<()> {
        let result = sqlx::query("UPDATE asset.assets SET object_key = $1 WHERE id = $2")
            .bind(key)
            .bind(id)
            .execute(self.pool())
            .await?;
        if result.rows_affected() == 0 {
            return Err(HangarError::NotFound(format!("asset {id}")));
        }
        Ok(())
    }

    async fn delete_asset(&self, id: i64) -> Result<()> {
        let result = sqlx::query("DELETE FROM asset.assets WHERE id = $1")
            .bind(id)
            .execute(self.pool())
            .await?;
        if result.rows_affected() == 0 {
            return Err(HangarError::NotFound(format!("asset {id}")));
        }
        Ok(())
    }
}
