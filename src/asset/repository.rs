//! Asset repository.
//!
//! Keeps the row, the uploaded file and the owner permissions of an asset
//! in step.

use std::sync::Arc;

use tracing::warn;

use super::store::AssetStore;
use super::types::{Asset, AssetUpdate, NewAsset};
use crate::db::SearchQuery;
use crate::policy::{object_path, PolicyEngine};
use crate::storage::{asset_key, check_file_size, ObjectStore, Upload};
use crate::{HangarError, Result};

const RESOURCE: &str = "assets";

/// Repository for asset operations.
#[derive(Clone)]
pub struct AssetRepository {
    store: Arc<dyn AssetStore>,
    policy: Arc<PolicyEngine>,
    objects: Arc<dyn ObjectStore>,
}

impl AssetRepository {
    /// Create a new AssetRepository.
    pub fn new(
        store: Arc<dyn AssetStore>,
        policy: Arc<PolicyEngine>,
        objects: Arc<dyn ObjectStore>,
    ) -> Self {
        Self {
            store,
            policy,
            objects,
        }
    }

    /// Create an asset with its file.
    ///
    /// The file is checked against the cap of `tier` before anything is
    /// written. If the upload fails the row is removed again.
    pub async fn create(&self, new_asset: &NewAsset, file: Upload, tier: &str) -> Result<Asset> {
        check_file_size(file.size(), tier)?;

        let mut asset = self.store.insert_asset(new_asset).await?;
        let key = asset_key(asset.id);

        if let Err(e) = self
            .objects
            .put(&key, file.data, file.content_type.as_deref())
            .await
        {
            if let Err(cleanup) = self.store.delete_asset(asset.id).await {
                warn!(asset_id = asset.id, "Failed to remove asset row after upload error: {}", cleanup);
            }
            return Err(e);
        }
        self.store.set_asset_key(asset.id, &key).await?;
        asset.object_key = Some(key);

        let object = object_path(RESOURCE, asset.id);
        let owner = asset.user_id.to_string();
        self.policy.grant_owner(&owner, &object).await?;

        self.attach_link(&mut asset).await?;
        Ok(asset)
    }

    /// Get an asset by ID.
    pub async fn find_by_id(&self, id: i64) -> Result<Asset> {
        let mut asset = self.store.asset_by_id(id).await?;
        self.attach_link(&mut asset).await?;
        Ok(asset)
    }

    /// Search assets.
    pub async fn find(&self, query: &SearchQuery) -> Result<Vec<Asset>> {
        let mut assets = self.store.find_assets(query).await?;
        for asset in &mut assets {
            self.attach_link(asset).await?;
        }
        Ok(assets)
    }

    /// Update an asset and optionally replace its file.
    ///
    /// The row is updated first so a stale version never overwrites the file.
    pub async fn update(
        &self,
        id: i64,
        update: &AssetUpdate,
        file: Option<Upload>,
        tier: &str,
    ) -> Result<Asset> {
        if update.is_empty() && file.is_none() {
            return Err(HangarError::Validation("nothing to update".to_string()));
        }
        if let Some(file) = &file {
            check_file_size(file.size(), tier)?;
        }

        let mut asset = self.store.update_asset(id, update).await?;

        if let Some(file) = file {
            let key = asset
                .object_key
                .clone()
                .unwrap_or_else(|| asset_key(asset.id));
            self.objects
                .put(&key, file.data, file.content_type.as_deref())
                .await?;
            if asset.object_key.is_none() {
                self.store.set_asset_key(asset.id, &key).await?;
                asset.object_key = Some(key);
            }
        }

        self.attach_link(&mut asset).await?;
        Ok(asset)
    }

    /// Delete an asset, its file and every permission on it.
    ///
    /// The file is removed after the row; a failure there is logged only.
    pub async fn delete(&self, id: i64) -> Result<()> {
        let asset = self.store.asset_by_id(id).await?;
        self.store.delete_asset(id).await?;

        if let Some(key) = &asset.object_key {
            if let Err(e) = self.objects.delete(key).await {
                warn!(asset_id = id, key = %key, "Failed to delete asset file: {}", e);
            }
        }

        self.policy
            .remove_all_for_object(&object_path(RESOURCE, id), None)
            .await?;
        Ok(())
    }

    async fn attach_link(&self, asset: &mut Asset) -> Result<()> {
        let Some(key) = &asset.object_key else {
            return Ok(());
        };
        match self.objects.get_link(key).await {
            Ok(link) => asset.link = Some(link),
            Err(HangarError::ObjectNotFound(_)) => {
                warn!(asset_id = asset.id, key = %key, "Asset file is missing");
                asset.link = None;
            }
            Err(e) => return Err(e),
        }
        Ok(())
    }
}
