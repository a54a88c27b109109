//! Demo repository.

use std::sync::Arc;

use tracing::warn;

use super::store::DemoStore;
use super::types::{Demo, DemoUpdate, NewDemo};
use crate::db::SearchQuery;
use crate::policy::{object_path, PolicyEngine};
use crate::{HangarError, Result};

const RESOURCE: &str = "demos";

/// Repository for demo rows and their owner permissions.
///
/// The forum thread of a demo is handled by [`crate::sync::ThreadSyncer`].
#[derive(Clone)]
pub struct DemoRepository {
    store: Arc<dyn DemoStore>,
    policy: Arc<PolicyEngine>,
}

impl DemoRepository {
    /// Create a new DemoRepository.
    pub fn new(store: Arc<dyn DemoStore>, policy: Arc<PolicyEngine>) -> Self {
        Self { store, policy }
    }

    /// Create a demo whose thread already exists.
    ///
    /// The row is deleted again when its owner cannot be granted PATCH and
    /// DELETE on it.
    pub async fn create(&self, new_demo: &NewDemo) -> Result<Demo> {
        if new_demo.thread_id.is_none() {
            return Err(HangarError::Validation("demo has no thread".to_string()));
        }
        let demo = self.store.insert_demo(new_demo).await?;

        let object = object_path(RESOURCE, demo.id);
        if let Err(e) = self.policy.grant_owner(&demo.user_id.to_string(), &object).await {
            if let Err(cleanup) = self.store.delete_demo(demo.id).await {
                warn!(demo_id = demo.id, "Ungranted demo left behind: {}", cleanup);
            }
            return Err(e);
        }
        Ok(demo)
    }

    /// Get a demo by ID, counting a view.
    pub async fn find_by_id(&self, id: i64) -> Result<Demo> {
        self.store.demo_by_id(id, true).await
    }

    /// Get a demo by ID without counting a view.
    pub async fn get(&self, id: i64) -> Result<Demo> {
        self.store.demo_by_id(id, false).await
    }

    /// Search demos.
    pub async fn find(&self, query: &SearchQuery) -> Result<Vec<Demo>> {
        self.store.find_demos(query).await
    }

    /// Versioned partial update.
    pub async fn update(&self, id: i64, update: &DemoUpdate) -> Result<Demo> {
        if update.is_empty() {
            return Err(HangarError::Validation("nothing to update".to_string()));
        }
        self.store.update_demo(id, update).await
    }

    /// Delete a demo and every permission on it.
    pub async fn delete(&self, id: i64) -> Result<()> {
        self.store.delete_demo(id).await?;
        self.policy
            .remove_all_for_object(&object_path(RESOURCE, id), None)
            .await?;
        Ok(())
    }
}
