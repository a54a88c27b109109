//! Asset model.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

/// A downloadable game asset.
#[derive(Debug, Clone, PartialEq, Serialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Asset {
    /// Asset ID.
    pub id: i64,
    /// Display name.
    pub name: String,
    /// Free-form description.
    pub description: Option<String>,
    /// Tags.
    pub tags: Option<Vec<String>>,
    /// Uploader.
    #[serde(rename = "userID")]
    pub user_id: Uuid,
    /// Object-store key of the file.
    #[serde(skip)]
    pub object_key: Option<String>,
    /// Presigned download link, filled in by the repository.
    #[sqlx(skip)]
    pub link: Option<String>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last update time.
    pub updated_at: DateTime<Utc>,
    /// Upvotes.
    pub upvotes: i32,
    /// Downvotes.
    pub downvotes: i32,
    /// View count.
    pub views: i32,
    /// `upvotes - downvotes`.
    pub rating: i32,
    /// Optimistic-concurrency version.
    pub version: i32,
}

/// Data for creating an asset.
#[derive(Debug, Clone)]
pub struct NewAsset {
    /// Display name.
    pub name: String,
    /// Description.
    pub description: Option<String>,
    /// Tags.
    pub tags: Option<Vec<String>>,
    /// Uploader.
    pub user_id: Uuid,
}

impl NewAsset {
    /// Create a new asset with minimal required fields.
    pub fn new(name: impl Into<String>, user_id: Uuid) -> Self {
        Self {
            name: name.into(),
            description: None,
            tags: None,
            user_id,
        }
    }
}

/// Partial update of an asset. `None` leaves the column unchanged.
#[derive(Debug, Clone, Default)]
pub struct AssetUpdate {
    /// New name.
    pub name: Option<String>,
    /// New description.
    pub description: Option<String>,
    /// New tags.
    pub tags: Option<Vec<String>>,
    /// New upvote count.
    pub upvotes: Option<i32>,
    /// New downvote count.
    pub downvotes: Option<i32>,
    /// Version the client last saw.
    pub version: Option<i32>,
}

impl AssetUpdate {
    /// Create an empty update.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set new name.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Set new description.
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Set the expected version.
    pub fn version(mut self, version: i32) -> Self {
        self.version = Some(version);
        self
    }

    /// True when no column would change.
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.description.is_none()
            && self.tags.is_none()
            && self.upvotes.is_none()
            && self.downvotes.is_none()
    }
}
