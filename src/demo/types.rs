//! Demo model.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

/// A playable game demo. Every demo has exactly one forum thread.
#[derive(Debug, Clone, PartialEq, Serialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Demo {
    /// Demo ID.
    pub id: i64,
    /// Title, mirrored to the thread.
    pub title: String,
    /// Description.
    pub description: Option<String>,
    /// Where the demo can be played.
    pub link: String,
    /// Tags, mirrored to the thread.
    pub tags: Option<Vec<String>>,
    /// Publisher.
    #[serde(rename = "userID")]
    pub user_id: Uuid,
    /// Discussion thread of this demo.
    #[serde(rename = "threadID")]
    pub thread_id: i64,
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

/// Data for creating a demo.
#[derive(Debug, Clone)]
pub struct NewDemo {
    /// Title.
    pub title: String,
    /// Description.
    pub description: Option<String>,
    /// Link.
    pub link: String,
    /// Tags.
    pub tags: Option<Vec<String>>,
    /// Publisher.
    pub user_id: Uuid,
    /// Thread created for the demo. Required when the row is written.
    pub thread_id: Option<i64>,
    /// Initial upvotes.
    pub upvotes: i32,
    /// Initial downvotes.
    pub downvotes: i32,
}

impl NewDemo {
    /// Create a new demo with minimal required fields.
    pub fn new(title: impl Into<String>, link: impl Into<String>, user_id: Uuid) -> Self {
        Self {
            title: title.into(),
            description: None,
            link: link.into(),
            tags: None,
            user_id,
            thread_id: None,
            upvotes: 0,
            downvotes: 0,
        }
    }

    /// Set the tags.
    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = Some(tags);
        self
    }

    /// Stamp the thread ID.
    pub fn with_thread(mut self, thread_id: i64) -> Self {
        self.thread_id = Some(thread_id);
        self
    }
}

/// Partial update of a demo. `None` leaves the column unchanged.
#[derive(Debug, Clone, Default)]
pub struct DemoUpdate {
    /// New title.
    pub title: Option<String>,
    /// New description.
    pub description: Option<String>,
    /// New link.
    pub link: Option<String>,
    /// New tags.
    pub tags: Option<Vec<String>>,
    /// New upvote count.
    pub upvotes: Option<i32>,
    /// New downvote count.
    pub downvotes: Option<i32>,
    /// Version the client last saw, if any.
    pub version: Option<i32>,
}

impl DemoUpdate {
    /// Create an empty update.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set new title.
    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Set new description.
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Set new tags.
    pub fn tags(mut self, tags: Vec<String>) -> Self {
        self.tags = Some(tags);
        self
    }

    /// Set the expected version.
    pub fn version(mut self, version: i32) -> Self {
        self.version = Some(version);
        self
    }

    /// True when no column would change.
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.link.is_none()
            && self.tags.is_none()
            && self.upvotes.is_none()
            && self.downvotes.is_none()
    }
}
