//! Thread model.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

/// A discussion container inside a topic.
#[derive(Debug, Clone, PartialEq, Serialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Thread {
    /// Thread ID.
    pub id: i64,
    /// Title.
    pub title: String,
    /// Author.
    #[serde(rename = "userID")]
    pub user_id: Uuid,
    /// Topic the thread belongs to.
    #[serde(rename = "topicID")]
    pub topic_id: i64,
    /// Tags.
    pub tags: Option<Vec<String>>,
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

/// Data for creating a thread.
#[derive(Debug, Clone)]
pub struct NewThread {
    /// Title.
    pub title: String,
    /// Author.
    pub user_id: Uuid,
    /// Topic.
    pub topic_id: i64,
    /// Tags.
    pub tags: Option<Vec<String>>,
    /// Initial upvotes.
    pub upvotes: i32,
    /// Initial downvotes.
    pub downvotes: i32,
}

impl NewThread {
    /// Create a new thread with minimal required fields.
    pub fn new(title: impl Into<String>, user_id: Uuid, topic_id: i64) -> Self {
        Self {
            title: title.into(),
            user_id,
            topic_id,
            tags: None,
            upvotes: 0,
            downvotes: 0,
        }
    }

    /// Set the tags.
    pub fn with_tags(mut self, tags: Option<Vec<String>>) -> Self {
        self.tags = tags;
        self
    }

    /// Set the initial votes.
    pub fn with_votes(mut self, upvotes: i32, downvotes: i32) -> Self {
        self.upvotes = upvotes;
        self.downvotes = downvotes;
        self
    }
}

/// Partial update of a thread.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ThreadUpdate {
    /// New title.
    pub title: Option<String>,
    /// New tags.
    pub tags: Option<Vec<String>>,
    /// New upvote count.
    pub upvotes: Option<i32>,
    /// New downvote count.
    pub downvotes: Option<i32>,
    /// Version the client last saw, if any.
    pub version: Option<i32>,
}

impl ThreadUpdate {
    /// True when no column would change.
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.tags.is_none()
            && self.upvotes.is_none()
            && self.downvotes.is_none()
    }
}
